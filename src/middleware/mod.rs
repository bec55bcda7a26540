//! Built-in middleware.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: structured tracing, request-id injection,
//! authentication-header inspection.
//!
//! - [`Trace`] — per-request span with method, path, status, latency

mod trace;

pub use trace::Trace;
