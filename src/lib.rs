//! # koru
//!
//! A minimal middleware core for HTTP services. You register middleware,
//! koru threads one [`Context`] per request through them, and writes the
//! response when they are done.
//!
//! ## The onion
//!
//! Middleware runs in registration order on the way in and in reverse on
//! the way out. Each one decides whether and when the rest of the pipeline
//! runs by awaiting [`Next::run`]:
//!
//! ```text
//!   respond ─► trace ─► auth ─► app
//!   respond ◄─ trace ◄─ auth ◄─┘
//! ```
//!
//! `respond` is added by koru itself. It sets the defaults on the way in
//! and encodes [`Context::body`] on the way out:
//!
//! - no body and status still `200` → `404 Not Found`
//! - `204` / `304` → empty payload, whatever the body
//! - bytes and text are written as-is
//! - streams are piped, their errors go to the error channel
//! - JSON values are serialized with [`Settings::json_spaces`] of indent
//! - `HEAD` requests get the headers but never a payload
//!
//! What koru does not do: routing, body parsing, TLS. Those are middleware
//! or proxy concerns.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use koru::{Application, Body, StatusCode, middleware::Trace};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), koru::Error> {
//!     let mut app = Application::new();
//!
//!     app.use_middleware(Trace)
//!         .use_fn(|ctx, next| Box::pin(async move {
//!             next.run(ctx).await?;
//!             ctx.set_header("cache-control", "no-store")
//!         }))
//!         .use_fn(|ctx, _next| Box::pin(async move {
//!             if ctx.request().path() == "/users/42" {
//!                 ctx.set_body(Body::json(&serde_json::json!({ "id": 42 }))?);
//!             } else if ctx.request().path() == "/teapot" {
//!                 ctx.set_status(StatusCode::IM_A_TEAPOT);
//!             }
//!             Ok(())
//!         }));
//!
//!     app.listen("0.0.0.0:3000").await
//! }
//! ```

mod application;
mod body;
mod compose;
mod context;
mod error;
mod events;
mod request;
mod respond;
mod response;
mod server;
mod settings;

pub mod middleware;

pub use application::{Application, Handler};
pub use body::{Body, BodyStream};
pub use compose::{BoxFuture, BoxedMiddleware, Compose, FnMiddleware, Middleware, Next, compose, from_fn};
pub use context::Context;
pub use error::Error;
pub use http::{Method, StatusCode};
pub use request::{Request, RequestBody};
pub use response::{ContentType, Response, ResponseBody};
pub use server::Server;
pub use settings::Settings;
