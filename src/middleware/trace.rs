//! Per-request tracing.

use std::time::Instant;

use tracing::{Instrument, info, info_span, warn};

use crate::compose::{BoxFuture, Middleware, Next};
use crate::context::Context;
use crate::error::Error;

/// Wraps everything downstream in a `request` span and logs the outcome.
///
/// Register it first so the span covers the rest of the pipeline:
///
/// ```rust
/// use koru::{Application, middleware::Trace};
///
/// let mut app = Application::new();
/// app.use_middleware(Trace);
/// ```
///
/// The status logged is the one the pipeline settled on. A request nobody
/// answered still reads `200` here; the finalizer turns it into `404`
/// afterwards.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), Error>> {
        let span = info_span!("request", method = %ctx.method(), path = %ctx.request().path());

        Box::pin(
            async move {
                let start = Instant::now();
                let result = next.run(ctx).await;
                let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

                match &result {
                    Ok(()) => info!(status = ctx.status().as_u16(), latency_ms, "request completed"),
                    Err(e) => warn!(error = %e, latency_ms, "request failed"),
                }
                result
            }
            .instrument(span),
        )
    }

    fn name(&self) -> &str {
        "trace"
    }
}
