//! The application: settings, the middleware registry, and the error
//! channel.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error};

use crate::compose::{BoxFuture, BoxedMiddleware, Compose, Middleware, Next, compose, from_fn};
use crate::context::Context;
use crate::error::Error;
use crate::events::ErrorChannel;
use crate::request::Request;
use crate::respond::Respond;
use crate::response::ResponseBody;
use crate::server::Server;
use crate::settings::Settings;

/// State every request of one handler shares.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) settings: Settings,
    pub(crate) errors: ErrorChannel,
}

impl Shared {
    #[cfg(test)]
    pub(crate) fn new(settings: Settings) -> Self {
        Self { settings, errors: ErrorChannel::default() }
    }

    /// Runs the default handler, then every subscriber.
    pub(crate) fn report(&self, err: &Error) {
        default_error_handler(&self.settings, err);
        self.errors.publish(err);
    }
}

/// An HTTP application.
///
/// Register middleware with [`use_middleware`](Application::use_middleware)
/// or [`use_fn`](Application::use_fn); registration order is execution
/// order. Then either [`listen`](Application::listen) or hand
/// [`callback`](Application::callback) to a server of your own.
///
/// ```rust,no_run
/// use koru::{Application, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), koru::Error> {
///     let mut app = Application::new();
///     app.use_fn(|ctx, next| Box::pin(async move {
///         if ctx.request().header("authorization").is_none() {
///             ctx.set_status(StatusCode::UNAUTHORIZED);
///             return Ok(());
///         }
///         next.run(ctx).await
///     }))
///     .use_fn(|ctx, _next| Box::pin(async move {
///         ctx.set_body("hello");
///         Ok(())
///     }));
///
///     app.listen("0.0.0.0:3000").await
/// }
/// ```
pub struct Application {
    settings: Settings,
    middleware: Vec<BoxedMiddleware>,
    errors: ErrorChannel,
}

impl Application {
    /// An application with [`Settings::default`].
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self { settings, middleware: Vec::new(), errors: ErrorChannel::default() }
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    /// Changes only affect handlers built afterwards.
    pub fn settings_mut(&mut self) -> &mut Settings { &mut self.settings }

    /// Appends `middleware` to the pipeline. Returns `self` for chaining.
    pub fn use_middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        debug!(middleware = middleware.name(), "use");
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Appends a closure middleware. See [`from_fn`](crate::from_fn).
    pub fn use_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<(), Error>>
            + Send
            + Sync
            + 'static,
    {
        self.use_middleware(from_fn(f))
    }

    /// Subscribes `f` to unhandled errors.
    ///
    /// Subscribers run after the default handler, in subscription order.
    /// They also apply to handlers that were built before subscribing.
    pub fn on_error<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.errors.subscribe(f);
        self
    }

    /// Broadcasts `err` as if a request had failed with it.
    pub fn emit_error(&self, err: &Error) {
        default_error_handler(&self.settings, err);
        self.errors.publish(err);
    }

    /// Builds a request handler for the transport.
    ///
    /// The pipeline is composed once here and shared by every request the
    /// handler serves. Middleware registered later is not part of it.
    pub fn callback(&self) -> Handler {
        let stack = std::iter::once(Arc::new(Respond) as BoxedMiddleware)
            .chain(self.middleware.iter().cloned());
        Handler {
            pipeline: compose(stack),
            shared: Arc::new(Shared { settings: self.settings.clone(), errors: self.errors.clone() }),
        }
    }

    /// Shorthand for `Server::bind(addr)?.serve(app.callback())`.
    pub async fn listen(&self, addr: &str) -> Result<(), Error> {
        Server::bind(addr)?.serve(self.callback()).await
    }
}

impl Default for Application {
    fn default() -> Self { Self::new() }
}

// ── Handler ──────────────────────────────────────────────────────────────────

/// A composed pipeline ready to serve requests.
///
/// Cheap to clone; clones share the pipeline.
#[derive(Clone)]
pub struct Handler {
    pipeline: Compose,
    shared: Arc<Shared>,
}

impl Handler {
    /// Serves one request. Pipeline failures go to
    /// [`Context::on_error`].
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<ResponseBody>
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Error>,
    {
        self.handle_with(req, Context::on_error).await
    }

    /// Serves one request, passing pipeline failures to `on_error` instead
    /// of the context's own handler.
    pub async fn handle_with<B, F>(&self, req: http::Request<B>, on_error: F) -> http::Response<ResponseBody>
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Error>,
        F: FnOnce(&mut Context, Error) + Send,
    {
        let mut ctx = Context::new(Arc::clone(&self.shared), Request::new(req));
        if let Err(err) = self.pipeline.run(&mut ctx).await {
            on_error(&mut ctx, err);
        }
        ctx.into_response().into_http()
    }
}

// ── Default error handler ─────────────────────────────────────────────────────

/// Whether the default handler logs `err`.
fn should_report(settings: &Settings, err: &Error) -> bool {
    settings.output_errors && err.status() != Some(http::StatusCode::NOT_FOUND)
}

fn default_error_handler(settings: &Settings, err: &Error) {
    if !should_report(settings, err) {
        return;
    }
    error!(error = ?err, "{err}");
}
