//! Middleware trait, type erasure, and the onion-model composer.
//!
//! # How a request travels
//!
//! ```text
//! compose([a, b, c]).run(ctx)
//!   a: before ─► next.run(ctx)
//!                  b: before ─► next.run(ctx)
//!                                 c: before ─► next.run(ctx) ─► tail
//!                                 c: after  ◄─
//!                  b: after  ◄─
//!   a: after  ◄─
//! ```
//!
//! A single cursor per invocation remembers the deepest stage dispatched
//! so far. Asking for a stage at or above the cursor again means some
//! middleware called `next` twice, and that call fails with
//! [`Error::NextCalledMultipleTimes`] instead of running the downstream
//! stages a second time.

use std::future::{Future, ready};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::context::Context;
use crate::error::Error;

/// A heap-allocated, type-erased future borrowing from the request.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A heap-allocated, type-erased middleware shared across requests.
pub type BoxedMiddleware = Arc<dyn Middleware>;

// ── Middleware ────────────────────────────────────────────────────────────────

/// One stage of the request pipeline.
///
/// Work done before `next.run(ctx).await` happens on the way in, in
/// registration order. Work done after it happens on the way out, in
/// reverse order. Not calling `next` at all short-circuits everything
/// downstream.
///
/// ```rust
/// use koru::{BoxFuture, Context, Error, Middleware, Next};
///
/// struct ResponseTime;
///
/// impl Middleware for ResponseTime {
///     fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), Error>> {
///         Box::pin(async move {
///             let start = std::time::Instant::now();
///             next.run(ctx).await?;
///             let ms = start.elapsed().as_millis().to_string();
///             ctx.set_header("x-response-time", &ms)
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), Error>>;

    /// Used in debug logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Middleware built from a closure. See [`from_fn`].
pub struct FnMiddleware<F>(F);

/// Turns a closure into a [`Middleware`].
///
/// The closure must return a boxed future, which is what `Box::pin(async
/// move { … })` produces:
///
/// ```rust
/// use koru::from_fn;
///
/// let served_by = from_fn(|ctx, next| Box::pin(async move {
///     ctx.set_header("x-served-by", "edge-1")?;
///     next.run(ctx).await
/// }));
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<(), Error>>
        + Send
        + Sync
        + 'static,
{
    FnMiddleware(f)
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<(), Error>>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), Error>> {
        (self.0)(ctx, next)
    }

    fn name(&self) -> &str {
        "fn"
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The rest of the pipeline, as seen from one middleware.
///
/// `Next` is `Copy` so it can be held across branches, but it may be run
/// at most once per request: a second run resolves to
/// [`Error::NextCalledMultipleTimes`].
#[derive(Clone, Copy)]
pub struct Next<'a> {
    chain: Option<&'a Chain<'a>>,
    index: usize,
}

impl<'a> Next<'a> {
    /// A continuation with nothing behind it. Running it completes at once.
    pub fn empty() -> Self {
        Self { chain: None, index: 0 }
    }

    /// Runs everything downstream of the current middleware.
    pub fn run<'b>(self, ctx: &'b mut Context) -> BoxFuture<'b, Result<(), Error>>
    where
        'a: 'b,
    {
        match self.chain {
            Some(chain) => chain.dispatch(self.index, ctx),
            None => Box::pin(ready(Ok(()))),
        }
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("index", &self.index).finish_non_exhaustive()
    }
}

/// One invocation of a composed pipeline.
struct Chain<'a> {
    stack: &'a [BoxedMiddleware],
    /// One past the deepest index dispatched so far; `0` means none yet.
    cursor: AtomicUsize,
    tail: Next<'a>,
}

impl<'a> Chain<'a> {
    fn dispatch<'b>(&'a self, index: usize, ctx: &'b mut Context) -> BoxFuture<'b, Result<(), Error>>
    where
        'a: 'b,
    {
        if index < self.cursor.load(Ordering::Acquire) {
            return Box::pin(ready(Err(Error::NextCalledMultipleTimes)));
        }
        self.cursor.store(index + 1, Ordering::Release);

        match self.stack.get(index) {
            Some(middleware) => middleware.call(ctx, Next { chain: Some(self), index: index + 1 }),
            None => self.tail.run(ctx),
        }
    }
}

// ── Compose ───────────────────────────────────────────────────────────────────

/// An ordered stack of middleware composed into a single stage.
///
/// Build it once and run it for every request. A `Compose` is itself a
/// [`Middleware`], so pipelines nest: the outer `next` becomes the tail
/// the inner stack falls through to.
#[derive(Clone, Default)]
pub struct Compose {
    stack: Arc<[BoxedMiddleware]>,
}

/// Composes `middleware` in iteration order.
pub fn compose<I>(middleware: I) -> Compose
where
    I: IntoIterator<Item = BoxedMiddleware>,
{
    Compose { stack: middleware.into_iter().collect() }
}

impl Compose {
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Runs the whole stack against `ctx` with nothing behind it.
    pub async fn run(&self, ctx: &mut Context) -> Result<(), Error> {
        self.run_with(ctx, Next::empty()).await
    }

    async fn run_with(&self, ctx: &mut Context, tail: Next<'_>) -> Result<(), Error> {
        let chain = Chain { stack: &self.stack, cursor: AtomicUsize::new(0), tail };
        Next { chain: Some(&chain), index: 0 }.run(ctx).await
    }
}

impl Middleware for Compose {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(self.run_with(ctx, next))
    }

    fn name(&self) -> &str {
        "compose"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::{Method, StatusCode};

    use super::*;
    use crate::context::mock;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn record(log: &Log, before: &'static str, after: &'static str) -> BoxedMiddleware {
        let log = Arc::clone(log);
        Arc::new(from_fn(move |ctx, next| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push(before);
                let result = next.run(ctx).await;
                log.lock().unwrap().push(after);
                result
            })
        }))
    }

    #[tokio::test]
    async fn runs_in_onion_order() {
        let log = Log::default();
        let pipeline = compose([
            record(&log, "a before", "a after"),
            record(&log, "b before", "b after"),
            record(&log, "c before", "c after"),
        ]);

        pipeline.run(&mut mock(Method::GET)).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            ["a before", "b before", "c before", "c after", "b after", "a after"]
        );
    }

    #[tokio::test]
    async fn empty_stack_completes() {
        let pipeline = compose([]);
        assert!(pipeline.is_empty());
        pipeline.run(&mut mock(Method::GET)).await.unwrap();
    }

    #[tokio::test]
    async fn calling_next_twice_fails() {
        let twice: BoxedMiddleware = Arc::new(from_fn(|ctx, next| {
            Box::pin(async move {
                next.run(ctx).await?;
                next.run(ctx).await
            })
        }));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let downstream: BoxedMiddleware = Arc::new(from_fn(move |_ctx, _next| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(ready(Ok(())))
        }));

        let err = compose([twice, downstream]).run(&mut mock(Method::GET)).await.unwrap_err();

        assert!(matches!(err, Error::NextCalledMultipleTimes));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_skip_upstream_after_logic() {
        let log = Log::default();
        let failing: BoxedMiddleware = Arc::new(from_fn(|_ctx, _next| {
            Box::pin(ready(Err(Error::http(StatusCode::BAD_REQUEST, "bad input"))))
        }));

        let outer = Arc::clone(&log);
        let first: BoxedMiddleware = Arc::new(from_fn(move |ctx, next| {
            let log = Arc::clone(&outer);
            Box::pin(async move {
                log.lock().unwrap().push("first before");
                next.run(ctx).await?;
                log.lock().unwrap().push("first after");
                Ok::<(), Error>(())
            })
        }));

        let err = compose([first, failing]).run(&mut mock(Method::GET)).await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(*log.lock().unwrap(), ["first before"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_downstream() {
        let log = Log::default();
        let stop: BoxedMiddleware = Arc::new(from_fn(|ctx, _next| {
            Box::pin(async move {
                ctx.set_status(StatusCode::UNAUTHORIZED);
                Ok(())
            })
        }));

        let mut ctx = mock(Method::GET);
        compose([stop, record(&log, "never", "never")]).run(&mut ctx).await.unwrap();

        assert_eq!(ctx.status(), StatusCode::UNAUTHORIZED);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn nested_pipelines_fall_through_to_the_outer_next() {
        let log = Log::default();
        let inner: BoxedMiddleware = Arc::new(compose([
            record(&log, "inner 1 before", "inner 1 after"),
            record(&log, "inner 2 before", "inner 2 after"),
        ]));
        let pipeline = compose([
            record(&log, "outer before", "outer after"),
            inner,
            record(&log, "last before", "last after"),
        ]);

        pipeline.run(&mut mock(Method::GET)).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            [
                "outer before",
                "inner 1 before",
                "inner 2 before",
                "last before",
                "last after",
                "inner 2 after",
                "inner 1 after",
                "outer after",
            ]
        );
    }

    #[tokio::test]
    async fn pipelines_are_reusable_across_requests() {
        let log = Log::default();
        let pipeline = compose([record(&log, "in", "out")]);

        pipeline.run(&mut mock(Method::GET)).await.unwrap();
        pipeline.run(&mut mock(Method::POST)).await.unwrap();

        assert_eq!(*log.lock().unwrap(), ["in", "out", "in", "out"]);
    }
}
