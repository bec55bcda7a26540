//! Minimal koru example: tracing, a response-time header, and a few
//! hand-dispatched endpoints.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -I http://localhost:3000/users/42
//!   curl -i http://localhost:3000/stream
//!   curl -i http://localhost:3000/nothing-here

use std::time::Instant;

use bytes::Bytes;
use futures_util::stream;
use koru::{Application, Body, Error, StatusCode, middleware::Trace};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let mut app = Application::new();
    app.on_error(|err| eprintln!("request failed: {err}"));

    app.use_middleware(Trace)
        // x-response-time, set on the way out
        .use_fn(|ctx, next| Box::pin(async move {
            let start = Instant::now();
            next.run(ctx).await?;
            let ms = start.elapsed().as_millis().to_string();
            ctx.set_header("x-response-time", &format!("{ms}ms"))
        }))
        .use_fn(|ctx, _next| Box::pin(async move {
            let path = ctx.request().path().to_owned();
            match path.as_str() {
                "/users/42" => {
                    ctx.set_body(serde_json::json!({ "id": "42", "name": "alice" }));
                }
                "/stream" => {
                    let chunks = ["one\n", "two\n", "three\n"]
                        .map(|s| Ok::<_, Error>(Bytes::from_static(s.as_bytes())));
                    ctx.set_body(Body::stream(stream::iter(chunks)));
                }
                "/gone" => ctx.set_status(StatusCode::GONE),
                // anything else falls through to 404 Not Found
                _ => {}
            }
            Ok(())
        }));

    app.listen("0.0.0.0:3000").await
}
