//! End-to-end behaviour of the response finalizer, driven through
//! `Application::callback` without a network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::stream;
use http_body_util::{BodyExt, Empty};
use koru::{Application, Body, Error, Method, ResponseBody, Settings, StatusCode};

fn app() -> Application {
    Application::with_settings(Settings::for_environment("test"))
}

fn request(method: Method) -> http::Request<Empty<Bytes>> {
    http::Request::builder().method(method).uri("/").body(Empty::new()).unwrap()
}

async fn send(app: &Application, method: Method) -> (http::response::Parts, Bytes) {
    let res = app.callback().handle(request(method)).await;
    split(res).await
}

async fn split(res: http::Response<ResponseBody>) -> (http::response::Parts, Bytes) {
    let (parts, body) = res.into_parts();
    (parts, body.collect().await.unwrap().to_bytes())
}

fn header<'a>(parts: &'a http::response::Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn untouched_request_is_404_with_reason_text() {
    let (parts, body) = send(&app(), Method::GET).await;

    assert_eq!(parts.status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Not Found");
    assert_eq!(header(&parts, "content-type"), Some("text/plain; charset=utf-8"));
}

#[tokio::test]
async fn explicit_status_without_body_gets_its_reason_phrase() {
    let mut app = app();
    app.use_fn(|ctx, _next| Box::pin(async move {
        ctx.set_status(StatusCode::SERVICE_UNAVAILABLE);
        Ok(())
    }));

    let (parts, body) = send(&app, Method::GET).await;

    assert_eq!(parts.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, "Service Unavailable");
}

#[tokio::test]
async fn json_body_round_trips() {
    let mut app = app();
    app.use_fn(|ctx, _next| Box::pin(async move {
        ctx.set_body(serde_json::json!({ "a": 1 }));
        Ok(())
    }));

    let (parts, body) = send(&app, Method::GET).await;

    assert_eq!(parts.status, StatusCode::OK);
    assert_eq!(body, "{\n  \"a\": 1\n}");
    assert_eq!(header(&parts, "content-type"), Some("application/json"));
    assert_eq!(header(&parts, "content-length"), Some(body.len().to_string().as_str()));
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed, serde_json::json!({ "a": 1 }));
}

#[tokio::test]
async fn json_spaces_zero_is_compact() {
    let mut settings = Settings::for_environment("test");
    settings.json_spaces = 0;
    let mut app = Application::with_settings(settings);
    app.use_fn(|ctx, _next| Box::pin(async move {
        ctx.set_body(Body::json(&[1, 2, 3])?);
        Ok::<(), Error>(())
    }));

    let (_, body) = send(&app, Method::GET).await;

    assert_eq!(body, "[1,2,3]");
}

#[tokio::test]
async fn buffer_body_is_written_verbatim() {
    let mut app = app();
    app.use_fn(|ctx, _next| Box::pin(async move {
        ctx.set_body(Bytes::from_static(b"hello"));
        Ok(())
    }));

    let (parts, body) = send(&app, Method::GET).await;

    assert_eq!(parts.status, StatusCode::OK);
    assert_eq!(body, "hello");
    assert_eq!(header(&parts, "content-length"), Some("5"));
}

#[tokio::test]
async fn head_requests_never_carry_a_payload() {
    let bodies: [fn() -> Body; 4] = [
        || Body::from("hello"),
        || Body::from(vec![1u8, 2, 3]),
        || Body::from(serde_json::json!({ "a": 1 })),
        || Body::stream(stream::iter([Ok::<_, Error>(Bytes::from_static(b"chunk"))])),
    ];

    for make in bodies {
        let mut app = app();
        app.use_fn(move |ctx, _next| Box::pin(async move {
            ctx.set_body(make());
            Ok(())
        }));

        let (get, get_body) = send(&app, Method::GET).await;
        let (head, head_body) = send(&app, Method::HEAD).await;

        assert!(!get_body.is_empty());
        assert!(head_body.is_empty());
        assert_eq!(head.status, get.status);
        assert_eq!(head.headers, get.headers);
    }
}

#[tokio::test]
async fn no_content_statuses_drop_the_body() {
    for status in [StatusCode::NO_CONTENT, StatusCode::NOT_MODIFIED] {
        let mut app = app();
        app.use_fn(move |ctx, _next| Box::pin(async move {
            ctx.set_body("this is never sent");
            ctx.set_status(status);
            Ok(())
        }));

        let (parts, body) = send(&app, Method::GET).await;

        assert_eq!(parts.status, status);
        assert!(body.is_empty());
    }
}

#[tokio::test]
async fn stream_body_is_piped() {
    let mut app = app();
    app.use_fn(|ctx, _next| Box::pin(async move {
        let chunks = ["a", "b", "c"].map(|s| Ok::<_, Error>(Bytes::from_static(s.as_bytes())));
        ctx.set_body(Body::stream(stream::iter(chunks)));
        Ok(())
    }));

    let (parts, body) = send(&app, Method::GET).await;

    assert_eq!(parts.status, StatusCode::OK);
    assert_eq!(body, "abc");
}

#[tokio::test]
async fn stream_errors_reach_subscribers_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let mut app = app();
    app.on_error(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    app.use_fn(|ctx, _next| Box::pin(async move {
        ctx.set_body(Body::stream(stream::iter([
            Ok(Bytes::from_static(b"partial")),
            Err(Error::other("disk gone")),
        ])));
        Ok(())
    }));

    let res = app.callback().handle(request(Method::GET)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.into_body().collect().await.is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn powered_by_header_follows_settings() {
    let (parts, _) = send(&app(), Method::GET).await;
    assert_eq!(header(&parts, "x-powered-by"), Some("koru"));

    let mut quiet = app();
    quiet.settings_mut().powered_by = false;
    let (parts, _) = send(&quiet, Method::GET).await;
    assert_eq!(header(&parts, "x-powered-by"), None);
}

#[tokio::test]
async fn finalizer_wraps_every_user_middleware() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut app = app();

    for name in ["m1", "m2"] {
        let log = Arc::clone(&log);
        app.use_fn(move |ctx, next| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                // The finalizer has already reset the status on the way in.
                assert_eq!(ctx.status(), StatusCode::OK);
                log.lock().unwrap().push(format!("{name} before"));
                let result = next.run(ctx).await;
                // Nothing is encoded until every middleware has unwound.
                assert!(!ctx.response().is_ended());
                log.lock().unwrap().push(format!("{name} after"));
                result
            })
        });
    }

    let (parts, _) = send(&app, Method::GET).await;

    assert_eq!(parts.status, StatusCode::NOT_FOUND);
    assert_eq!(*log.lock().unwrap(), ["m1 before", "m2 before", "m2 after", "m1 after"]);
}
