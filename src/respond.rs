//! The response finalizer.
//!
//! Always the outermost stage of an application's pipeline, so its
//! "before" half runs first and its "after" half runs last. On the way out
//! it turns whatever the pipeline left in [`Context::body`] into bytes on
//! the response sink.

use http::header::{self, HeaderName, HeaderValue};
use http::StatusCode;

use crate::body::Body;
use crate::compose::{BoxFuture, Middleware, Next};
use crate::context::{Context, reason_phrase};
use crate::error::Error;
use crate::response::ContentType;

const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

pub(crate) struct Respond;

impl Middleware for Respond {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            ctx.set_status(StatusCode::OK);
            if ctx.settings().powered_by {
                ctx.response_mut().insert_header(X_POWERED_BY, HeaderValue::from_static("koru"));
            }

            next.run(ctx).await?;

            finalize(ctx)
        })
    }

    fn name(&self) -> &str {
        "respond"
    }
}

fn finalize(ctx: &mut Context) -> Result<(), Error> {
    let head = ctx.is_head();
    let status = ctx.status();
    let no_content = status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED;
    let body = ctx.take_body();

    if body.is_none() && status == StatusCode::OK {
        ctx.set_status(StatusCode::NOT_FOUND);
    }

    if no_content {
        ctx.response_mut().end();
        return Ok(());
    }

    let body = match body {
        Some(body) => body,
        None => {
            ctx.set_type(ContentType::Text);
            Body::Text(reason_phrase(ctx.status()))
        }
    };

    match body {
        Body::Bytes(bytes) => {
            write_sized(ctx, head, bytes.into());
        }
        Body::Text(text) => {
            write_sized(ctx, head, text.into());
        }
        Body::Stream(mut stream) => {
            stream.report_errors_to(ctx.shared());
            if head {
                ctx.response_mut().end();
            } else {
                ctx.response_mut().pipe(stream);
            }
        }
        Body::Json(value) => {
            let json = to_json(&value, ctx.settings().json_spaces)?;
            if ctx.header(header::CONTENT_TYPE.as_str()).is_none() {
                ctx.set_type(ContentType::Json);
            }
            ctx.set_length(json.len() as u64);
            if head {
                ctx.response_mut().end();
            } else {
                ctx.response_mut().end_with(json);
            }
        }
    }

    Ok(())
}

fn write_sized(ctx: &mut Context, head: bool, payload: bytes::Bytes) {
    if ctx.header(header::CONTENT_LENGTH.as_str()).is_none() {
        ctx.set_length(payload.len() as u64);
    }
    if head {
        ctx.response_mut().end();
    } else {
        ctx.response_mut().end_with(payload);
    }
}

/// Serializes `value` with `spaces` of indentation; `0` means compact.
fn to_json(value: &serde_json::Value, spaces: usize) -> Result<Vec<u8>, Error> {
    if spaces == 0 {
        return Ok(serde_json::to_vec(value)?);
    }
    let indent = vec![b' '; spaces];
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    serde::Serialize::serialize(value, &mut serializer)?;
    Ok(out)
}
