//! Response body values.
//!
//! Middleware sets [`Context::set_body`](crate::Context::set_body) to one of
//! these and the finalizer decides how to put it on the wire.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use bytes::Bytes;
use futures_util::Stream;
use serde::Serialize;

use crate::application::Shared;
use crate::error::Error;

/// A response body.
pub enum Body {
    /// Raw bytes, written as-is.
    Bytes(Bytes),
    /// Text, written as-is.
    Text(String),
    /// A byte stream, piped into the response.
    Stream(BodyStream),
    /// Structured data, serialized to JSON on the way out.
    Json(serde_json::Value),
}

impl Body {
    /// Serializes `value` into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Wraps a stream of byte chunks.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, Error>> + Send + 'static,
    {
        Self::Stream(BodyStream::new(stream))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Json(v) => f.debug_tuple("Json").field(v).finish(),
        }
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self { Self::Bytes(b) }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Self { Self::Bytes(b.into()) }
}

impl From<&'static [u8]> for Body {
    fn from(b: &'static [u8]) -> Self { Self::Bytes(Bytes::from_static(b)) }
}

impl From<String> for Body {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<serde_json::Value> for Body {
    fn from(v: serde_json::Value) -> Self { Self::Json(v) }
}

impl From<BodyStream> for Body {
    fn from(s: BodyStream) -> Self { Self::Stream(s) }
}

// ── BodyStream ────────────────────────────────────────────────────────────────

type BoxStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send + 'static>>;

/// A streaming body.
///
/// Once the response has started there is nobody left to answer with an
/// error status, so the finalizer attaches the application's error path
/// and the first error the stream yields is reported there. Attaching is
/// idempotent and each stream reports at most once.
pub struct BodyStream {
    inner: BoxStream,
    reporter: Option<Arc<Shared>>,
    reported: bool,
}

impl BodyStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, Error>> + Send + 'static,
    {
        Self { inner: Box::pin(stream), reporter: None, reported: false }
    }

    /// Routes stream errors to the application's error handlers. Returns
    /// `false` if a reporter was already attached, in which case nothing
    /// changes.
    pub(crate) fn report_errors_to(&mut self, shared: &Arc<Shared>) -> bool {
        if self.reporter.is_some() {
            return false;
        }
        self.reporter = Some(Arc::clone(shared));
        true
    }
}

impl Stream for BodyStream {
    type Item = Result<Bytes, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let item = this.inner.as_mut().poll_next(cx);
        if let Poll::Ready(Some(Err(err))) = &item {
            if !this.reported {
                this.reported = true;
                if let Some(shared) = &this.reporter {
                    shared.report(err);
                }
            }
        }
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
