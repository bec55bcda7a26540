//! The response sink and the [`ContentType`] shortcuts.
//!
//! Middleware should not write to the sink directly. Set a status and a
//! body on the [`Context`](crate::Context) and let the finalizer encode
//! them. The sink is what the finalizer writes into.

use bytes::Bytes;
use futures_util::TryStreamExt;
use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use tracing::warn;

use crate::body::BodyStream;
use crate::error::Error;

/// Type-erased response body handed back to the transport.
pub type ResponseBody = UnsyncBoxBody<Bytes, Error>;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with
/// [`Context::set_type`](crate::Context::set_type).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }

    pub(crate) fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// The outgoing response for one request.
///
/// Status and headers can be changed freely until the response is ended.
/// Ending happens exactly once: [`end`](Response::end),
/// [`end_with`](Response::end_with) or [`pipe`](Response::pipe). Later
/// attempts are ignored with a warning.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<ResponseBody>,
}

impl Response {
    pub(crate) fn new() -> Self {
        Self { status: StatusCode::OK, headers: HeaderMap::new(), body: None }
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Case-insensitive header lookup. Non-ASCII values read as `None`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Sets a header, replacing any previous value.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let name = HeaderName::try_from(name)?;
        let value = HeaderValue::try_from(value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.remove(name);
    }

    pub(crate) fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub(crate) fn set_content_length(&mut self, len: u64) {
        self.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }

    pub(crate) fn clear_headers(&mut self) {
        self.headers.clear();
    }

    /// Whether a payload (possibly empty) has been committed.
    pub fn is_ended(&self) -> bool {
        self.body.is_some()
    }

    /// Ends the response without a payload.
    pub fn end(&mut self) {
        self.commit(Empty::new().map_err(Error::from).boxed_unsync());
    }

    /// Ends the response with `payload`.
    pub fn end_with(&mut self, payload: impl Into<Bytes>) {
        self.commit(Full::new(payload.into()).map_err(Error::from).boxed_unsync());
    }

    /// Streams `stream` into the response.
    pub fn pipe(&mut self, stream: BodyStream) {
        self.commit(StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync());
    }

    fn commit(&mut self, body: ResponseBody) {
        if self.is_ended() {
            warn!(status = %self.status, "response already ended, dropping second write");
            return;
        }
        self.body = Some(body);
    }

    /// Converts into the transport's response. An unended response goes out
    /// with an empty payload.
    pub(crate) fn into_http(self) -> http::Response<ResponseBody> {
        let body = self
            .body
            .unwrap_or_else(|| Empty::new().map_err(Error::from).boxed_unsync());
        let mut res = http::Response::new(body);
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}
