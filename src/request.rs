//! Incoming HTTP request type.

use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Method, Uri, Version};
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;

use crate::error::Error;

/// Type-erased request body, as handed over by the transport.
pub type RequestBody = UnsyncBoxBody<Bytes, Error>;

/// An incoming HTTP request.
///
/// koru never reads the body itself. A body-parsing middleware can
/// [`take_body`](Request::take_body) or buffer it with
/// [`bytes`](Request::bytes).
pub struct Request {
    parts: Parts,
    body: Option<RequestBody>,
}

impl Request {
    pub(crate) fn new<B>(req: http::Request<B>) -> Self
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Error>,
    {
        let (parts, body) = req.into_parts();
        Self { parts, body: Some(body.map_err(Into::into).boxed_unsync()) }
    }

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn version(&self) -> Version { self.parts.version }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }

    /// Case-insensitive header lookup. Values that are not visible ASCII
    /// read as `None`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Takes the body out of the request. Returns `None` once taken.
    pub fn take_body(&mut self) -> Option<RequestBody> {
        self.body.take()
    }

    /// Buffers the whole body. Returns empty bytes once the body was taken.
    pub async fn bytes(&mut self) -> Result<Bytes, Error> {
        match self.body.take() {
            Some(body) => Ok(body.collect().await?.to_bytes()),
            None => Ok(Bytes::new()),
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("headers", &self.parts.headers)
            .finish_non_exhaustive()
    }
}
