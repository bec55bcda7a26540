//! Per-request state threaded through the pipeline.

use std::sync::Arc;

use http::header;
use http::{Extensions, Method, StatusCode};

use crate::application::Shared;
use crate::body::Body;
use crate::error::Error;
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::settings::Settings;

/// Everything one request knows about itself.
///
/// A fresh `Context` is created for every request and dropped once the
/// response is handed back to the transport. Every middleware in the
/// pipeline sees the same instance, one at a time.
#[derive(Debug)]
pub struct Context {
    shared: Arc<Shared>,
    request: Request,
    response: Response,
    body: Option<Body>,
    state: Extensions,
}

impl Context {
    pub(crate) fn new(shared: Arc<Shared>, request: Request) -> Self {
        Self { shared, request, response: Response::new(), body: None, state: Extensions::new() }
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn request_mut(&mut self) -> &mut Request { &mut self.request }
    pub fn response(&self) -> &Response { &self.response }
    pub fn response_mut(&mut self) -> &mut Response { &mut self.response }

    /// The settings of the application serving this request.
    pub fn settings(&self) -> &Settings {
        &self.shared.settings
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn is_head(&self) -> bool {
        self.request.method() == Method::HEAD
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = Some(body.into());
    }

    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    /// Response header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.response.header(name)
    }

    /// Sets a response header.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        self.response.set_header(name, value)
    }

    pub fn set_type(&mut self, content_type: ContentType) {
        self.response.insert_header(header::CONTENT_TYPE, content_type.header_value());
    }

    pub fn set_length(&mut self, len: u64) {
        self.response.set_content_length(len);
    }

    /// Typed storage for values middleware want to hand downstream, such as
    /// an authenticated user.
    pub fn state(&self) -> &Extensions { &self.state }
    pub fn state_mut(&mut self) -> &mut Extensions { &mut self.state }

    /// The default per-request error handler.
    ///
    /// Broadcasts `err` on the application's error channel. Unless the
    /// response is already on its way, replaces it with the error's status
    /// (or `500`) and the matching reason phrase as plain text.
    pub fn on_error(&mut self, err: Error) {
        self.shared.report(&err);

        if self.response.is_ended() {
            return;
        }

        let status = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let reason = reason_phrase(status);
        self.response.clear_headers();
        self.response.set_status(status);
        self.set_type(ContentType::Text);
        self.set_length(reason.len() as u64);
        self.response.end_with(reason);
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub(crate) fn into_response(self) -> Response {
        self.response
    }
}

/// The standard reason phrase for `status`, or its numeric code when the
/// status has none.
pub(crate) fn reason_phrase(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map_or_else(|| status.as_str().to_owned(), str::to_owned)
}

#[cfg(test)]
pub(crate) fn mock(method: Method) -> Context {
    use http_body_util::Empty;

    let request = http::Request::builder()
        .method(method)
        .uri("/")
        .body(Empty::<bytes::Bytes>::new())
        .unwrap();
    Context::new(Arc::new(Shared::new(Settings::for_environment("test"))), Request::new(request))
}
