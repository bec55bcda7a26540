//! Unified error type.

use std::convert::Infallible;

use http::StatusCode;
use http::header::{InvalidHeaderName, InvalidHeaderValue};

/// The error type returned by koru's fallible operations.
///
/// Middleware returns `Result<(), Error>`. Anything that escapes the
/// pipeline lands in [`Context::on_error`](crate::Context::on_error) and is
/// broadcast on the application's error channel. Use [`Error::http`] when
/// the failure maps to a specific status code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A middleware called `next` a second time within one request.
    #[error("next() called multiple times")]
    NextCalledMultipleTimes,

    /// An error that carries the HTTP status to respond with.
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("http: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid socket address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error("invalid header name: {0}")]
    HeaderName(#[from] InvalidHeaderName),

    #[error("invalid header value: {0}")]
    HeaderValue(#[from] InvalidHeaderValue),

    /// Anything else a middleware wants to bubble up.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// An error that responds with `status`.
    ///
    /// ```rust
    /// use koru::{Error, StatusCode};
    ///
    /// let err = Error::http(StatusCode::UNAUTHORIZED, "missing token");
    /// assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    /// ```
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http { status, message: message.into() }
    }

    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Other(err.into())
    }

    /// The HTTP status this error carries, if any.
    ///
    /// Errors without one are answered with `500 Internal Server Error`.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<Infallible> for Error {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}
