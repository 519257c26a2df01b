//! Error types.
//!
//! Two kinds of failure exist. [`Error`] covers setup: building routes,
//! registering them, binding a socket. [`HttpError`] is a failure raised while
//! a request is in flight. It is also a response, so it travels through the
//! same channel as one and ends up in the [`ErrorHandler`](crate::ErrorHandler).

use std::fmt;

use http::StatusCode;
use serde_json::Value;

use crate::response::HttpResponse;

/// The error type returned by fallible setup operations.
///
/// Request-time failures are never an `Error`; they are [`HttpError`] values
/// turned into responses.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A route or formatter was declared in a way that can never serve a request.
    #[error("configuration: {0}")]
    Configuration(String),

    /// The route table rejected a path (bad syntax or a duplicate).
    #[error("invalid route `{path}`: {reason}")]
    InvalidRoute { path: String, reason: String },
}

// ── ErrorKind ─────────────────────────────────────────────────────────────────

/// Classification of a request-time failure.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// The route cannot serve this request as configured. 500.
    Configuration,
    /// No request formatter matched `Content-Type`. 415.
    UnsupportedMediaType,
    /// No response formatter matched `Accept`. 406.
    NotAcceptable,
    /// The route requires a principal and the security context has none. 401.
    Unauthorized,
    /// An authorizer rejected the request.
    Authorization,
    /// The effective timeout elapsed before the pipeline finished. 503.
    Timeout,
    /// The body could not be read or parsed. 400 / 413.
    InvalidBody,
    /// The handler (or a formatter) failed with its own status.
    Handler,
    /// Anything uncaught. Always 500 with a generic message.
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration        => "configuration",
            Self::UnsupportedMediaType => "unsupported_media_type",
            Self::NotAcceptable        => "not_acceptable",
            Self::Unauthorized         => "unauthorized",
            Self::Authorization        => "forbidden",
            Self::Timeout              => "timedout",
            Self::InvalidBody          => "invalid_body",
            Self::Handler              => "handler",
            Self::Unknown              => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── HttpError ─────────────────────────────────────────────────────────────────

/// A failure that carries its own HTTP representation.
///
/// Return it from handlers, formatters and authorizers to short-circuit the
/// pipeline with a specific status:
///
/// ```rust
/// use http::StatusCode;
/// use mediaroute::HttpError;
///
/// let err = HttpError::new(StatusCode::CONFLICT, "pet already adopted")
///     .with_header("retry-after", "60");
/// assert_eq!(err.status(), StatusCode::CONFLICT);
/// ```
#[derive(Debug)]
pub struct HttpError {
    kind: ErrorKind,
    message: String,
    code: Option<String>,
    response: HttpResponse,
}

impl HttpError {
    /// A handler failure with an explicit status.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self::of_kind(ErrorKind::Handler, status, message)
    }

    fn of_kind(kind: ErrorKind, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            response: HttpResponse::new(status),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::of_kind(ErrorKind::Configuration, StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::of_kind(ErrorKind::UnsupportedMediaType, StatusCode::UNSUPPORTED_MEDIA_TYPE, message)
    }

    pub fn not_acceptable(message: impl Into<String>) -> Self {
        Self::of_kind(ErrorKind::NotAcceptable, StatusCode::NOT_ACCEPTABLE, message)
    }

    pub fn unauthorized() -> Self {
        Self::of_kind(ErrorKind::Unauthorized, StatusCode::UNAUTHORIZED, "Authorization is required")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::of_kind(ErrorKind::Authorization, StatusCode::FORBIDDEN, message)
    }

    pub fn timeout() -> Self {
        Self::of_kind(ErrorKind::Timeout, StatusCode::SERVICE_UNAVAILABLE, "Response timeout")
            .with_code(ErrorKind::Timeout.as_str())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::of_kind(ErrorKind::InvalidBody, StatusCode::BAD_REQUEST, message)
    }

    pub fn payload_too_large(limit: usize) -> Self {
        Self::of_kind(
            ErrorKind::InvalidBody,
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("request body exceeds {limit} bytes"),
        )
    }

    /// An uncaught failure. `detail` is logged by the error handler but never
    /// sent to the client.
    pub fn unknown(detail: impl Into<String>) -> Self {
        Self::of_kind(ErrorKind::Unknown, StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.response = self.response.with_header(name, value);
        self
    }

    /// Replaces the default `{status, message}` body the error handler emits.
    pub fn with_body(mut self, body: Value) -> Self {
        self.response = self.response.with_body(body);
        self
    }

    /// A machine-readable code included in the default error body.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Handler-kind errors raised by an authorizer are reclassified; errors
    /// that already carry a specific kind keep it.
    pub(crate) fn into_authorization(mut self) -> Self {
        if self.kind == ErrorKind::Handler {
            self.kind = ErrorKind::Authorization;
        }
        self
    }

    pub fn kind(&self) -> ErrorKind { self.kind }
    pub fn status(&self) -> StatusCode { self.response.status() }
    pub fn message(&self) -> &str { &self.message }
    pub fn code(&self) -> Option<&str> { self.code.as_deref() }
    pub fn headers(&self) -> &[(String, String)] { self.response.headers() }
    pub fn body(&self) -> Option<&Value> { self.response.body() }

    pub(crate) fn into_response(self) -> HttpResponse { self.response }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.status().as_u16(), self.kind, self.message)
    }
}

impl std::error::Error for HttpError {}

impl From<serde_json::Error> for HttpError {
    fn from(e: serde_json::Error) -> Self {
        Self::bad_request(format!("invalid model: {e}"))
    }
}
