//! The response model, its emission, and the [`IntoReply`] conversion trait.
//!
//! Handlers return models. The pipeline formats them into an [`HttpResponse`]
//! and only then emits bytes. A handler that wants full control returns an
//! `HttpResponse` itself and skips response formatting.

use std::fmt;
use std::future::Future;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::error::HttpError;
use crate::handler::BoxFuture;

/// The concrete response type handed to hyper.
pub type Emitted = http::Response<Full<Bytes>>;

type SendFn = Box<dyn FnOnce(ResponseSink) -> BoxFuture<'static, ResponseSink> + Send + Sync>;

// ── HttpResponse ──────────────────────────────────────────────────────────────

/// What to send back: status, headers, an optional JSON body, or a custom
/// `send` routine that owns emission.
///
/// ```rust
/// use http::StatusCode;
/// use mediaroute::HttpResponse;
/// use serde_json::json;
///
/// let created = HttpResponse::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/pets/3")
///     .json(json!({ "id": 3 }));
/// assert_eq!(created.status(), StatusCode::CREATED);
/// ```
pub struct HttpResponse {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Option<Value>,
    send: Option<SendFn>,
}

impl HttpResponse {
    /// Response with no body.
    pub fn new(status: StatusCode) -> Self {
        Self { status, headers: Vec::new(), body: None, send: None }
    }

    /// `200 OK` with a JSON body.
    pub fn ok(body: Value) -> Self {
        Self::new(StatusCode::OK).with_body(body)
    }

    /// `204 No Content`.
    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    /// Sets a header, replacing any existing value with the same name.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        set_header(&mut self.headers, name, value);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> Option<&Value> { self.body.as_ref() }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_send(&self) -> bool { self.send.is_some() }

    /// Applies status and headers, then either runs the `send` routine or
    /// writes the body as JSON. No body means an empty payload.
    pub(crate) async fn emit(self) -> Emitted {
        let mut sink = ResponseSink { status: self.status, headers: self.headers, body: Vec::new() };
        if let Some(send) = self.send {
            return send(sink).await.into_inner();
        }
        if let Some(body) = &self.body {
            sink.json(body);
        }
        sink.into_inner()
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("send", &self.send.is_some())
            .finish()
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`HttpResponse`].
///
/// Defaults to `200 OK`. Terminated by a body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        set_header(&mut self.headers, name, value);
        self
    }

    pub fn json(self, body: Value) -> HttpResponse {
        HttpResponse { status: self.status, headers: self.headers, body: Some(body), send: None }
    }

    pub fn no_body(self) -> HttpResponse {
        HttpResponse { status: self.status, headers: self.headers, body: None, send: None }
    }

    /// Terminate with a routine that writes the response itself. Status and
    /// headers set on the builder are applied to the sink first.
    ///
    /// ```rust
    /// use mediaroute::HttpResponse;
    ///
    /// let csv = HttpResponse::builder()
    ///     .header("content-type", "text/csv")
    ///     .send(|mut sink| async move {
    ///         sink.write(b"name\nhoney\n");
    ///         sink
    ///     });
    /// assert!(csv.has_send());
    /// ```
    pub fn send<F, Fut>(self, routine: F) -> HttpResponse
    where
        F: FnOnce(ResponseSink) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResponseSink> + Send + 'static,
    {
        HttpResponse {
            status: self.status,
            headers: self.headers,
            body: None,
            send: Some(Box::new(move |sink| Box::pin(routine(sink)))),
        }
    }
}

// ── ResponseSink ──────────────────────────────────────────────────────────────

/// The writable side of a response, handed to a custom `send` routine.
pub struct ResponseSink {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseSink {
    pub fn status(&mut self, code: StatusCode) -> &mut Self {
        self.status = code;
        self
    }

    pub fn header(&mut self, name: &str, value: &str) -> &mut Self {
        set_header(&mut self.headers, name, value);
        self
    }

    pub fn write(&mut self, chunk: &[u8]) -> &mut Self {
        self.body.extend_from_slice(chunk);
        self
    }

    /// Replaces the body with `value` serialised as JSON. Sets
    /// `content-type: application/json` unless one is already present.
    pub fn json(&mut self, value: &Value) -> &mut Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                if !self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
                    set_header(&mut self.headers, "content-type", "application/json");
                }
                self.body = bytes;
            }
            Err(e) => error!("failed to serialise response body: {e}"),
        }
        self
    }

    fn into_inner(self) -> Emitted {
        let mut response = http::Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() = self.status;
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => { headers.insert(name, value); }
                _ => warn!(header = %name, "dropping invalid response header"),
            }
        }
        response
    }
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    headers.push((name.to_ascii_lowercase(), value.to_owned()));
}

// ── Reply / IntoReply ─────────────────────────────────────────────────────────

/// The outcome of a handler, before response formatting.
#[derive(Debug)]
pub enum Reply {
    /// Nothing to send. Becomes `204 No Content`.
    Empty,
    /// A model for the negotiated response formatter.
    Model(Value),
    /// A finished response. Bypasses response formatting.
    Response(HttpResponse),
}

/// Conversion of a handler's return value into a [`Reply`].
///
/// Implemented for `()`, [`Value`], [`HttpResponse`], [`Json<T>`], and for
/// `Option` / `Result` wrappers of those. A JSON `null` counts as no value.
pub trait IntoReply {
    fn into_reply(self) -> Result<Reply, HttpError>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, HttpError> { Ok(self) }
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Reply, HttpError> { Ok(Reply::Empty) }
}

impl IntoReply for Value {
    fn into_reply(self) -> Result<Reply, HttpError> {
        Ok(match self {
            Value::Null => Reply::Empty,
            model => Reply::Model(model),
        })
    }
}

impl IntoReply for HttpResponse {
    fn into_reply(self) -> Result<Reply, HttpError> { Ok(Reply::Response(self)) }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Result<Reply, HttpError> {
        self.map_or(Ok(Reply::Empty), IntoReply::into_reply)
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<HttpError>,
{
    fn into_reply(self) -> Result<Reply, HttpError> {
        self.map_err(Into::into)?.into_reply()
    }
}

/// Returns any `Serialize` type from a handler as a model.
///
/// ```rust,ignore
/// async fn get_pet(params: RouteParams) -> Result<Json<Pet>, HttpError> {
///     Ok(Json(load(params.param("petId"))?))
/// }
/// ```
pub struct Json<T>(pub T);

impl<T: Serialize> IntoReply for Json<T> {
    fn into_reply(self) -> Result<Reply, HttpError> {
        serde_json::to_value(&self.0)
            .map_err(|e| HttpError::unknown(format!("failed to serialise model: {e}")))?
            .into_reply()
    }
}
