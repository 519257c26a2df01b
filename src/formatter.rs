//! Media-type formatters.
//!
//! A [`Formatter`] converts between the wire representation of one media type
//! and the model a handler works with. It may format requests, responses, or
//! both; which of the two it can do is a capability, not a type. A formatter
//! with neither capability is rejected when the route is built.
//!
//! ```rust
//! use mediaroute::Formatter;
//! use serde_json::json;
//!
//! let pet = Formatter::new("application/pet+json")
//!     .from_request(|body, _cx| Ok(json!({ "firstName": body["firstName"] })))
//!     .for_response(|model, _cx| Ok(json!({ "firstName": model["firstName"] })));
//!
//! assert_eq!(pet.media_type(), Some("application/pet+json"));
//! assert!(pet.formats_requests() && pet.formats_responses());
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::HttpError;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::HttpResponse;

/// What a formatter sees besides the value it converts.
#[derive(Clone)]
pub struct FormatContext {
    request: Arc<Request>,
}

impl FormatContext {
    pub(crate) fn new(request: Arc<Request>) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &Request { &self.request }
}

/// Output of response formatting: a model to wrap in `200 OK`, or a finished
/// response.
#[derive(Debug)]
pub enum Formatted {
    Model(Value),
    Response(HttpResponse),
}

impl From<Value> for Formatted {
    fn from(model: Value) -> Self { Self::Model(model) }
}

impl From<HttpResponse> for Formatted {
    fn from(response: HttpResponse) -> Self { Self::Response(response) }
}

/// Converts an inbound body into a request model.
pub trait RequestFormat: Send + Sync + 'static {
    fn format_from_request<'a>(
        &'a self,
        body: Value,
        cx: &'a FormatContext,
    ) -> BoxFuture<'a, Result<Value, HttpError>>;
}

/// Converts a handler's model into a response model.
pub trait ResponseFormat: Send + Sync + 'static {
    fn format_for_response<'a>(
        &'a self,
        model: Value,
        cx: &'a FormatContext,
    ) -> BoxFuture<'a, Result<Formatted, HttpError>>;
}

struct FnRequestFormat<F>(F);

impl<F> RequestFormat for FnRequestFormat<F>
where
    F: Fn(Value, &FormatContext) -> Result<Value, HttpError> + Send + Sync + 'static,
{
    fn format_from_request<'a>(
        &'a self,
        body: Value,
        cx: &'a FormatContext,
    ) -> BoxFuture<'a, Result<Value, HttpError>> {
        Box::pin(std::future::ready((self.0)(body, cx)))
    }
}

struct FnResponseFormat<F>(F);

impl<F, R> ResponseFormat for FnResponseFormat<F>
where
    F: Fn(Value, &FormatContext) -> Result<R, HttpError> + Send + Sync + 'static,
    R: Into<Formatted>,
{
    fn format_for_response<'a>(
        &'a self,
        model: Value,
        cx: &'a FormatContext,
    ) -> BoxFuture<'a, Result<Formatted, HttpError>> {
        Box::pin(std::future::ready((self.0)(model, cx).map(Into::into)))
    }
}

// ── Formatter ─────────────────────────────────────────────────────────────────

/// A media type plus its optional request and response capabilities.
///
/// Cheap to clone; the capabilities are shared, so they must not hold
/// per-request state.
#[derive(Clone, Default)]
pub struct Formatter {
    media_type: Option<String>,
    request: Option<Arc<dyn RequestFormat>>,
    response: Option<Arc<dyn ResponseFormat>>,
}

impl Formatter {
    /// A formatter bound to one media type, e.g. `application/pet+json`.
    pub fn new(media_type: impl Into<String>) -> Self {
        Self { media_type: Some(media_type.into()), ..Self::default() }
    }

    /// A formatter without a declared media type. It matches any
    /// `Content-Type` and any `Accept`, so register it last.
    pub fn any() -> Self {
        Self::default()
    }

    /// Identity in both directions, no declared media type. Used implicitly
    /// by routes that register no formatter.
    pub fn pass_through() -> Self {
        Self::any()
            .from_request(|body, _| Ok(body))
            .for_response(|model, _| Ok(model))
    }

    pub fn from_request<F>(self, format: F) -> Self
    where
        F: Fn(Value, &FormatContext) -> Result<Value, HttpError> + Send + Sync + 'static,
    {
        self.request_format(FnRequestFormat(format))
    }

    pub fn for_response<F, R>(self, format: F) -> Self
    where
        F: Fn(Value, &FormatContext) -> Result<R, HttpError> + Send + Sync + 'static,
        R: Into<Formatted> + 'static,
    {
        self.response_format(FnResponseFormat(format))
    }

    /// Attaches an asynchronous or stateful request capability.
    pub fn request_format(mut self, format: impl RequestFormat) -> Self {
        self.request = Some(Arc::new(format));
        self
    }

    /// Attaches an asynchronous or stateful response capability.
    pub fn response_format(mut self, format: impl ResponseFormat) -> Self {
        self.response = Some(Arc::new(format));
        self
    }

    pub fn media_type(&self) -> Option<&str> { self.media_type.as_deref() }
    pub fn formats_requests(&self) -> bool { self.request.is_some() }
    pub fn formats_responses(&self) -> bool { self.response.is_some() }

    pub(crate) fn request_capability(&self) -> Option<&dyn RequestFormat> {
        self.request.as_deref()
    }

    pub(crate) fn response_capability(&self) -> Option<&dyn ResponseFormat> {
        self.response.as_deref()
    }

    /// The label used when listing supported types in 406/415 messages.
    pub(crate) fn label(&self) -> &str {
        self.media_type().unwrap_or("*/*")
    }
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatter")
            .field("media_type", &self.media_type)
            .field("request", &self.formats_requests())
            .field("response", &self.formats_responses())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use serde_json::json;

    fn cx() -> FormatContext {
        FormatContext::new(Arc::new(Request::new(
            crate::Method::Post,
            http::Uri::from_static("/"),
            http::HeaderMap::new(),
            HashMap::new(),
            None,
        )))
    }

    #[tokio::test]
    async fn pass_through_is_identity() {
        let formatter = Formatter::pass_through();
        let cx = cx();
        assert_eq!(formatter.media_type(), None);

        let body = json!({ "hello": "world" });
        let request = formatter.request_capability().unwrap();
        assert_eq!(request.format_from_request(body.clone(), &cx).await.unwrap(), body);

        let response = formatter.response_capability().unwrap();
        match response.format_for_response(body.clone(), &cx).await.unwrap() {
            Formatted::Model(model) => assert_eq!(model, body),
            Formatted::Response(_) => panic!("expected a model"),
        }
    }

    #[tokio::test]
    async fn response_capability_may_return_a_response() {
        let formatter = Formatter::new("text/csv").for_response(|_, _| {
            Ok(HttpResponse::new(http::StatusCode::ACCEPTED))
        });
        let cx = cx();
        let formatted = formatter.response_capability().unwrap()
            .format_for_response(json!(1), &cx)
            .await
            .unwrap();
        assert!(matches!(formatted, Formatted::Response(r) if r.status() == http::StatusCode::ACCEPTED));
    }

    /// Numbers each model it sees; the counter is shared across requests.
    #[derive(Default)]
    struct Sequenced {
        next: std::sync::atomic::AtomicU64,
    }

    impl Sequenced {
        async fn stamp(&self, mut value: Value) -> Value {
            tokio::task::yield_now().await;
            value["seq"] = self.next.fetch_add(1, std::sync::atomic::Ordering::SeqCst).into();
            value
        }
    }

    impl RequestFormat for Sequenced {
        fn format_from_request<'a>(
            &'a self,
            body: Value,
            _cx: &'a FormatContext,
        ) -> BoxFuture<'a, Result<Value, HttpError>> {
            Box::pin(async move { Ok(self.stamp(body).await) })
        }
    }

    impl ResponseFormat for Sequenced {
        fn format_for_response<'a>(
            &'a self,
            model: Value,
            cx: &'a FormatContext,
        ) -> BoxFuture<'a, Result<Formatted, HttpError>> {
            Box::pin(async move {
                let mut model = self.stamp(model).await;
                model["path"] = cx.request().path().into();
                Ok(Formatted::Model(model))
            })
        }
    }

    #[tokio::test]
    async fn trait_capabilities_are_async_and_stateful() {
        let shared = Arc::new(Sequenced::default());
        let formatter = Formatter::new("application/seq+json")
            .request_format(SharedRequest(Arc::clone(&shared)))
            .response_format(SharedResponse(shared));
        assert!(formatter.formats_requests() && formatter.formats_responses());
        let cx = cx();

        let request = formatter.request_capability().unwrap();
        let first = request.format_from_request(json!({}), &cx).await.unwrap();
        assert_eq!(first, json!({ "seq": 0 }));

        let response = formatter.response_capability().unwrap();
        match response.format_for_response(json!({}), &cx).await.unwrap() {
            Formatted::Model(model) => assert_eq!(model, json!({ "seq": 1, "path": "/" })),
            Formatted::Response(_) => panic!("expected a model"),
        }
    }

    struct SharedRequest(Arc<Sequenced>);

    impl RequestFormat for SharedRequest {
        fn format_from_request<'a>(
            &'a self,
            body: Value,
            cx: &'a FormatContext,
        ) -> BoxFuture<'a, Result<Value, HttpError>> {
            self.0.format_from_request(body, cx)
        }
    }

    struct SharedResponse(Arc<Sequenced>);

    impl ResponseFormat for SharedResponse {
        fn format_for_response<'a>(
            &'a self,
            model: Value,
            cx: &'a FormatContext,
        ) -> BoxFuture<'a, Result<Formatted, HttpError>> {
            self.0.format_for_response(model, cx)
        }
    }

    #[test]
    fn capabilities_are_optional() {
        let formatter = Formatter::new("application/pets+json").for_response(|m, _| Ok(m));
        assert!(!formatter.formats_requests());
        assert!(formatter.formats_responses());
        assert!(!Formatter::new("text/plain").formats_responses());
    }
}
