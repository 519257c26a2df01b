//! Incoming request and the parameter object handed to handlers.

use std::collections::HashMap;
use std::sync::Arc;

use http::{HeaderMap, Uri};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::HttpError;
use crate::method::Method;
use crate::security::SecurityContext;

/// An incoming HTTP request whose body has already been read.
///
/// The body is `None` when the request carried no bytes. JSON media types
/// (`application/json` and any `+json` suffix) arrive parsed; anything else
/// arrives as a JSON string.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Option<Value>,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        params: HashMap<String, String>,
        body: Option<Value>,
    ) -> Self {
        let query = parse_query(uri.query());
        Self { method, uri, headers, params, query, body }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> Option<&Value> { self.body.as_ref() }

    /// Path and query as received, e.g. `/pets?limit=2`.
    pub fn url(&self) -> &str {
        self.uri.path_and_query().map_or("/", |pq| pq.as_str())
    }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/pets/{petId}`, `req.param("petId")` on `/pets/7` returns `Some("7")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Any query parameter, declared or not. Repeated keys keep the first value.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }
}

fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut parsed = HashMap::new();
    for (k, v) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        parsed.entry(k.into_owned()).or_insert_with(|| v.into_owned());
    }
    parsed
}

// ── RouteParams ───────────────────────────────────────────────────────────────

/// Everything a handler (and every authorizer) sees about one request.
///
/// Only the query keys the route declared with
/// [`RouteBuilder::query`](crate::RouteBuilder::query) are exposed here;
/// the raw request still has all of them.
pub struct RouteParams {
    params: HashMap<String, String>,
    query: HashMap<String, String>,
    request: Arc<Request>,
    model: Option<Value>,
    security_context: Arc<dyn SecurityContext>,
}

impl RouteParams {
    pub(crate) fn new(
        request: Arc<Request>,
        query_keys: &[String],
        model: Option<Value>,
        security_context: Arc<dyn SecurityContext>,
    ) -> Self {
        let query = query_keys.iter()
            .filter_map(|key| request.query(key).map(|v| (key.clone(), v.to_owned())))
            .collect();
        Self {
            params: request.params.clone(),
            query,
            request,
            model,
            security_context,
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn request(&self) -> &Request { &self.request }

    /// The raw body, before request formatting.
    pub fn body(&self) -> Option<&Value> { self.request.body() }

    /// The body after request formatting. Present only when a body was sent.
    pub fn model(&self) -> Option<&Value> { self.model.as_ref() }

    pub fn into_model(self) -> Option<Value> { self.model }

    /// Deserialises the formatted model. A missing model or a shape mismatch
    /// is a `400 Bad Request`.
    pub fn model_as<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        let model = self.model.as_ref()
            .ok_or_else(|| HttpError::bad_request("a request body is required"))?;
        Ok(T::deserialize(model)?)
    }

    pub fn security_context(&self) -> &dyn SecurityContext {
        self.security_context.as_ref()
    }

    pub fn principal(&self) -> Option<&str> {
        self.security_context.principal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Anonymous;
    use serde::Deserialize;
    use serde_json::json;

    fn request(uri: &str, body: Option<Value>) -> Arc<Request> {
        let params = HashMap::from([("petId".to_owned(), "7".to_owned())]);
        Arc::new(Request::new(Method::Post, uri.parse().unwrap(), HeaderMap::new(), params, body))
    }

    #[test]
    fn only_declared_query_keys_are_exposed() {
        let req = request("/pets/7?limit=2&secret=x&limit=9", None);
        let params = RouteParams::new(req, &["limit".to_owned(), "offset".to_owned()], None, Arc::new(Anonymous));

        assert_eq!(params.query("limit"), Some("2"));
        assert_eq!(params.query("secret"), None);
        assert_eq!(params.query("offset"), None);
        assert_eq!(params.request().query("secret"), Some("x"));
        assert_eq!(params.param("petId"), Some("7"));
    }

    #[test]
    fn query_values_are_percent_decoded() {
        let req = request("/pets?name=honey%20bee", None);
        assert_eq!(req.query("name"), Some("honey bee"));
        assert_eq!(req.url(), "/pets?name=honey%20bee");
    }

    #[test]
    fn model_deserialises() {
        #[derive(Deserialize)]
        struct Pet { name: String }

        let req = request("/pets", Some(json!({ "name": "raw" })));
        let params = RouteParams::new(req, &[], Some(json!({ "name": "honey" })), Arc::new(Anonymous));
        let pet: Pet = params.model_as().unwrap();
        assert_eq!(pet.name, "honey");
        assert_eq!(params.body(), Some(&json!({ "name": "raw" })));
    }

    #[test]
    fn missing_model_is_bad_request() {
        let params = RouteParams::new(request("/pets", None), &[], None, Arc::new(Anonymous));
        let err = params.model_as::<Value>().err().map(|e| e.status());
        assert_eq!(err, Some(http::StatusCode::BAD_REQUEST));
    }
}
