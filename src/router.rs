//! Route table construction and request dispatch.
//!
//! [`RouterAdapter::adapt`] asks a [`RouteProvider`] for its routes once,
//! joins each path onto the base path, and freezes them into a [`Router`]:
//! one radix tree per verb, immutable from then on.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http::request::Parts;
use matchit::Router as MatchitRouter;
use serde_json::{Value, json};
use tracing::info;

use crate::config::AdapterConfig;
use crate::error::{Error, HttpError};
use crate::error_handler::{ErrorHandler, JsonErrorHandler};
use crate::method::Method;
use crate::negotiate::is_content_type;
use crate::pipeline::Endpoint;
use crate::provider::RouteProvider;
use crate::request::Request;
use crate::response::{Emitted, HttpResponse};
use crate::security::{AnonymousProvider, SecurityContextProvider};

/// Binds route descriptors to the collaborators every request needs.
///
/// ```rust
/// use mediaroute::{AdapterConfig, RouteBuilder, RouteParams, RouterAdapter};
///
/// let routes = vec![
///     RouteBuilder::new()
///         .path("/pets/:petId")
///         .allow_anonymous()
///         .get(|p: RouteParams| async move { serde_json::json!({ "id": p.param("petId") }) })
///         .build()
///         .unwrap(),
/// ];
///
/// let router = RouterAdapter::new(AdapterConfig::new().with_base_path("/api"))
///     .adapt(&routes)
///     .unwrap();
/// ```
pub struct RouterAdapter {
    config: AdapterConfig,
    security: Arc<dyn SecurityContextProvider>,
    errors: Arc<dyn ErrorHandler>,
}

impl RouterAdapter {
    /// An adapter with [`AnonymousProvider`] and [`JsonErrorHandler`].
    pub fn new(config: AdapterConfig) -> Self {
        Self {
            config,
            security: Arc::new(AnonymousProvider),
            errors: Arc::new(JsonErrorHandler),
        }
    }

    pub fn security_context_provider(mut self, provider: impl SecurityContextProvider) -> Self {
        self.security = Arc::new(provider);
        self
    }

    pub fn error_handler(mut self, handler: impl ErrorHandler) -> Self {
        self.errors = Arc::new(handler);
        self
    }

    /// Builds the route table. Fails on a provider error, an invalid path or
    /// a duplicate verb + path pair.
    pub fn adapt(&self, provider: &dyn RouteProvider) -> Result<Router, Error> {
        let mut routes: HashMap<Method, MatchitRouter<Arc<Endpoint>>> = HashMap::new();
        let mut count = 0;

        for route in provider.routes()? {
            let verb = route.verb();
            let path = join_path(&self.config.base_path, route.path());
            let endpoint = Endpoint::new(
                route,
                Arc::clone(&self.security),
                Arc::clone(&self.errors),
                self.config.timeout,
            );
            routes.entry(verb)
                .or_default()
                .insert(to_pattern(&path), Arc::new(endpoint))
                .map_err(|e| Error::InvalidRoute { path: path.clone(), reason: e.to_string() })?;
            info!(%verb, %path, "route registered");
            count += 1;
        }

        info!(routes = count, base_path = %self.config.base_path, "route table built");
        Ok(Router {
            routes,
            errors: Arc::clone(&self.errors),
            body_limit: self.config.body_limit,
        })
    }
}

/// The frozen route table. Serve it with [`Server`](crate::Server) or call
/// [`handle`](Router::handle) directly.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Arc<Endpoint>>>,
    errors: Arc<dyn ErrorHandler>,
    body_limit: usize,
}

impl Router {
    /// Routes one request whose body has been fully read.
    pub async fn handle(&self, req: http::Request<Bytes>) -> Emitted {
        let (parts, body) = req.into_parts();
        let Some((method, endpoint, params)) = self.lookup(&parts) else {
            return not_found(&parts).emit().await;
        };

        match read_body(&parts, &body, self.body_limit) {
            Ok(body) => {
                let req = Request::new(method, parts.uri, parts.headers, params, body);
                endpoint.dispatch(req).await
            }
            Err(err) => {
                let req = Request::new(method, parts.uri, parts.headers, params, None);
                self.errors.handle(err, &req, None).emit().await
            }
        }
    }

    /// Answers a request that failed before its body could be read.
    pub(crate) async fn reject(&self, parts: Parts, err: HttpError) -> Emitted {
        let Some((method, _, params)) = self.lookup(&parts) else {
            return not_found(&parts).emit().await;
        };
        let req = Request::new(method, parts.uri, parts.headers, params, None);
        self.errors.handle(err, &req, None).emit().await
    }

    pub(crate) fn body_limit(&self) -> usize { self.body_limit }

    fn lookup(&self, parts: &Parts) -> Option<(Method, Arc<Endpoint>, HashMap<String, String>)> {
        let method = Method::try_from(&parts.method).ok()?;
        let tree = self.routes.get(&method)?;
        let matched = tree.at(parts.uri.path()).ok()?;
        let endpoint = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((method, endpoint, params))
    }
}

// ── Body intake ───────────────────────────────────────────────────────────────

/// `None` for an empty body or a JSON `null`; JSON media types are parsed,
/// anything else is kept as a string.
fn read_body(parts: &Parts, body: &Bytes, limit: usize) -> Result<Option<Value>, HttpError> {
    if body.is_empty() {
        return Ok(None);
    }
    if body.len() > limit {
        return Err(HttpError::payload_too_large(limit));
    }

    let content_type = parts.headers.get(http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    if is_content_type("application/json", content_type) || is_content_type("+json", content_type) {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| HttpError::bad_request(format!("invalid JSON body: {e}")))?;
        // A literal `null` counts as no body.
        return Ok((!value.is_null()).then_some(value));
    }
    Ok(Some(Value::String(String::from_utf8_lossy(body).into_owned())))
}

// ── Not found ─────────────────────────────────────────────────────────────────

fn not_found(parts: &Parts) -> HttpResponse {
    let path = parts.uri.path();
    let hostname = parts.uri.host()
        .or_else(|| parts.headers.get(http::header::HOST).and_then(|h| h.to_str().ok()))
        .map(|host| host.split(':').next().unwrap_or(host));
    let original_url = parts.uri.path_and_query().map_or(path, |pq| pq.as_str());

    HttpResponse::new(StatusCode::NOT_FOUND).with_body(json!({
        "statusCode": 404,
        "code": 10,
        "message": format!("The requested resource ({path}) was not found."),
        "developerMessage": format!(
            "No route matches {} {path}. Please check the spelling or id for the resource.",
            parts.method,
        ),
        "moreInfo": {
            "hostname": hostname,
            "originalUrl": original_url,
        },
    }))
}

// ── Paths ─────────────────────────────────────────────────────────────────────

/// Joins `base` and `path` with exactly one slash between segments and no
/// trailing slash. `("/api/", "/pets/")` → `/api/pets`.
pub(crate) fn join_path(base: &str, path: &str) -> String {
    let segments: Vec<&str> = base.split('/')
        .chain(path.split('/'))
        .filter(|s| !s.is_empty())
        .collect();
    format!("/{}", segments.join("/"))
}

/// Rewrites `:name` segments to the `{name}` syntax the radix tree expects.
fn to_pattern(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_join_without_duplicate_slashes() {
        assert_eq!(join_path("", "/pets/"), "/pets");
        assert_eq!(join_path("/api/", "/pets/:petId"), "/api/pets/:petId");
        assert_eq!(join_path("api", "/"), "/api");
        assert_eq!(join_path("", "/"), "/");
    }

    #[test]
    fn colon_params_become_braces() {
        assert_eq!(to_pattern("/pets/:petId/toys/:toyId"), "/pets/{petId}/toys/{toyId}");
        assert_eq!(to_pattern("/pets/{petId}"), "/pets/{petId}");
    }

    fn parts(content_type: Option<&str>) -> Parts {
        let mut builder = http::Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn json_bodies_are_parsed() {
        let body = Bytes::from_static(br#"{"a":1}"#);
        let parsed = read_body(&parts(Some("application/pet+json")), &body, 1024).unwrap();
        assert_eq!(parsed, Some(json!({ "a": 1 })));
    }

    #[test]
    fn json_null_is_no_body() {
        let body = Bytes::from_static(b" null ");
        assert_eq!(read_body(&parts(Some("application/json")), &body, 1024).unwrap(), None);
    }

    #[test]
    fn other_bodies_stay_strings() {
        let body = Bytes::from_static(b"name=honey");
        let parsed = read_body(&parts(Some("text/plain")), &body, 1024).unwrap();
        assert_eq!(parsed, Some(Value::String("name=honey".to_owned())));
        assert_eq!(read_body(&parts(None), &Bytes::new(), 1024).unwrap(), None);
    }

    #[test]
    fn malformed_or_oversized_bodies_fail() {
        let bad = read_body(&parts(Some("application/json")), &Bytes::from_static(b"{"), 1024);
        assert_eq!(bad.err().map(|e| e.status()), Some(StatusCode::BAD_REQUEST));

        let big = read_body(&parts(Some("application/json")), &Bytes::from_static(b"[1,2,3]"), 3);
        assert_eq!(big.err().map(|e| e.status()), Some(StatusCode::PAYLOAD_TOO_LARGE));
    }
}
