//! Shared helpers for in-process router tests.

#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;
use mediaroute::{
    AdapterConfig, BoxFuture, HttpError, Principal, Request, Route, Router, RouterAdapter,
    SecurityContext, SecurityContextProvider,
};
use serde_json::Value;

/// Treats the `authorization` header value as the principal's name.
pub struct HeaderPrincipal;

impl SecurityContextProvider for HeaderPrincipal {
    fn security_context<'a>(
        &'a self,
        req: &'a Request,
    ) -> BoxFuture<'a, Result<Arc<dyn SecurityContext>, HttpError>> {
        let context: Arc<dyn SecurityContext> = match req.header("authorization") {
            Some(name) => Arc::new(Principal(name.to_owned())),
            None => Arc::new(mediaroute::Anonymous),
        };
        Box::pin(async move { Ok(context) })
    }
}

pub fn router(routes: Vec<Route>) -> Router {
    router_with(AdapterConfig::new(), routes)
}

pub fn router_with(config: AdapterConfig, routes: Vec<Route>) -> Router {
    RouterAdapter::new(config)
        .security_context_provider(HeaderPrincipal)
        .adapt(&routes)
        .unwrap()
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(router: &Router, req: http::Request<Bytes>) -> Reply {
    let response = router.handle(req).await;
    let (parts, body) = response.into_parts();
    let body = body.collect().await.unwrap().to_bytes();
    Reply { status: parts.status, headers: parts.headers, body }
}

pub fn get(uri: &str) -> http::request::Builder {
    http::Request::builder().method("GET").uri(uri)
}

pub fn post(uri: &str) -> http::request::Builder {
    http::Request::builder().method("POST").uri(uri)
}

pub fn empty(builder: http::request::Builder) -> http::Request<Bytes> {
    builder.body(Bytes::new()).unwrap()
}

pub fn json_body(builder: http::request::Builder, content_type: &str, body: &Value) -> http::Request<Bytes> {
    builder
        .header("content-type", content_type)
        .body(Bytes::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}
