//! The per-request lifecycle.
//!
//! ```text
//! RECEIVED → NEGOTIATED → AUTHENTICATED → AUTHORIZED → HANDLED → FORMATTED → EMITTED
//!     └──────────┴─────────────┴──────────────┴───────────┴──────────┴──→ FAILED
//! ```
//!
//! Within one request the states are strictly sequential. Across requests
//! nothing is shared except the read-only route table.
//!
//! # Timeouts
//!
//! The lifecycle runs on its own task. The dispatching task arms the timer.
//! Both race to claim a single-assignment [`Completion`]; whoever claims it
//! produces the response and the other side's result is discarded. A handler
//! that loses keeps running to completion, its result unobserved.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::HttpError;
use crate::error_handler::ErrorHandler;
use crate::formatter::{FormatContext, Formatted};
use crate::negotiate::negotiate;
use crate::request::{Request, RouteParams};
use crate::response::{Emitted, HttpResponse, Reply};
use crate::route::{MediaTypeBinding, Route};
use crate::security::{SecurityContext, SecurityContextProvider};

/// Header set on a `204` produced because a model had no formatter to go through.
pub const DEBUG_HEADER: &str = "wl-debug";

/// Single-assignment slot deciding which side answers the request.
#[derive(Default)]
struct Completion {
    claimed: AtomicBool,
}

impl Completion {
    /// `true` for exactly one caller.
    fn claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// A registered route bound to its collaborators.
pub(crate) struct Endpoint {
    route: Route,
    security: Arc<dyn SecurityContextProvider>,
    errors: Arc<dyn ErrorHandler>,
    timeout: Option<Duration>,
}

impl Endpoint {
    pub(crate) fn new(
        route: Route,
        security: Arc<dyn SecurityContextProvider>,
        errors: Arc<dyn ErrorHandler>,
        default_timeout: Option<Duration>,
    ) -> Self {
        let timeout = route.timeout.or(default_timeout);
        Self { route, security, errors, timeout }
    }

    /// Serves one request. Always produces exactly one response.
    pub(crate) async fn dispatch(self: Arc<Self>, req: Request) -> Emitted {
        let req = Arc::new(req);
        let completion = Arc::new(Completion::default());

        let mut lifecycle = tokio::spawn({
            let endpoint = Arc::clone(&self);
            let req = Arc::clone(&req);
            let completion = Arc::clone(&completion);
            async move { endpoint.lifecycle(req, &completion).await }
        });

        let joined = match self.timeout {
            None => (&mut lifecycle).await,
            Some(limit) => {
                tokio::select! {
                    joined = &mut lifecycle => joined,
                    () = tokio::time::sleep(limit) => {
                        if completion.claim() {
                            debug!(method = %req.method(), url = req.url(), ?limit, "request timed out");
                            return self.errors.handle(HttpError::timeout(), &req, None).emit().await;
                        }
                        // The lifecycle claimed first and is emitting; let it finish.
                        (&mut lifecycle).await
                    }
                }
            }
        };

        let err = match joined {
            Ok(Some(emitted)) => return emitted,
            Ok(None) => HttpError::unknown("lifecycle finished without a response"),
            Err(e) => HttpError::unknown(format!("lifecycle task failed: {e}")),
        };
        self.errors.handle(err, &req, None).emit().await
    }

    /// Runs the states in order. Returns `None` when the timer already answered.
    async fn lifecycle(&self, req: Arc<Request>, completion: &Completion) -> Option<Emitted> {
        let mut security = None;
        let outcome = self.run(&req, &mut security).await;

        if !completion.claim() {
            debug!(method = %req.method(), url = req.url(), "discarding result of timed-out request");
            return None;
        }
        let response = match outcome {
            Ok(response) => response,
            Err(err) => self.errors.handle(err, &req, security.as_deref()),
        };
        Some(response.emit().await)
    }

    async fn run(
        &self,
        req: &Arc<Request>,
        security: &mut Option<Arc<dyn SecurityContext>>,
    ) -> Result<HttpResponse, HttpError> {
        // NEGOTIATED
        let negotiated = negotiate(&self.route, req)?;
        debug!(method = %req.method(), url = req.url(), "negotiated");

        // AUTHENTICATED
        let context = self.security.security_context(req).await?;
        debug!(principal = ?context.principal(), "authenticated");
        *security = Some(Arc::clone(&context));

        // AUTHORIZED
        if !self.route.allow_anonymous && context.principal().is_none() {
            return Err(HttpError::unauthorized());
        }
        let cx = FormatContext::new(Arc::clone(req));
        let model = match (negotiated.request, req.body()) {
            (Some(binding), Some(body)) => Some(format_request(binding, body.clone(), &cx).await?),
            _ => None,
        };
        let params = RouteParams::new(Arc::clone(req), &self.route.query_keys, model, context);
        for authorizer in self.route.authorizers.iter() {
            authorizer.authorize(&params).await.map_err(HttpError::into_authorization)?;
        }

        // HANDLED
        let reply = negotiated.handler.call(params).await?;

        // FORMATTED
        format_response(reply, negotiated.response, &cx).await
    }
}

async fn format_request(
    binding: &MediaTypeBinding,
    body: Value,
    cx: &FormatContext,
) -> Result<Value, HttpError> {
    match binding.formatter.request_capability() {
        Some(format) => format.format_from_request(body, cx).await,
        None => Err(HttpError::configuration("negotiated request formatter cannot format requests")),
    }
}

/// Turns a handler's reply into a response.
///
/// A finished response from the handler is used as is. A model needs the
/// negotiated response formatter; without one the reply degrades to an empty
/// `204` carrying [`DEBUG_HEADER`]. Whatever the formatter produces is stamped
/// with its media type unless it already names a content type.
async fn format_response(
    reply: Reply,
    binding: Option<&MediaTypeBinding>,
    cx: &FormatContext,
) -> Result<HttpResponse, HttpError> {
    let model = match reply {
        Reply::Empty => return Ok(HttpResponse::no_content()),
        Reply::Response(response) => return Ok(response),
        Reply::Model(model) => model,
    };
    let Some((binding, format)) = binding.and_then(|b| Some((b, b.formatter.response_capability()?))) else {
        return Ok(HttpResponse::no_content().with_header(DEBUG_HEADER, "unable to format response"));
    };

    let response = match format.format_for_response(model, cx).await? {
        Formatted::Response(response) => response,
        Formatted::Model(model) => HttpResponse::ok(model),
    };
    // The formatter's own content-type, if it set one, wins.
    Ok(match binding.formatter.media_type() {
        Some(media_type) if response.header("content-type").is_none() => {
            response.with_header("content-type", media_type)
        }
        _ => response,
    })
}
