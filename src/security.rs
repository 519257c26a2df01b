//! Authentication and authorization seams.
//!
//! How a principal is derived from a request is not this crate's business.
//! A [`SecurityContextProvider`] is asked once per request; the pipeline only
//! checks whether the resulting context has a principal, then runs the
//! route's [`Authorizer`]s in order.

use std::sync::Arc;

use crate::error::HttpError;
use crate::handler::BoxFuture;
use crate::request::{Request, RouteParams};

/// The per-request authentication result.
pub trait SecurityContext: Send + Sync + 'static {
    fn principal(&self) -> Option<&str>;

    /// A representation safe to write to logs: no tokens, no secrets.
    fn to_log_safe_string(&self) -> String;
}

/// Produces a fresh [`SecurityContext`] for each request.
///
/// An error fails the request with whatever status it carries.
pub trait SecurityContextProvider: Send + Sync + 'static {
    fn security_context<'a>(
        &'a self,
        req: &'a Request,
    ) -> BoxFuture<'a, Result<Arc<dyn SecurityContext>, HttpError>>;
}

/// A context with no principal.
#[derive(Clone, Copy, Debug, Default)]
pub struct Anonymous;

impl SecurityContext for Anonymous {
    fn principal(&self) -> Option<&str> { None }

    fn to_log_safe_string(&self) -> String {
        "SecurityContext: none".to_owned()
    }
}

/// A context for an identified caller.
#[derive(Clone, Debug)]
pub struct Principal(pub String);

impl SecurityContext for Principal {
    fn principal(&self) -> Option<&str> { Some(&self.0) }

    fn to_log_safe_string(&self) -> String {
        format!("SecurityContext: principal={}", self.0)
    }
}

/// The default provider: every request is [`Anonymous`].
#[derive(Clone, Copy, Debug, Default)]
pub struct AnonymousProvider;

impl SecurityContextProvider for AnonymousProvider {
    fn security_context<'a>(
        &'a self,
        _req: &'a Request,
    ) -> BoxFuture<'a, Result<Arc<dyn SecurityContext>, HttpError>> {
        Box::pin(async { Ok(Arc::new(Anonymous) as Arc<dyn SecurityContext>) })
    }
}

// ── Authorizer ────────────────────────────────────────────────────────────────

/// A per-route access check, run after authentication and before the handler.
///
/// Returning an error stops the request. Errors built with
/// [`HttpError::new`] are classified as authorization failures and keep
/// their status.
pub trait Authorizer: Send + Sync + 'static {
    fn authorize<'a>(&'a self, params: &'a RouteParams) -> BoxFuture<'a, Result<(), HttpError>>;
}

/// Adapter for synchronous closure authorizers, see
/// [`RouteBuilder::authorize_fn`](crate::RouteBuilder::authorize_fn).
pub(crate) struct FnAuthorizer<F>(pub(crate) F);

impl<F> Authorizer for FnAuthorizer<F>
where
    F: Fn(&RouteParams) -> Result<(), HttpError> + Send + Sync + 'static,
{
    fn authorize<'a>(&'a self, params: &'a RouteParams) -> BoxFuture<'a, Result<(), HttpError>> {
        let outcome = (self.0)(params);
        Box::pin(std::future::ready(outcome))
    }
}
