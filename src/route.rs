//! Declarative route descriptors.
//!
//! A route is described as data: verb, path, formatters, query keys,
//! authorizers, anonymous access and timeout. [`RouteBuilder`] is persistent.
//! Every method returns a new builder and leaves the receiver untouched, so a
//! half-built route can be shared as a template and branched.
//!
//! ```rust
//! use mediaroute::{Formatter, RouteBuilder};
//! use mediaroute::RouteParams;
//!
//! let pets = RouteBuilder::new().path("/pets").allow_anonymous();
//!
//! let list = pets.get(|_: RouteParams| async { serde_json::json!([]) }).build().unwrap();
//! let create = pets
//!     .media_type(Formatter::new("application/pet+json").from_request(|b, _| Ok(b)))
//!     .post(|_: RouteParams| async {})
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(list.path(), create.path());
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, HttpError};
use crate::formatter::Formatter;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::request::RouteParams;
use crate::security::{Authorizer, FnAuthorizer};

/// A formatter and the handler dedicated to it, if any.
#[derive(Clone)]
pub struct MediaTypeBinding {
    pub(crate) formatter: Formatter,
    pub(crate) handler: Option<BoxedHandler>,
}

impl MediaTypeBinding {
    pub fn formatter(&self) -> &Formatter { &self.formatter }
    pub fn has_handler(&self) -> bool { self.handler.is_some() }
}

impl fmt::Debug for MediaTypeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTypeBinding")
            .field("formatter", &self.formatter)
            .field("handler", &self.has_handler())
            .finish()
    }
}

// ── RouteBuilder ──────────────────────────────────────────────────────────────

/// Accumulates a route description. See the [module docs](self).
#[derive(Clone, Default)]
pub struct RouteBuilder {
    verb: Option<Method>,
    path: Option<String>,
    default_handler: Option<BoxedHandler>,
    bindings: Vec<MediaTypeBinding>,
    query_keys: Vec<String>,
    authorizers: Vec<Arc<dyn Authorizer>>,
    allow_anonymous: bool,
    timeout: Option<Duration>,
}

impl RouteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self, path: impl Into<String>) -> Self {
        Self { path: Some(path.into()), ..self.clone() }
    }

    /// Records the verb without a default handler. The handler is expected
    /// to come from a [`media_type_with`](Self::media_type_with) binding.
    pub fn verb(&self, verb: Method) -> Self {
        Self { verb: Some(verb), ..self.clone() }
    }

    fn on(&self, verb: Method, handler: impl Handler) -> Self {
        Self {
            verb: Some(verb),
            default_handler: Some(handler.into_boxed_handler()),
            ..self.clone()
        }
    }

    pub fn get(&self, handler: impl Handler) -> Self { self.on(Method::Get, handler) }
    pub fn post(&self, handler: impl Handler) -> Self { self.on(Method::Post, handler) }
    pub fn put(&self, handler: impl Handler) -> Self { self.on(Method::Put, handler) }
    pub fn patch(&self, handler: impl Handler) -> Self { self.on(Method::Patch, handler) }
    pub fn delete(&self, handler: impl Handler) -> Self { self.on(Method::Delete, handler) }

    /// Appends a formatter. Registration order is negotiation precedence.
    pub fn media_type(&self, formatter: Formatter) -> Self {
        self.bind(formatter, None)
    }

    /// Appends a formatter with a handler that takes over whenever this
    /// formatter is the one negotiated.
    pub fn media_type_with(&self, formatter: Formatter, handler: impl Handler) -> Self {
        self.bind(formatter, Some(handler.into_boxed_handler()))
    }

    fn bind(&self, formatter: Formatter, handler: Option<BoxedHandler>) -> Self {
        let mut bindings = self.bindings.clone();
        bindings.push(MediaTypeBinding { formatter, handler });
        Self { bindings, ..self.clone() }
    }

    /// Declares query keys to expose on [`RouteParams`]. Duplicates are ignored.
    pub fn query<I, S>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut query_keys = self.query_keys.clone();
        for key in keys {
            let key = key.into();
            if !query_keys.contains(&key) {
                query_keys.push(key);
            }
        }
        Self { query_keys, ..self.clone() }
    }

    /// Appends an authorizer. Authorizers run in registration order.
    pub fn authorize(&self, authorizer: impl Authorizer) -> Self {
        let mut authorizers = self.authorizers.clone();
        authorizers.push(Arc::new(authorizer));
        Self { authorizers, ..self.clone() }
    }

    /// Appends a synchronous authorizer closure.
    pub fn authorize_fn<F>(&self, check: F) -> Self
    where
        F: Fn(&RouteParams) -> Result<(), HttpError> + Send + Sync + 'static,
    {
        self.authorize(FnAuthorizer(check))
    }

    /// Lets requests without a principal through.
    pub fn allow_anonymous(&self) -> Self {
        Self { allow_anonymous: true, ..self.clone() }
    }

    /// Overrides the adapter-wide request timeout for this route.
    pub fn timeout(&self, timeout: Duration) -> Self {
        Self { timeout: Some(timeout), ..self.clone() }
    }

    /// Freezes the description.
    ///
    /// Fails when the verb or path is missing, when a formatter can neither
    /// format requests nor responses, or when no handler exists anywhere.
    /// A route with no formatters gets the pass-through formatter.
    pub fn build(&self) -> Result<Route, Error> {
        let path = self.path.clone()
            .ok_or_else(|| Error::Configuration("route has no path".to_owned()))?;
        let verb = self.verb
            .ok_or_else(|| Error::Configuration(format!("route `{path}` has no HTTP verb")))?;

        if let Some(idle) = self.bindings.iter()
            .find(|b| !b.formatter.formats_requests() && !b.formatter.formats_responses())
        {
            return Err(Error::Configuration(format!(
                "{verb} {path}: formatter `{}` formats neither requests nor responses",
                idle.formatter.label(),
            )));
        }
        if self.default_handler.is_none() && !self.bindings.iter().any(MediaTypeBinding::has_handler) {
            return Err(Error::Configuration(format!(
                "{verb} {path}: no default handler and no media type with a handler",
            )));
        }

        let bindings = if self.bindings.is_empty() {
            vec![MediaTypeBinding { formatter: Formatter::pass_through(), handler: None }]
        } else {
            self.bindings.clone()
        };

        Ok(Route {
            verb,
            path,
            default_handler: self.default_handler.clone(),
            bindings: bindings.into(),
            query_keys: self.query_keys.clone().into(),
            authorizers: self.authorizers.clone().into(),
            allow_anonymous: self.allow_anonymous,
            timeout: self.timeout,
        })
    }
}

impl fmt::Debug for RouteBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteBuilder")
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

// ── Route ─────────────────────────────────────────────────────────────────────

/// An immutable route descriptor, produced by [`RouteBuilder::build`].
#[derive(Clone)]
pub struct Route {
    pub(crate) verb: Method,
    pub(crate) path: String,
    pub(crate) default_handler: Option<BoxedHandler>,
    pub(crate) bindings: Arc<[MediaTypeBinding]>,
    pub(crate) query_keys: Arc<[String]>,
    pub(crate) authorizers: Arc<[Arc<dyn Authorizer>]>,
    pub(crate) allow_anonymous: bool,
    pub(crate) timeout: Option<Duration>,
}

impl Route {
    pub fn verb(&self) -> Method { self.verb }
    pub fn path(&self) -> &str { &self.path }
    pub fn bindings(&self) -> &[MediaTypeBinding] { &self.bindings }
    pub fn query_keys(&self) -> &[String] { &self.query_keys }
    pub fn allows_anonymous(&self) -> bool { self.allow_anonymous }
    pub fn timeout(&self) -> Option<Duration> { self.timeout }
    pub fn has_default_handler(&self) -> bool { self.default_handler.is_some() }
    pub fn authorizer_count(&self) -> usize { self.authorizers.len() }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("bindings", &self.bindings)
            .field("query_keys", &self.query_keys)
            .field("allow_anonymous", &self.allow_anonymous)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop(_: RouteParams) {}

    #[test]
    fn builder_methods_do_not_mutate_the_receiver() {
        let base = RouteBuilder::new().path("/pets");
        let anonymous = base.allow_anonymous();
        let with_query = base.query(["limit"]);

        let base = base.get(noop).build().unwrap();
        assert!(!base.allows_anonymous());
        assert!(base.query_keys().is_empty());

        assert!(anonymous.get(noop).build().unwrap().allows_anonymous());
        assert_eq!(with_query.get(noop).build().unwrap().query_keys(), ["limit"]);
    }

    #[test]
    fn branches_do_not_share_formatters() {
        let base = RouteBuilder::new().path("/").media_type(Formatter::new("a/a").for_response(|m, _| Ok(m)));
        let left = base.media_type(Formatter::new("b/b").for_response(|m, _| Ok(m))).get(noop).build().unwrap();
        let right = base.get(noop).build().unwrap();
        assert_eq!(left.bindings().len(), 2);
        assert_eq!(right.bindings().len(), 1);
    }

    #[test]
    fn formatter_order_is_preserved() {
        let route = RouteBuilder::new()
            .path("/pets/:petId")
            .media_type(Formatter::new("application/json").for_response(|m, _| Ok(m)))
            .media_type(Formatter::new("application/pet+json").for_response(|m, _| Ok(m)))
            .get(noop)
            .build()
            .unwrap();
        let types: Vec<_> = route.bindings().iter().filter_map(|b| b.formatter().media_type()).collect();
        assert_eq!(types, ["application/json", "application/pet+json"]);
    }

    #[test]
    fn missing_path_or_verb_is_a_configuration_error() {
        assert!(matches!(RouteBuilder::new().get(noop).build(), Err(Error::Configuration(_))));
        assert!(matches!(RouteBuilder::new().path("/").build(), Err(Error::Configuration(_))));
    }

    #[test]
    fn formatter_without_capabilities_is_rejected() {
        let err = RouteBuilder::new()
            .path("/")
            .media_type(Formatter::new("application/nothing"))
            .get(noop)
            .build();
        assert!(matches!(err, Err(Error::Configuration(msg)) if msg.contains("application/nothing")));
    }

    #[test]
    fn verb_without_handler_needs_a_bound_handler() {
        let formatter = Formatter::new("application/pet+json").for_response(|m, _| Ok(m));
        let unbound = RouteBuilder::new().path("/").verb(Method::Get).media_type(formatter.clone());
        assert!(unbound.build().is_err());

        let bound = RouteBuilder::new().path("/").verb(Method::Get).media_type_with(formatter, noop);
        let route = bound.build().unwrap();
        assert_eq!(route.verb(), Method::Get);
        assert!(!route.has_default_handler());
    }

    #[test]
    fn empty_formatter_list_gets_pass_through() {
        let route = RouteBuilder::new().path("/").get(noop).build().unwrap();
        assert_eq!(route.bindings().len(), 1);
        let formatter = route.bindings()[0].formatter();
        assert_eq!(formatter.media_type(), None);
        assert!(formatter.formats_requests() && formatter.formats_responses());
    }

    #[test]
    fn last_verb_wins() {
        let route = RouteBuilder::new().path("/").get(noop).delete(noop).build().unwrap();
        assert_eq!(route.verb(), Method::Delete);
    }

    #[test]
    fn query_keys_are_a_set() {
        let route = RouteBuilder::new().path("/").query(["a", "b"]).query(["a"]).get(noop).build().unwrap();
        assert_eq!(route.query_keys(), ["a", "b"]);
    }
}
