//! Route providers: where the route table comes from.

use std::sync::Arc;

use crate::error::Error;
use crate::route::Route;

/// Supplies the ordered list of routes to register.
///
/// Called once, when the adapter builds its route table.
pub trait RouteProvider: Send + Sync {
    fn routes(&self) -> Result<Vec<Route>, Error>;
}

impl RouteProvider for Vec<Route> {
    fn routes(&self) -> Result<Vec<Route>, Error> {
        Ok(self.clone())
    }
}

impl<F> RouteProvider for F
where
    F: Fn() -> Result<Vec<Route>, Error> + Send + Sync,
{
    fn routes(&self) -> Result<Vec<Route>, Error> {
        self()
    }
}

/// Concatenates several providers' routes in registration order.
#[derive(Clone, Default)]
pub struct CompositeRouteProvider {
    providers: Vec<Arc<dyn RouteProvider>>,
}

impl CompositeRouteProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl RouteProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }
}

impl RouteProvider for CompositeRouteProvider {
    fn routes(&self) -> Result<Vec<Route>, Error> {
        let mut routes = Vec::new();
        for provider in &self.providers {
            routes.extend(provider.routes()?);
        }
        Ok(routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RouteBuilder, RouteParams};

    async fn noop(_: RouteParams) {}

    fn route(path: &str) -> Route {
        RouteBuilder::new().path(path).get(noop).build().unwrap()
    }

    #[test]
    fn composite_keeps_provider_order() {
        let composite = CompositeRouteProvider::new()
            .with(vec![route("/a"), route("/b")])
            .with(|| Ok::<_, Error>(vec![route("/c")]));

        let paths: Vec<_> = composite.routes().unwrap().iter().map(|r| r.path().to_owned()).collect();
        assert_eq!(paths, ["/a", "/b", "/c"]);
    }

    #[test]
    fn provider_errors_propagate() {
        let composite = CompositeRouteProvider::new()
            .with(vec![route("/a")])
            .with(|| RouteBuilder::new().get(noop).build().map(|r| vec![r]));
        assert!(matches!(composite.routes(), Err(Error::Configuration(_))));
    }
}
