//! # mediaroute
//!
//! Declarative HTTP routes with media-type negotiation, on top of hyper.
//!
//! A route is data: a verb, a path, an ordered list of media-type formatters,
//! the query keys it reads, the authorizers it runs, whether it allows
//! anonymous callers, and how long it may take. The adapter turns each
//! request into exactly one handler call and each handler result into
//! exactly one response.
//!
//! ## The request lifecycle
//!
//! 1. **Negotiate.** `Content-Type` picks the request formatter, `Accept`
//!    picks the response formatter. First registered match wins. No
//!    formatters means pass-through JSON.
//! 2. **Authenticate.** The [`SecurityContextProvider`] is asked for a
//!    context. Routes without [`allow_anonymous`](RouteBuilder::allow_anonymous)
//!    answer `401` when it has no principal.
//! 3. **Authorize.** Each [`Authorizer`] runs in order.
//! 4. **Handle.** The handler bound to the request formatter, else the one
//!    bound to the response formatter, else the route default.
//! 5. **Format and emit.** No value → `204`. A model goes through the
//!    response formatter and is stamped with its media type.
//!
//! Every failure becomes an [`HttpError`] and is emitted once by the
//! [`ErrorHandler`]. A timeout answers `503` and discards whatever the
//! handler produces later.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use mediaroute::{AdapterConfig, Formatter, RouteBuilder, RouteParams, RouterAdapter, Server};
//! use serde_json::{Value, json};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mediaroute::Error> {
//!     let pet = Formatter::new("application/pet+json")
//!         .from_request(|body, _| Ok(json!({ "name": body["name"] })))
//!         .for_response(|model, _| Ok(json!({ "name": model["name"] })));
//!
//!     let routes = vec![
//!         RouteBuilder::new()
//!             .path("/pets/:petId")
//!             .allow_anonymous()
//!             .media_type(pet.clone())
//!             .get(get_pet)
//!             .build()?,
//!         RouteBuilder::new()
//!             .path("/pets")
//!             .allow_anonymous()
//!             .media_type(pet)
//!             .post(create_pet)
//!             .build()?,
//!     ];
//!
//!     let router = RouterAdapter::new(AdapterConfig::from_env()?).adapt(&routes)?;
//!     Server::bind(([0, 0, 0, 0], 3000).into()).serve(router).await
//! }
//!
//! async fn get_pet(params: RouteParams) -> Value {
//!     json!({ "name": params.param("petId") })
//! }
//!
//! async fn create_pet(params: RouteParams) -> Option<Value> {
//!     params.into_model()
//! }
//! ```

mod config;
mod error;
mod error_handler;
mod formatter;
mod handler;
mod method;
pub mod negotiate;
mod pipeline;
mod provider;
mod request;
mod response;
mod route;
mod router;
mod security;
mod server;

pub use config::{AdapterConfig, DEFAULT_BODY_LIMIT};
pub use error::{Error, ErrorKind, HttpError};
pub use error_handler::{ErrorHandler, JsonErrorHandler};
pub use formatter::{FormatContext, Formatted, Formatter, RequestFormat, ResponseFormat};
pub use handler::{BoxFuture, Handler};
pub use method::Method;
pub use pipeline::DEBUG_HEADER;
pub use provider::{CompositeRouteProvider, RouteProvider};
pub use request::{Request, RouteParams};
pub use response::{Emitted, HttpResponse, IntoReply, Json, Reply, ResponseBuilder, ResponseSink};
pub use route::{MediaTypeBinding, Route, RouteBuilder};
pub use router::{Router, RouterAdapter};
pub use security::{
    Anonymous, AnonymousProvider, Authorizer, Principal, SecurityContext, SecurityContextProvider,
};
pub use server::Server;
