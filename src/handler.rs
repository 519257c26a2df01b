//! Handler trait and type erasure.
//!
//! A route stores handlers of different concrete types: the default one and
//! one per media-type binding. They are erased behind `Arc<dyn ErasedHandler>`
//! so a route descriptor can hold them uniformly and clone them cheaply.
//!
//! ```text
//! async fn get_pet(params: RouteParams) -> Value { … }   ← user writes this
//!        ↓ RouteBuilder::get(get_pet)
//! get_pet.into_boxed_handler()                           ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(get_pet))                           ← stored as BoxedHandler
//!        ↓
//! handler.call(params)  at request time                  ← one vtable dispatch
//!        ↓
//! Box::pin(async { get_pet(params).await.into_reply() })
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::HttpError;
use crate::request::RouteParams;
use crate::response::{IntoReply, Reply};

/// A heap-allocated, type-erased future.
///
/// Used for every asynchronous seam of the crate: handlers, formatters,
/// authorizers and security-context providers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Internal dispatch interface.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, params: RouteParams) -> BoxFuture<'static, Result<Reply, HttpError>>;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// Satisfied automatically by any function or closure with the shape:
///
/// ```text
/// async fn name(params: RouteParams) -> impl IntoReply
/// ```
///
/// Sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(RouteParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(RouteParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Newtype bridging a concrete handler `F` into the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(RouteParams) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn call(&self, params: RouteParams) -> BoxFuture<'static, Result<Reply, HttpError>> {
        let fut = (self.0)(params);
        Box::pin(async move { fut.await.into_reply() })
    }
}
