//! Plain handler trait, type erasure and handler chains.
//!
//! # How handlers are stored
//!
//! The router holds handlers of *different* types in one table, so each is
//! hidden behind a trait object (`dyn ErasedHandler`):
//!
//! ```text
//! async fn auth(req, res, next) -> Result<(), Error> { … }   ← user writes this
//!        ↓ Chain::new(auth)
//! auth.into_boxed_handler()                                ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(auth))                                ← stored as BoxedHandler
//!        ↓
//! handler.call(req, res, next)  at request time            ← one vtable dispatch
//! ```
//!
//! The [`ApiRouter`](crate::ApiRouter) dispatcher implements
//! [`ErasedHandler`] directly, which is how value-returning handlers end up
//! in the same table as plain ones.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future. `Send + 'static` so tokio can move it
/// across worker threads.
pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request, res: Response, next: Next) -> BoxFuture<Result<(), Error>>;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Next ──────────────────────────────────────────────────────────────────────

/// Hands control to the next handler in the chain.
///
/// The router moves on once the current handler has finished *and* `call`
/// was invoked. A handler that neither responds nor calls `next` ends the
/// request with a bare `500`.
#[derive(Clone, Debug, Default)]
pub struct Next {
    called: Arc<AtomicBool>,
}

impl Next {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn call(&self) {
        self.called.store(true, Ordering::Release);
    }

    pub(crate) fn was_called(&self) -> bool {
        self.called.load(Ordering::Acquire)
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every plain route handler: one that writes the
/// [`Response`] itself.
///
/// Automatically satisfied for any `async fn` with the signature:
///
/// ```text
/// async fn name(req: Request, res: Response, next: Next) -> Result<(), Error>
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut> private::Sealed for F
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
}

impl<F, Fut> Handler for F
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Bridges a concrete handler `F` into the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut> ErasedHandler for FnHandler<F>
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn call(&self, req: Request, res: Response, next: Next) -> BoxFuture<Result<(), Error>> {
        Box::pin((self.0)(req, res, next))
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// An ordered sequence of handlers registered under one method and path.
///
/// ```rust,ignore
/// Router::new().get("/admin", Chain::new(require_admin).then(dashboard));
/// ```
#[derive(Clone, Default)]
pub struct Chain {
    pub(crate) handlers: Vec<BoxedHandler>,
}

impl Chain {
    pub fn new(handler: impl Handler) -> Self {
        Self { handlers: vec![handler.into_boxed_handler()] }
    }

    /// Appends `handler` to the end of the chain.
    pub fn then(mut self, handler: impl Handler) -> Self {
        self.handlers.push(handler.into_boxed_handler());
        self
    }

    pub(crate) fn from_boxed(handlers: Vec<BoxedHandler>) -> Self {
        Self { handlers }
    }

    pub fn len(&self) -> usize { self.handlers.len() }
    pub fn is_empty(&self) -> bool { self.handlers.is_empty() }
}

impl<H: Handler> From<H> for Chain {
    fn from(handler: H) -> Self {
        Self::new(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop(_req: Request, _res: Response, next: Next) -> Result<(), Error> {
        next.call();
        Ok(())
    }

    #[test]
    fn chain_collects_every_handler() {
        let chain = Chain::new(noop).then(noop).then(noop);
        assert_eq!(chain.len(), 3);
        assert!(Chain::default().is_empty());
    }

    #[test]
    fn next_is_shared_between_clones() {
        let next = Next::new();
        let handle = next.clone();
        assert!(!next.was_called());
        handle.call();
        assert!(next.was_called());
    }
}
