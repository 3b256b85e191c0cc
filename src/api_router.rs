//! The value-returning router decorator.

use std::sync::Arc;

use crate::config::{ApiRouterOptions, ErrorFormatter};
use crate::dispatch::{Dispatch, Shared};
use crate::handler::{BoxedHandler, Chain};
use crate::method::{Method, verb_methods};
use crate::reply::ApiChain;
use crate::router::Router;

/// Wraps a [`Router`] so that handlers return values instead of writing
/// responses.
///
/// The registration surface is the same as [`Router`]'s (`on` plus one
/// function per HTTP method), but each handler is an
/// [`ApiHandler`](crate::ApiHandler). Every handler of every chain is wrapped
/// in a dispatcher before it reaches the underlying router.
///
/// ```rust,no_run
/// use api_router::{ApiRouter, ApiRouterOptions, Error, Next, Request, Response, Server, Value};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Error> {
///     let api = ApiRouter::new(ApiRouterOptions::new())
///         .get("/users/{id}", get_user);
///
///     Server::bind("0.0.0.0:3000").serve(api).await
/// }
///
/// async fn get_user(req: Request, _res: Response, _next: Next) -> Value {
///     Value::object([("id", req.param("id").unwrap_or_default())])
/// }
/// ```
pub struct ApiRouter {
    inner: Router,
    shared: Arc<Shared>,
}

impl ApiRouter {
    pub fn new(options: ApiRouterOptions) -> Self {
        Self::wrap(Router::new(), options)
    }

    /// Decorates an existing router. Routes already registered on it are
    /// left untouched.
    pub fn wrap(router: Router, options: ApiRouterOptions) -> Self {
        Self { inner: router, shared: Arc::new(Shared::new(options)) }
    }

    /// Replaces the error formatter. Takes effect for requests that fail
    /// from now on, including on routes registered earlier.
    pub fn set_error_formatter(&self, formatter: ErrorFormatter) {
        self.shared.set_formatter(Some(formatter));
    }

    pub fn clear_error_formatter(&self) {
        self.shared.set_formatter(None);
    }

    /// Register a handler chain for a method + path pair. Returns `self` for chaining.
    pub fn on(mut self, method: Method, path: &str, chain: impl Into<ApiChain>) -> Self {
        let chain: ApiChain = chain.into();
        let handlers = chain.handlers;
        let route: Arc<str> = Arc::from(path);
        let count = handlers.len();

        let wrapped = handlers.into_iter()
            .enumerate()
            .map(|(index, handler)| {
                let last = index + 1 == count;
                Arc::new(Dispatch::new(handler, method, Arc::clone(&route), last, Arc::clone(&self.shared)))
                    as BoxedHandler
            })
            .collect();

        self.inner = self.inner.on(method, path, Chain::from_boxed(wrapped));
        self
    }

    verb_methods!(ApiChain);

    /// The underlying router, ready for [`Server::serve`](crate::Server::serve).
    pub fn into_router(self) -> Router {
        self.inner
    }
}

impl From<ApiRouter> for Router {
    fn from(api: ApiRouter) -> Self {
        api.into_router()
    }
}
