//! Radix-tree request router and handler-chain runner.
//!
//! One tree per HTTP method. O(path-length) lookup. A matched route yields an
//! ordered [`Chain`]; handlers run one after another, each passing control on
//! through [`Next`], until one of them sends the response.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use matchit::Router as MatchitRouter;
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::handler::{BoxedHandler, Chain, ErasedHandler, Next};
use crate::method::{Method, verb_methods};
use crate::request::Request;
use crate::response::{HttpResponse, Response};

/// A registered route: its pattern and handler chain.
#[derive(Clone)]
struct Route {
    path: Arc<str>,
    chain: Arc<[BoxedHandler]>,
}

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Each registration returns `self` so calls chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Route>>,
    // Chains still running, possibly after their response went out.
    chains: Mutex<JoinSet<()>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), chains: Mutex::new(JoinSet::new()) }
    }

    /// Register a handler chain for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid pattern or conflicts with a route
    /// already registered for `method`.
    pub fn on(mut self, method: Method, path: &str, chain: impl Into<Chain>) -> Self {
        let chain: Chain = chain.into();
        let route = Route {
            path: Arc::from(path),
            chain: chain.handlers.into(),
        };
        self.routes
            .entry(method)
            .or_default()
            .insert(path, route)
            .unwrap_or_else(|e| panic!("invalid route `{method} {path}`: {e}"));
        self
    }

    verb_methods!(Chain);

    fn lookup(&self, method: Method, path: &str) -> Option<(Route, HashMap<String, String>)> {
        let tree = self.routes.get(&method)?;
        let matched = tree.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((matched.value.clone(), params))
    }

    /// Routes one buffered request and produces its response.
    ///
    /// Returns as soon as a handler sends the response; work the chain does
    /// after that point (re-raised errors, late misuse reports) carries on in
    /// the background until [`drain`](Router::drain) collects it.
    ///
    /// A chain that ends without anyone sending a response is closed with a
    /// bare `500` and no body. That includes a value-returning route whose
    /// last handler returned nothing: the misuse is reported on the
    /// [`Response`] and in the logs, and the empty `500` only releases the
    /// client.
    pub async fn respond(&self, req: http::Request<Bytes>) -> HttpResponse {
        let (parts, body) = req.into_parts();

        let Ok(method) = parts.method.as_str().parse::<Method>() else {
            return bare(StatusCode::METHOD_NOT_ALLOWED);
        };
        let Some((route, params)) = self.lookup(method, parts.uri.path()) else {
            return bare(StatusCode::NOT_FOUND);
        };

        let req = Request::new(method, &parts, body, params);
        let (res, sent) = Response::channel();
        {
            let mut chains = self.chains();
            while let Some(done) = chains.try_join_next() {
                reap(done);
            }
            chains.spawn(run_chain(route, req, res));
        }

        // The chain always sends before finishing; a dropped sender means a
        // handler panicked.
        sent.await.unwrap_or_else(|_| bare(StatusCode::INTERNAL_SERVER_ERROR))
    }

    /// Waits for every chain started so far, including work that continues
    /// after its response was sent.
    pub async fn drain(&self) {
        let mut chains = std::mem::take(&mut *self.chains());
        while let Some(done) = chains.join_next().await {
            reap(done);
        }
    }

    fn chains(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.chains.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn reap(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        error!("route chain panicked: {e}");
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

async fn run_chain(route: Route, req: Request, res: Response) {
    for handler in route.chain.iter() {
        let next = Next::new();
        if let Err(err) = handler.call(req.clone(), res.clone(), next.clone()).await {
            error!(method = %req.method(), path = %route.path, error = %err, "unhandled route error");
            if !res.headers_sent() {
                res.status(StatusCode::INTERNAL_SERVER_ERROR).end();
            }
            return;
        }
        if res.headers_sent() {
            return;
        }
        if !next.was_called() {
            warn!(method = %req.method(), path = %route.path, "handler neither responded nor called next");
            res.status(StatusCode::INTERNAL_SERVER_ERROR).end();
            return;
        }
    }

    res.status(StatusCode::NOT_FOUND).send(format!("Cannot {} {}", req.method(), req.path()));
}

fn bare(status: StatusCode) -> HttpResponse {
    let mut response = http::Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
