//! Value-returning handlers.
//!
//! An [`ApiHandler`] has the same arguments as a plain
//! [`Handler`](crate::Handler) but, instead of writing the response, returns
//! anything implementing [`IntoReply`]. The dispatcher does the writing.
//!
//! ```rust,ignore
//! async fn get_user(req: Request, _res: Response, _next: Next) -> Result<Value, Error> {
//!     let id = req.param("id").ok_or_else(|| ApiError::bad_request("missing id"))?;
//!     Ok(Value::object([("id", Value::from(id)), ("posts", Value::deferred(load_posts(id)))]))
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::error::Error;
use crate::handler::{BoxFuture, Next};
use crate::request::Request;
use crate::response::Response;
use crate::value::{Deferred, Value};

/// What a handler's output means to the dispatcher.
///
/// `Ok(None)` is "returned nothing": allowed for handlers that pass control
/// on with [`Next::call`], a misuse for the last handler of a chain.
pub trait IntoReply {
    fn into_reply(self) -> Result<Option<Value>, Error>;
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Option<Value>, Error> { Ok(None) }
}

impl IntoReply for Value {
    fn into_reply(self) -> Result<Option<Value>, Error> { Ok(Some(self)) }
}

impl IntoReply for Json {
    fn into_reply(self) -> Result<Option<Value>, Error> { Ok(Some(self.into())) }
}

impl IntoReply for Deferred {
    fn into_reply(self) -> Result<Option<Value>, Error> { Ok(Some(self.into())) }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Option<Value>, Error> { Ok(Some(self.into())) }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Option<Value>, Error> { Ok(Some(self.into())) }
}

impl<T: Into<Value>> IntoReply for Option<T> {
    fn into_reply(self) -> Result<Option<Value>, Error> { Ok(self.map(Into::into)) }
}

impl<T: IntoReply, E: Into<Error>> IntoReply for Result<T, E> {
    fn into_reply(self) -> Result<Option<Value>, Error> {
        self.map_err(Into::into).and_then(IntoReply::into_reply)
    }
}

// ── ApiHandler ────────────────────────────────────────────────────────────────

#[doc(hidden)]
pub trait ErasedApiHandler {
    fn call(&self, req: Request, res: Response, next: Next) -> BoxFuture<Result<Option<Value>, Error>>;
}

#[doc(hidden)]
pub type BoxedApiHandler = Arc<dyn ErasedApiHandler + Send + Sync + 'static>;

/// Implemented for every value-returning route handler:
///
/// ```text
/// async fn name(req: Request, res: Response, next: Next) -> impl IntoReply
/// ```
///
/// Sealed, like [`Handler`](crate::Handler).
pub trait ApiHandler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_api_handler(self) -> BoxedApiHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
}

impl<F, Fut, R> ApiHandler for F
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn into_boxed_api_handler(self) -> BoxedApiHandler {
        Arc::new(FnApiHandler(self))
    }
}

struct FnApiHandler<F>(F);

impl<F, Fut, R> ErasedApiHandler for FnApiHandler<F>
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn call(&self, req: Request, res: Response, next: Next) -> BoxFuture<Result<Option<Value>, Error>> {
        let fut = (self.0)(req, res, next);
        Box::pin(async move { fut.await.into_reply() })
    }
}

// ── ApiChain ──────────────────────────────────────────────────────────────────

/// An ordered sequence of value-returning handlers. Only the last one is
/// required to return a value.
///
/// ```rust,ignore
/// api.get("/users/{id}", ApiChain::new(authenticate).then(get_user));
/// ```
#[derive(Clone, Default)]
pub struct ApiChain {
    pub(crate) handlers: Vec<BoxedApiHandler>,
}

impl ApiChain {
    pub fn new(handler: impl ApiHandler) -> Self {
        Self { handlers: vec![handler.into_boxed_api_handler()] }
    }

    pub fn then(mut self, handler: impl ApiHandler) -> Self {
        self.handlers.push(handler.into_boxed_api_handler());
        self
    }

    pub fn len(&self) -> usize { self.handlers.len() }
    pub fn is_empty(&self) -> bool { self.handlers.is_empty() }
}

impl<H: ApiHandler> From<H> for ApiChain {
    fn from(handler: H) -> Self {
        Self::new(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn unit_means_no_value() {
        assert!(().into_reply().unwrap().is_none());
        assert!(None::<Value>.into_reply().unwrap().is_none());
        assert!(Ok::<(), Error>(()).into_reply().unwrap().is_none());
    }

    #[test]
    fn values_and_text_are_replies() {
        assert!(matches!("ok".into_reply(), Ok(Some(Value::String(s))) if s == "ok"));
        assert!(matches!(serde_json::json!([1]).into_reply(), Ok(Some(Value::Array(_)))));
        assert!(matches!(Deferred::resolved(1).into_reply(), Ok(Some(Value::Deferred(_)))));
        assert!(matches!(Some(5).into_reply(), Ok(Some(Value::Number(_)))));
    }

    #[test]
    fn errors_pass_through_into_error() {
        let reply = Err::<Value, _>(ApiError::not_found("missing")).into_reply();
        assert!(matches!(reply, Err(Error::Api(api)) if api.status().map(|s| s.as_u16()) == Some(404)));
    }

    #[test]
    fn chain_accepts_closures_and_fns() {
        async fn first(_: Request, _: Response, next: Next) {
            next.call();
        }
        let chain = ApiChain::new(first).then(|_: Request, _: Response, _: Next| async { "done" });
        assert_eq!(chain.len(), 2);
    }
}
