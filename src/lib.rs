//! # api-router
//!
//! Route handlers that return values instead of writing responses.
//!
//! An [`ApiRouter`] decorates a plain [`Router`]. Its handlers return a
//! [`Value`]: JSON that may contain [`Deferred`] placeholders at any depth.
//! After the handler returns, a per-handler dispatcher:
//!
//! 1. resolves every placeholder ([`resolve`]),
//! 2. sends objects and arrays as JSON, strings as text, and nothing for
//!    other scalars,
//! 3. or, on failure, classifies the error:
//!    - [`RouterMisuseError`]: the route broke the contract (the last handler
//!      returned nothing, or the value resolved after the response was
//!      sent). Logged and emitted on the [`Response`]; never sent to the client.
//!    - [`ApiError`]: sent with its own status (default 500) and body.
//!    - anything else: `500` with a body from the configured
//!      [`ErrorFormatter`], or the default body, in which case the error is
//!      also re-raised to the router, which logs it.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use api_router::{ApiError, ApiRouter, ApiRouterOptions, Error, Next, Request, Response, Server, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let api = ApiRouter::new(ApiRouterOptions::new())
//!         .get("/users/{id}", get_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(api).await
//! }
//!
//! async fn get_user(req: Request, _res: Response, _next: Next) -> Result<Value, Error> {
//!     let id: u64 = req.param("id")
//!         .and_then(|id| id.parse().ok())
//!         .ok_or_else(|| ApiError::bad_request("id must be numeric"))?;
//!
//!     // `posts` is filled in before the response is written.
//!     Ok(Value::object([
//!         ("id", Value::from(id)),
//!         ("posts", Value::deferred(load_posts(id))),
//!     ]))
//! }
//!
//! async fn load_posts(_user: u64) -> Result<Vec<&'static str>, Error> {
//!     Ok(vec!["hello", "world"])
//! }
//! ```

mod api_router;
mod config;
mod dispatch;
mod error;
mod handler;
mod method;
mod reply;
mod request;
mod resolve;
mod response;
mod router;
mod server;
mod value;

pub mod health;

pub use api_router::ApiRouter;
pub use config::{ApiRouterOptions, ErrorFormatter};
pub use error::{ApiError, BoxError, Error, MisuseKind, RouterMisuseError};
pub use handler::{Chain, Handler, Next};
pub use method::Method;
pub use reply::{ApiChain, ApiHandler, IntoReply};
pub use request::Request;
pub use resolve::resolve;
pub use response::{ContentType, Response};
pub use router::Router;
pub use server::Server;
pub use value::{Deferred, Value};
