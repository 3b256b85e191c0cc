//! [`ApiRouter`](crate::ApiRouter) configuration.
//!
//! Options are fixed at construction, except the error formatter, which can
//! be swapped later with
//! [`ApiRouter::set_error_formatter`](crate::ApiRouter::set_error_formatter).
//!
//! Everything but the formatter can also come from TOML:
//!
//! ```toml
//! silence_router_error = true
//!
//! [internal_server_error]
//! error = "Something went wrong"
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value as Json;

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::reply::IntoReply;
use crate::request::Request;
use crate::response::Response;
use crate::value::Value;

type FormatFn = dyn Fn(&Error, &Request, &Response) -> BoxFuture<Result<Option<Value>, Error>> + Send + Sync;

/// Turns an unclassified error into a response body.
///
/// Returning nothing (or a falsy value: `null`, `false`, `0`, `""`) falls
/// back to the default internal-error body. Returning an
/// [`ApiError`](crate::ApiError) answers with that error instead.
///
/// ```rust
/// use api_router::ErrorFormatter;
///
/// let formatter = ErrorFormatter::new(|err, _req, _res| {
///     let message = err.to_string();
///     async move { serde_json::json!({ "code": "INTERNAL", "message": message }) }
/// });
/// ```
#[derive(Clone)]
pub struct ErrorFormatter {
    format: Arc<FormatFn>,
}

impl ErrorFormatter {
    pub fn new<F, Fut, R>(format: F) -> Self
    where
        F: Fn(&Error, &Request, &Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply + Send + 'static,
    {
        Self {
            format: Arc::new(
                move |err: &Error, req: &Request, res: &Response| -> BoxFuture<Result<Option<Value>, Error>> {
                    let fut = format(err, req, res);
                    Box::pin(async move { fut.await.into_reply() })
                },
            ),
        }
    }

    pub(crate) fn format(
        &self,
        err: &Error,
        req: &Request,
        res: &Response,
    ) -> BoxFuture<Result<Option<Value>, Error>> {
        (self.format)(err, req, res)
    }
}

impl fmt::Debug for ErrorFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorFormatter(..)")
    }
}

/// Construction options for [`ApiRouter`](crate::ApiRouter).
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiRouterOptions {
    /// Suppresses the `error`-level log line for
    /// [`RouterMisuseError`](crate::RouterMisuseError)s. They are still
    /// emitted on the response.
    pub silence_router_error: bool,

    /// Body of unformatted `500` responses. Defaults to
    /// `{"error":"Internal server error"}`.
    pub internal_server_error: Option<Json>,

    #[serde(skip)]
    pub error_formatter: Option<ErrorFormatter>,
}

impl ApiRouterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, Error> {
        toml::from_str(source).map_err(Error::other)
    }

    pub fn silence_router_error(mut self, silence: bool) -> Self {
        self.silence_router_error = silence;
        self
    }

    pub fn internal_server_error(mut self, body: impl Into<Json>) -> Self {
        self.internal_server_error = Some(body.into());
        self
    }

    pub fn error_formatter(mut self, formatter: ErrorFormatter) -> Self {
        self.error_formatter = Some(formatter);
        self
    }

    pub(crate) fn internal_server_error_body(&self) -> Json {
        self.internal_server_error
            .clone()
            .unwrap_or_else(|| serde_json::json!({ "error": "Internal server error" }))
    }
}
