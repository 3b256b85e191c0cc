//! Error taxonomy.
//!
//! Every failure that reaches the dispatcher lands in exactly one of three
//! tiers, matched in this order:
//!
//! | Tier | Type | Client sees |
//! |---|---|---|
//! | misuse | [`RouterMisuseError`] | nothing from the dispatcher; logged and signalled |
//! | api | [`ApiError`] | its status (default 500) and its body as JSON |
//! | unclassified | anything else | 500, optionally reformatted |

use std::fmt;

use http::StatusCode;
use serde_json::Value as Json;
use thiserror::Error;

use crate::method::Method;

/// A boxed, thread-safe error for the unclassified tier.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type flowing through handlers, the dispatcher and the server.
#[derive(Debug, Error)]
pub enum Error {
    /// The route broke the dispatcher's usage contract.
    #[error(transparent)]
    Misuse(#[from] RouterMisuseError),

    /// A deliberate, client-facing error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Socket-level failure: binding a port or accepting a connection.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else.
    #[error(transparent)]
    Other(BoxError),
}

impl Error {
    /// Wraps any error (or message) as an unclassified failure.
    ///
    /// ```rust
    /// use api_router::Error;
    ///
    /// let err = Error::other("database unreachable");
    /// assert_eq!(err.to_string(), "database unreachable");
    /// ```
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }

    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::Misuse(_))
    }

    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(api) => Some(api),
            _ => None,
        }
    }
}

// ── RouterMisuseError ─────────────────────────────────────────────────────────

/// What a route did wrong.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MisuseKind {
    /// The last handler of a chain produced no value.
    NoReturnValue,
    /// The returned value resolved after the response had already been sent.
    HeadersAlreadySent,
}

impl fmt::Display for MisuseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoReturnValue => "did not return a value",
            Self::HeadersAlreadySent => {
                "returned a value but headers were already sent by the time it was resolved"
            }
        })
    }
}

/// A developer-facing contract violation.
///
/// Never turned into a client response body. The dispatcher emits it on the
/// [`Response`](crate::Response) side channel and logs it unless
/// [`silence_router_error`](crate::ApiRouterOptions::silence_router_error) is set.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("route for {method} {path} {kind}")]
pub struct RouterMisuseError {
    method: Method,
    path: String,
    kind: MisuseKind,
}

impl RouterMisuseError {
    pub fn new(method: Method, path: impl Into<String>, kind: MisuseKind) -> Self {
        Self { method, path: path.into(), kind }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn kind(&self) -> MisuseKind { self.kind }
}

// ── ApiError ──────────────────────────────────────────────────────────────────

/// An application error that maps straight onto an HTTP response.
///
/// The body is any JSON value and is sent as-is, never reformatted:
///
/// ```rust
/// use api_router::ApiError;
/// use http::StatusCode;
///
/// let err = ApiError::new("not found", StatusCode::NOT_FOUND);
/// assert_eq!(err.status_or_default(), StatusCode::NOT_FOUND);
/// assert_eq!(err.to_string(), "not found");
///
/// // No status given: 500 on the wire.
/// let err = ApiError::from_body(serde_json::json!({ "reason": "quota" }));
/// assert_eq!(err.status_or_default(), StatusCode::INTERNAL_SERVER_ERROR);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ApiError {
    body: Json,
    status: Option<StatusCode>,
}

impl ApiError {
    pub fn new(body: impl Into<Json>, status: StatusCode) -> Self {
        Self { body: body.into(), status: Some(status) }
    }

    /// An error with no explicit status code.
    pub fn from_body(body: impl Into<Json>) -> Self {
        Self { body: body.into(), status: None }
    }

    pub fn bad_request(body: impl Into<Json>) -> Self {
        Self::new(body, StatusCode::BAD_REQUEST)
    }

    pub fn not_found(body: impl Into<Json>) -> Self {
        Self::new(body, StatusCode::NOT_FOUND)
    }

    pub fn body(&self) -> &Json { &self.body }
    pub fn status(&self) -> Option<StatusCode> { self.status }

    pub fn status_or_default(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Json::String(message) => f.write_str(message),
            other => write!(f, "{other}"),
        }
    }
}

impl std::error::Error for ApiError {}
