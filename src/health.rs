//! Built-in Kubernetes health-check handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Both are [`ApiHandler`](crate::ApiHandler)s returning text, so they are
//! registered like any other route:
//!
//! ```rust
//! use api_router::{ApiRouter, ApiRouterOptions, health};
//!
//! let api = ApiRouter::new(ApiRouterOptions::new())
//!     .get("/healthz", health::liveness)
//!     .get("/readyz", health::readiness);
//! ```
//!
//! Gate readiness on dependencies by returning an
//! [`ApiError`](crate::ApiError) from your own handler instead:
//!
//! ```rust
//! use api_router::{ApiError, Next, Request, Response};
//! use http::StatusCode;
//!
//! async fn readiness(_req: Request, _res: Response, _next: Next) -> Result<&'static str, ApiError> {
//!     if dependencies_are_healthy().await {
//!         Ok("ready")
//!     } else {
//!         Err(ApiError::new("not ready", StatusCode::SERVICE_UNAVAILABLE))
//!     }
//! }
//!
//! async fn dependencies_are_healthy() -> bool { true }
//! ```

use crate::{Next, Request, Response};

/// Liveness probe: always `200 OK` with body `"ok"`.
pub async fn liveness(_req: Request, _res: Response, _next: Next) -> &'static str {
    "ok"
}

/// Readiness probe (default implementation): `200 OK` with body `"ready"`.
pub async fn readiness(_req: Request, _res: Response, _next: Next) -> &'static str {
    "ready"
}
