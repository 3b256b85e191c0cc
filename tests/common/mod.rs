//! Shared helpers for integration tests.

use std::sync::{Arc, Mutex};

use api_router::{Next, Request, Response, Router, RouterMisuseError};
use bytes::Bytes;
use http_body_util::BodyExt;

/// Sends one in-memory request through `router`.
pub async fn call(router: &Router, method: &str, uri: &str, body: &str) -> (u16, Option<String>, String) {
    let req = http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::from(body.to_owned()))
        .unwrap();
    let res = router.respond(req).await;
    let status = res.status().as_u16();
    let content_type = res.headers()
        .get(http::header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_owned());
    let body = res.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

/// A handler that subscribes to misuse errors emitted on the response, then
/// passes control on without returning a value.
#[allow(dead_code)]
pub fn misuse_recorder(
    seen: Arc<Mutex<Vec<RouterMisuseError>>>,
) -> impl Fn(Request, Response, Next) -> std::future::Ready<()> + Send + Sync + 'static {
    move |_req, res, next| {
        let seen = Arc::clone(&seen);
        res.on_router_error(move |err| seen.lock().unwrap().push(err.clone()));
        next.call();
        std::future::ready(())
    }
}
