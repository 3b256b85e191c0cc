//! Per-handler dispatcher: turns a handler's return value, or its failure,
//! into an HTTP response.
//!
//! ```text
//! invoke ─▶ returned nothing ─┬─ not last ─▶ done (control went to `next`)
//!    │                        └─ last ─────▶ misuse
//!    ▼
//! resolve ─▶ headers already sent ─▶ misuse
//!    │
//!    ▼
//! object / array ─▶ JSON      string ─▶ text      other ─▶ no body
//!
//! failure ─▶ misuse ─────────▶ emit on response, log unless silenced
//!        ─▶ ApiError ────────▶ status (default 500) + JSON body
//!        ─▶ anything else ───▶ formatter ─▶ 500 + formatted body
//!                                        └▶ 500 + default body, re-raise
//! ```

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use http::StatusCode;
use serde_json::Value as Json;
use tracing::{debug, error};

use crate::config::{ApiRouterOptions, ErrorFormatter};
use crate::error::{ApiError, Error, MisuseKind, RouterMisuseError};
use crate::handler::{BoxFuture, ErasedHandler, Next};
use crate::method::Method;
use crate::reply::BoxedApiHandler;
use crate::request::Request;
use crate::resolve::resolve;
use crate::response::Response;
use crate::value::Value;

/// Router-wide settings shared by every dispatcher of one [`ApiRouter`](crate::ApiRouter).
pub(crate) struct Shared {
    silence_router_error: bool,
    internal_server_error: Json,
    formatter: ArcSwapOption<ErrorFormatter>,
}

impl Shared {
    pub(crate) fn new(options: ApiRouterOptions) -> Self {
        Self {
            silence_router_error: options.silence_router_error,
            internal_server_error: options.internal_server_error_body(),
            formatter: ArcSwapOption::from(options.error_formatter.map(Arc::new)),
        }
    }

    pub(crate) fn set_formatter(&self, formatter: Option<ErrorFormatter>) {
        self.formatter.store(formatter.map(Arc::new));
    }
}

/// One registered API handler, wrapped.
#[derive(Clone)]
pub(crate) struct Dispatch {
    handler: BoxedApiHandler,
    method: Method,
    path: Arc<str>,
    last: bool,
    shared: Arc<Shared>,
}

impl Dispatch {
    pub(crate) fn new(
        handler: BoxedApiHandler,
        method: Method,
        path: Arc<str>,
        last: bool,
        shared: Arc<Shared>,
    ) -> Self {
        Self { handler, method, path, last, shared }
    }

    async fn run(self, req: Request, res: Response, next: Next) -> Result<(), Error> {
        let returned = self.handler.call(req.clone(), res.clone(), next).await;
        match self.settle(returned, &res).await {
            Ok(()) => Ok(()),
            Err(err) => self.recover(err, &req, &res).await,
        }
    }

    async fn settle(&self, returned: Result<Option<Value>, Error>, res: &Response) -> Result<(), Error> {
        let Some(value) = returned? else {
            return if self.last { Err(self.misuse(MisuseKind::NoReturnValue)) } else { Ok(()) };
        };

        let value = resolve(value).await?;
        if res.headers_sent() {
            return Err(self.misuse(MisuseKind::HeadersAlreadySent));
        }

        match value {
            Json::Object(_) | Json::Array(_) => res.json(&value),
            Json::String(text) => res.send(text),
            scalar => debug!(method = %self.method, path = %self.path, value = %scalar, "scalar reply; no body written"),
        }
        Ok(())
    }

    fn misuse(&self, kind: MisuseKind) -> Error {
        RouterMisuseError::new(self.method, &*self.path, kind).into()
    }

    async fn recover(&self, err: Error, req: &Request, res: &Response) -> Result<(), Error> {
        match err {
            Error::Misuse(misuse) => {
                res.emit_router_error(&misuse);
                if !self.shared.silence_router_error {
                    error!(method = %misuse.method(), path = misuse.path(), kind = ?misuse.kind(), "{misuse}");
                }
                Ok(())
            }
            Error::Api(api) => {
                send_api_error(res, &api);
                Ok(())
            }
            err => self.format_unclassified(err, req, res).await,
        }
    }

    async fn format_unclassified(&self, err: Error, req: &Request, res: &Response) -> Result<(), Error> {
        let formatted = match self.shared.formatter.load_full() {
            Some(formatter) => match format_body(&formatter, &err, req, res).await {
                Ok(body) => body,
                Err(Error::Api(api)) => {
                    send_api_error(res, &api);
                    return Ok(());
                }
                Err(fatal) => {
                    error!(method = %self.method, path = %self.path, error = %fatal, original = %err, "error formatter failed");
                    return Err(fatal);
                }
            },
            None => None,
        };

        res.status(StatusCode::INTERNAL_SERVER_ERROR);
        match formatted.filter(|body| !is_falsy(body)) {
            Some(body) => {
                res.json(&body);
                Ok(())
            }
            None => {
                res.json(&self.shared.internal_server_error);
                Err(err)
            }
        }
    }
}

impl ErasedHandler for Dispatch {
    fn call(&self, req: Request, res: Response, next: Next) -> BoxFuture<Result<(), Error>> {
        Box::pin(self.clone().run(req, res, next))
    }
}

async fn format_body(
    formatter: &ErrorFormatter,
    err: &Error,
    req: &Request,
    res: &Response,
) -> Result<Option<Json>, Error> {
    match formatter.format(err, req, res).await? {
        Some(value) => resolve(value).await.map(Some),
        None => Ok(None),
    }
}

fn send_api_error(res: &Response, api: &ApiError) {
    res.status(api.status_or_default());
    res.json(api.body());
}

/// `null`, `false`, `0` and `""` count as "no formatted body".
fn is_falsy(body: &Json) -> bool {
    match body {
        Json::Null => true,
        Json::Bool(b) => !b,
        Json::Number(n) => n.as_f64() == Some(0.0),
        Json::String(s) => s.is_empty(),
        Json::Array(_) | Json::Object(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use bytes::Bytes;
    use http::header::CONTENT_TYPE;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tokio::sync::oneshot;
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;
    use crate::reply::{ApiHandler, IntoReply};
    use crate::request::test_request;
    use crate::response::HttpResponse;
    use crate::value::Deferred;

    /// Counts `error`-level events.
    struct ErrorCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for ErrorCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _: tracing_subscriber::layer::Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    struct Outcome {
        result: Result<(), Error>,
        sent: Option<HttpResponse>,
        misuse: Vec<RouterMisuseError>,
        logged_errors: usize,
    }

    impl Outcome {
        async fn body(self) -> (StatusCode, String) {
            let sent = self.sent.expect("a response was sent");
            let status = sent.status();
            let bytes: Bytes = sent.into_body().collect().await.expect("infallible").to_bytes();
            (status, String::from_utf8(bytes.to_vec()).expect("utf-8"))
        }
    }

    async fn dispatch_with(
        options: ApiRouterOptions,
        handler: impl ApiHandler,
        last: bool,
        prepare: impl FnOnce(&Response),
    ) -> Outcome {
        let errors = Arc::new(AtomicUsize::new(0));
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(ErrorCounter(Arc::clone(&errors))),
        );

        let dispatch = Dispatch::new(
            handler.into_boxed_api_handler(),
            Method::Get,
            Arc::from("/things"),
            last,
            Arc::new(Shared::new(options)),
        );
        let (res, mut rx): (Response, oneshot::Receiver<HttpResponse>) = Response::channel();
        let misuse = Arc::new(std::sync::Mutex::new(Vec::new()));
        {
            let misuse = Arc::clone(&misuse);
            res.on_router_error(move |err| misuse.lock().unwrap().push(err.clone()));
        }
        prepare(&res);

        let result = dispatch.call(test_request(Method::Get, "/things"), res, Next::new()).await;
        let misuse = misuse.lock().unwrap().clone();
        Outcome { result, sent: rx.try_recv().ok(), misuse, logged_errors: errors.load(Ordering::SeqCst) }
    }

    async fn dispatch(handler: impl ApiHandler) -> Outcome {
        dispatch_with(ApiRouterOptions::new(), handler, true, |_| {}).await
    }

    fn returning<R>(reply: impl Fn() -> R + Send + Sync + 'static) -> impl ApiHandler
    where
        R: IntoReply + Send + 'static,
    {
        move |_: Request, _: Response, _: Next| {
            let value = reply();
            async move { value }
        }
    }

    #[tokio::test]
    async fn structured_value_with_deferred_member_is_sent_as_json() {
        let outcome = dispatch(returning(|| {
            Value::object([("a", Value::from(1)), ("b", Deferred::resolved(2).into())])
        }))
        .await;

        assert!(outcome.result.is_ok());
        let content_type = outcome.sent.as_ref().map(|r| r.headers()[CONTENT_TYPE].clone());
        assert_eq!(content_type.as_ref().map(|v| v.to_str().unwrap()), Some("application/json"));
        assert_eq!(outcome.body().await, (StatusCode::OK, r#"{"a":1,"b":2}"#.to_owned()));
    }

    #[tokio::test]
    async fn array_reply_keeps_status_set_by_handler() {
        let handler = |_: Request, res: Response, _: Next| async move {
            res.status(StatusCode::CREATED);
            Value::array([Deferred::resolved("x")])
        };
        let outcome = dispatch(handler).await;
        assert_eq!(outcome.body().await, (StatusCode::CREATED, r#"["x"]"#.to_owned()));
    }

    #[tokio::test]
    async fn text_reply_is_sent_raw() {
        let outcome = dispatch(returning(|| Deferred::resolved("ok"))).await;
        assert_eq!(outcome.body().await, (StatusCode::OK, "ok".to_owned()));
    }

    #[tokio::test]
    async fn scalar_reply_writes_nothing() {
        let outcome = dispatch(returning(|| Value::from(42))).await;
        assert!(outcome.result.is_ok());
        assert!(outcome.sent.is_none());
        assert!(outcome.misuse.is_empty());

        let outcome = dispatch(returning(|| Value::Null)).await;
        assert!(outcome.sent.is_none());
    }

    #[tokio::test]
    async fn api_error_uses_its_status_and_body() {
        let outcome = dispatch(returning(|| Err::<Value, _>(ApiError::not_found("not found")))).await;
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.body().await, (StatusCode::NOT_FOUND, r#""not found""#.to_owned()));
    }

    #[tokio::test]
    async fn api_error_without_status_is_500() {
        let outcome = dispatch(returning(|| Deferred::rejected(ApiError::from_body(json!({ "why": "x" }))))).await;
        assert_eq!(outcome.body().await, (StatusCode::INTERNAL_SERVER_ERROR, r#"{"why":"x"}"#.to_owned()));
    }

    #[tokio::test]
    async fn nested_rejection_is_classified_once() {
        let outcome = dispatch(returning(|| {
            Value::object([
                ("fine", Value::from(1)),
                ("broken", Value::array([Value::from(Deferred::rejected(ApiError::bad_request("bad")))])),
            ])
        }))
        .await;
        assert_eq!(outcome.body().await, (StatusCode::BAD_REQUEST, r#""bad""#.to_owned()));
    }

    #[tokio::test]
    async fn unformatted_error_sends_default_body_and_is_reraised() {
        let outcome = dispatch(returning(|| Err::<Value, _>(Error::other("db down")))).await;
        let err = outcome.result.as_ref().expect_err("re-raised");
        assert_eq!(err.to_string(), "db down");
        assert_eq!(
            outcome.body().await,
            (StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":"Internal server error"}"#.to_owned())
        );
    }

    #[tokio::test]
    async fn configured_default_body_is_used_without_formatter() {
        let options = ApiRouterOptions::new().internal_server_error(json!({ "oops": true }));
        let outcome = dispatch_with(options, returning(|| Err::<Value, _>(Error::other("x"))), true, |_| {}).await;
        assert!(outcome.result.is_err());
        assert_eq!(outcome.body().await, (StatusCode::INTERNAL_SERVER_ERROR, r#"{"oops":true}"#.to_owned()));
    }

    #[tokio::test]
    async fn formatted_error_is_sent_and_not_reraised() {
        let formatter = ErrorFormatter::new(|_, _, _| async { Deferred::resolved(json!({ "code": "X" })) });
        let options = ApiRouterOptions::new().error_formatter(formatter);
        let outcome = dispatch_with(options, returning(|| Err::<Value, _>(Error::other("x"))), true, |_| {}).await;
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.body().await, (StatusCode::INTERNAL_SERVER_ERROR, r#"{"code":"X"}"#.to_owned()));
    }

    #[tokio::test]
    async fn formatter_sees_the_original_error() {
        let formatter = ErrorFormatter::new(|err, req, _| {
            let body = json!({ "message": err.to_string(), "path": req.path() });
            async move { body }
        });
        let options = ApiRouterOptions::new().error_formatter(formatter);
        let outcome = dispatch_with(options, returning(|| Err::<Value, _>(Error::other("kaput"))), true, |_| {}).await;
        assert_eq!(outcome.body().await.1, r#"{"message":"kaput","path":"/things"}"#);
    }

    #[tokio::test]
    async fn falsy_formatter_result_falls_back_and_reraises() {
        for empty in [json!(null), json!(""), json!(false), json!(0)] {
            let formatter = ErrorFormatter::new(move |_, _, _| {
                let empty = empty.clone();
                async move { empty }
            });
            let options = ApiRouterOptions::new().error_formatter(formatter);
            let outcome = dispatch_with(options, returning(|| Err::<Value, _>(Error::other("x"))), true, |_| {}).await;
            assert!(outcome.result.is_err());
            assert_eq!(outcome.body().await.1, r#"{"error":"Internal server error"}"#);
        }
    }

    #[tokio::test]
    async fn formatter_api_error_is_the_final_fallback() {
        let formatter = ErrorFormatter::new(|_, _, _| async {
            Err::<Value, _>(ApiError::new("teapot", StatusCode::IM_A_TEAPOT))
        });
        let options = ApiRouterOptions::new().error_formatter(formatter);
        let outcome = dispatch_with(options, returning(|| Err::<Value, _>(Error::other("x"))), true, |_| {}).await;
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.body().await, (StatusCode::IM_A_TEAPOT, r#""teapot""#.to_owned()));
    }

    #[tokio::test]
    async fn failing_formatter_is_fatal_for_the_request() {
        let formatter = ErrorFormatter::new(|_, _, _| async { Err::<Value, _>(Error::other("formatter broke")) });
        let options = ApiRouterOptions::new().error_formatter(formatter);
        let outcome = dispatch_with(options, returning(|| Err::<Value, _>(Error::other("x"))), true, |_| {}).await;
        let err = outcome.result.as_ref().expect_err("fatal");
        assert_eq!(err.to_string(), "formatter broke");
        assert!(outcome.sent.is_none());
        assert_eq!(outcome.logged_errors, 1);
    }

    #[tokio::test]
    async fn last_handler_without_value_is_misuse() {
        let outcome = dispatch(|_: Request, _: Response, _: Next| async {}).await;
        assert!(outcome.result.is_ok());
        assert!(outcome.sent.is_none());
        assert_eq!(outcome.misuse.len(), 1);
        assert_eq!(outcome.misuse[0].kind(), MisuseKind::NoReturnValue);
        assert_eq!(outcome.misuse[0].path(), "/things");
        assert_eq!(outcome.logged_errors, 1);
    }

    #[tokio::test]
    async fn silenced_misuse_is_still_emitted() {
        let options = ApiRouterOptions::new().silence_router_error(true);
        let outcome = dispatch_with(options, |_: Request, _: Response, _: Next| async {}, true, |_| {}).await;
        assert_eq!(outcome.misuse.len(), 1);
        assert_eq!(outcome.logged_errors, 0);
    }

    #[tokio::test]
    async fn intermediate_handler_without_value_is_fine() {
        let handler = |_: Request, _: Response, next: Next| async move { next.call() };
        let outcome = dispatch_with(ApiRouterOptions::new(), handler, false, |_| {}).await;
        assert!(outcome.result.is_ok());
        assert!(outcome.sent.is_none());
        assert!(outcome.misuse.is_empty());
        assert_eq!(outcome.logged_errors, 0);
    }

    #[tokio::test]
    async fn value_resolving_after_headers_sent_is_misuse() {
        let handler = |_: Request, res: Response, _: Next| async move {
            res.send("early");
            Value::deferred(async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, Error>(json!({ "late": true }))
            })
        };
        let outcome = dispatch(handler).await;
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.misuse.len(), 1);
        assert_eq!(outcome.misuse[0].kind(), MisuseKind::HeadersAlreadySent);
        assert_eq!(outcome.body().await, (StatusCode::OK, "early".to_owned()));
    }

    #[tokio::test]
    async fn response_sent_by_earlier_code_is_detected() {
        let outcome = dispatch_with(
            ApiRouterOptions::new().silence_router_error(true),
            returning(|| "late"),
            true,
            |res| res.end(),
        )
        .await;
        assert_eq!(outcome.misuse.len(), 1);
        assert_eq!(outcome.body().await, (StatusCode::OK, String::new()));
    }

    #[test]
    fn falsiness() {
        assert!(is_falsy(&json!(null)));
        assert!(is_falsy(&json!(0.0)));
        assert!(!is_falsy(&json!("x")));
        assert!(!is_falsy(&json!({})));
        assert!(!is_falsy(&json!([])));
        assert!(!is_falsy(&json!(true)));
    }
}
