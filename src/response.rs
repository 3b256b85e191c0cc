//! Outgoing HTTP response handle.
//!
//! Unlike a value-returning framework, every handler in a chain receives the
//! *same* mutable [`Response`]. The first body write sends it (status,
//! headers and body leave together) and flips [`Response::headers_sent`];
//! anything written afterwards is dropped with a warning.
//!
//! The response also carries a small side channel: the dispatcher emits
//! [`RouterMisuseError`]s on it so that code earlier in the chain can observe
//! misuse without scraping logs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use serde_json::Value as Json;
use tokio::sync::oneshot;
use tracing::{error, warn};

use crate::error::RouterMisuseError;

/// The wire form a sent [`Response`] is converted to.
pub(crate) type HttpResponse = http::Response<Full<Bytes>>;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Content types for [`Response::bytes`]. For anything else, set the
/// `content-type` header yourself; an explicit header always wins.
pub enum ContentType {
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
}

impl ContentType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

type Listener = Arc<dyn Fn(&RouterMisuseError) + Send + Sync + 'static>;

/// A shared handle onto the response being built for one request.
///
/// ```rust,ignore
/// use api_router::{ContentType, Response};
/// use http::StatusCode;
///
/// res.status(StatusCode::CREATED)
///    .header("location", "/users/42")
///    .json(&serde_json::json!({ "id": 42 }));
///
/// res.bytes(ContentType::Html, b"<p>ok</p>".to_vec());
/// ```
#[derive(Clone)]
pub struct Response {
    shared: Arc<Mutex<State>>,
}

struct State {
    status: Option<StatusCode>,
    headers: HeaderMap,
    sent: bool,
    outlet: Option<oneshot::Sender<HttpResponse>>,
    listeners: Vec<Listener>,
}

impl Response {
    /// A fresh, unsent response and the receiver its wire form is delivered to.
    pub(crate) fn channel() -> (Self, oneshot::Receiver<HttpResponse>) {
        let (tx, rx) = oneshot::channel();
        let state = State {
            status: None,
            headers: HeaderMap::new(),
            sent: false,
            outlet: Some(tx),
            listeners: Vec::new(),
        };
        (Self { shared: Arc::new(Mutex::new(state)) }, rx)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A listener that panicked mid-emit must not wedge the response.
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the status code used when the response is sent.
    pub fn status(&self, code: StatusCode) -> &Self {
        let mut state = self.lock();
        if state.sent {
            warn!(status = %code, "status set after response was sent; ignoring");
        } else {
            state.status = Some(code);
        }
        self
    }

    /// Appends a header. Invalid names or values are dropped with a warning.
    pub fn header(&self, name: &str, value: &str) -> &Self {
        let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) else {
            warn!(header = name, "invalid header; ignoring");
            return self;
        };
        let mut state = self.lock();
        if state.sent {
            warn!(header = %name, "header set after response was sent; ignoring");
        } else {
            state.headers.append(name, value);
        }
        self
    }

    /// The status the response has (or will have): `200 OK` unless set.
    pub fn status_code(&self) -> StatusCode {
        self.lock().status.unwrap_or(StatusCode::OK)
    }

    /// Whether status, headers and body have already been sent.
    pub fn headers_sent(&self) -> bool {
        self.lock().sent
    }

    /// Sends `body` as `application/json`.
    pub fn json(&self, body: &Json) {
        match serde_json::to_vec(body) {
            Ok(bytes) => self.finish(Some(ContentType::Json.as_str()), bytes),
            Err(e) => {
                error!(error = %e, "response body is not serialisable");
                self.status(StatusCode::INTERNAL_SERVER_ERROR);
                self.finish(None, Vec::new());
            }
        }
    }

    /// Sends `body` as `text/plain; charset=utf-8`.
    pub fn send(&self, body: impl Into<String>) {
        self.finish(Some(ContentType::Text.as_str()), body.into().into_bytes());
    }

    /// Sends a raw body under the given content type.
    pub fn bytes(&self, content_type: ContentType, body: Vec<u8>) {
        self.finish(Some(content_type.as_str()), body);
    }

    /// Sends the response with no body (e.g. `204 No Content`).
    pub fn end(&self) {
        self.finish(None, Vec::new());
    }

    fn finish(&self, content_type: Option<&'static str>, body: Vec<u8>) {
        let mut state = self.lock();
        if state.sent {
            warn!("response already sent; ignoring second write");
            return;
        }
        state.sent = true;

        let mut response = http::Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = state.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = std::mem::take(&mut state.headers);
        if let Some(content_type) = content_type {
            response.headers_mut()
                .entry(CONTENT_TYPE)
                .or_insert(HeaderValue::from_static(content_type));
        }

        if let Some(outlet) = state.outlet.take() {
            // The receiver is gone when the client disconnected; nothing to do.
            let _ = outlet.send(response);
        }
    }

    /// Subscribes to [`RouterMisuseError`]s raised while handling this request.
    pub fn on_router_error(&self, listener: impl Fn(&RouterMisuseError) + Send + Sync + 'static) {
        self.lock().listeners.push(Arc::new(listener));
    }

    pub(crate) fn emit_router_error(&self, err: &RouterMisuseError) {
        // Snapshot first: a listener may itself touch the response.
        let listeners = self.lock().listeners.clone();
        for listener in listeners {
            listener(err);
        }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Response")
            .field("status", &state.status)
            .field("sent", &state.sent)
            .finish_non_exhaustive()
    }
}
