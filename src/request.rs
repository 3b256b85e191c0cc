//! Incoming HTTP request type.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::method::Method;

/// An incoming HTTP request.
///
/// Cloning is cheap: every handler in a chain (and the error formatter) gets
/// its own handle onto the same buffered request.
#[derive(Clone, Debug)]
pub struct Request {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    method: Method,
    path: String,
    query: Option<String>,
    headers: Vec<(String, String)>,
    body: Bytes,
    params: HashMap<String, String>,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        parts: &http::request::Parts,
        body: Bytes,
        params: HashMap<String, String>,
    ) -> Self {
        // Non-UTF-8 header values are not addressable through `header()`.
        let headers = parts.headers.iter()
            .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
            .collect();
        Self {
            inner: Arc::new(Inner {
                method,
                path: parts.uri.path().to_owned(),
                query: parts.uri.query().map(str::to_owned),
                headers,
                body,
                params,
            }),
        }
    }

    pub fn method(&self) -> Method { self.inner.method }
    pub fn path(&self) -> &str { &self.inner.path }
    pub fn headers(&self) -> &[(String, String)] { &self.inner.headers }
    pub fn body(&self) -> &[u8] { &self.inner.body }

    /// The raw query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> { self.inner.query.as_deref() }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.inner.params.get(key).map(String::as_str)
    }
}

#[cfg(test)]
pub(crate) fn test_request(method: Method, uri: &str) -> Request {
    let (parts, ()) = http::Request::builder()
        .method(method.as_str())
        .uri(uri)
        .header("x-request-id", "test-1")
        .body(())
        .expect("valid test request")
        .into_parts();
    Request::new(method, &parts, Bytes::new(), HashMap::new())
}
