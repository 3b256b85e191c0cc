//! Handler return values.
//!
//! A [`Value`] is JSON plus one extra case: [`Value::Deferred`], a value that
//! is not known yet. Deferred values can sit anywhere in the tree, including
//! inside other deferred values:
//!
//! ```rust
//! use api_router::{Deferred, Value};
//!
//! let user = Value::object([
//!     ("id", Value::from(42)),
//!     ("posts", Deferred::new(async { Ok::<_, api_router::Error>(vec!["a", "b"]) }).into()),
//! ]);
//! ```
//!
//! [`resolve`](crate::resolve) turns the tree into plain JSON.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::Serialize;
use serde_json::{Number, Value as Json};

use crate::error::Error;
use crate::handler::BoxFuture;

/// A JSON-shaped value that may contain [`Deferred`] placeholders.
#[derive(Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    /// Key order is preserved on the wire.
    Object(Vec<(String, Value)>),
    Deferred(Deferred),
}

impl Value {
    /// Builds an object from key/value pairs.
    pub fn object<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn array<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }

    /// Wraps a future as a deferred value. See [`Deferred::new`].
    pub fn deferred<F, T, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Into<Value>,
        E: Into<Error>,
    {
        Self::Deferred(Deferred::new(future))
    }

    /// Converts any serialisable type via `serde_json`.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        serde_json::to_value(value).map(Self::from).map_err(Error::other)
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

// ── Deferred ──────────────────────────────────────────────────────────────────

/// A value that becomes available later, or fails.
pub struct Deferred(BoxFuture<Result<Value, Error>>);

impl Deferred {
    /// Wraps any future producing something convertible into a [`Value`].
    pub fn new<F, T, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Into<Value>,
        E: Into<Error>,
    {
        Self(Box::pin(async move { future.await.map(Into::into).map_err(Into::into) }))
    }

    /// An already-successful deferred value.
    pub fn resolved(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self(Box::pin(async move { Ok(value) }))
    }

    /// An already-failed deferred value.
    pub fn rejected(err: impl Into<Error>) -> Self {
        let err = err.into();
        Self(Box::pin(async move { Err(err) }))
    }
}

impl Future for Deferred {
    type Output = Result<Value, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0.as_mut().poll(cx)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(..)")
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => Self::Number(n),
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Json::Object(map) => Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl From<Deferred> for Value {
    fn from(deferred: Deferred) -> Self { Self::Deferred(deferred) }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Self::Bool(b) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Self::String(s.to_owned()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Self::String(s) }
}

macro_rules! from_integer {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(n: $ty) -> Self { Self::Number(Number::from(n)) }
        })*
    };
}

from_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Non-finite floats have no JSON form and become `null`.
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Self::Null, Self::Number)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self { Self::array(items) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self { opt.map_or(Self::Null, Into::into) }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::object(iter)
    }
}
