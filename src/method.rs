//! HTTP method as a typed enum.
//!
//! The set matches the method names Node's HTTP parser understands: RFC 9110,
//! WebDAV (RFC 4918 / 3253 / 4791 / 5323 / 5842), Subversion's DeltaV verbs,
//! UPnP (`M-SEARCH`, `NOTIFY`, `SUBSCRIBE`, `UNSUBSCRIBE`), `LINK`/`UNLINK`,
//! `SOURCE` and the `PURGE` cache-invalidation verb. Both routers expose one
//! registration function per variant.
//!
//! Unknown method strings are rejected at the router level with
//! `405 Method Not Allowed` before they ever reach a handler.

use std::fmt;
use std::str::FromStr;

/// A known HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Acl,
    Bind,
    Checkout,
    Connect,
    Copy,
    Delete,
    Get,
    Head,
    Link,
    Lock,
    MSearch,
    Merge,
    Mkactivity,
    Mkcalendar,
    Mkcol,
    Move,
    Notify,
    Options,
    Patch,
    Post,
    Propfind,
    Proppatch,
    Purge,
    Put,
    Rebind,
    Report,
    Search,
    Source,
    Subscribe,
    Trace,
    Unbind,
    Unlink,
    Unlock,
    Unsubscribe,
}

impl Method {
    /// Every method, in wire-name order.
    pub const ALL: [Method; 34] = [
        Self::Acl, Self::Bind, Self::Checkout, Self::Connect, Self::Copy,
        Self::Delete, Self::Get, Self::Head, Self::Link, Self::Lock,
        Self::MSearch, Self::Merge, Self::Mkactivity, Self::Mkcalendar, Self::Mkcol,
        Self::Move, Self::Notify, Self::Options, Self::Patch, Self::Post,
        Self::Propfind, Self::Proppatch, Self::Purge, Self::Put, Self::Rebind,
        Self::Report, Self::Search, Self::Source, Self::Subscribe, Self::Trace,
        Self::Unbind, Self::Unlink, Self::Unlock, Self::Unsubscribe,
    ];

    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Acl         => "ACL",
            Self::Bind        => "BIND",
            Self::Checkout    => "CHECKOUT",
            Self::Connect     => "CONNECT",
            Self::Copy        => "COPY",
            Self::Delete      => "DELETE",
            Self::Get         => "GET",
            Self::Head        => "HEAD",
            Self::Link        => "LINK",
            Self::Lock        => "LOCK",
            Self::MSearch     => "M-SEARCH",
            Self::Merge       => "MERGE",
            Self::Mkactivity  => "MKACTIVITY",
            Self::Mkcalendar  => "MKCALENDAR",
            Self::Mkcol       => "MKCOL",
            Self::Move        => "MOVE",
            Self::Notify      => "NOTIFY",
            Self::Options     => "OPTIONS",
            Self::Patch       => "PATCH",
            Self::Post        => "POST",
            Self::Propfind    => "PROPFIND",
            Self::Proppatch   => "PROPPATCH",
            Self::Purge       => "PURGE",
            Self::Put         => "PUT",
            Self::Rebind      => "REBIND",
            Self::Report      => "REPORT",
            Self::Search      => "SEARCH",
            Self::Source      => "SOURCE",
            Self::Subscribe   => "SUBSCRIBE",
            Self::Trace       => "TRACE",
            Self::Unbind      => "UNBIND",
            Self::Unlink      => "UNLINK",
            Self::Unlock      => "UNLOCK",
            Self::Unsubscribe => "UNSUBSCRIBE",
        }
    }
}

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|m| m.as_str() == s).ok_or(())
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generates one registration function per [`Method`], each forwarding to
/// `self.on(Method::X, path, chain)`.
macro_rules! verb_methods {
    ($chain:ty) => {
        $crate::method::verb_methods!(@emit $chain;
            acl => Acl, bind => Bind, checkout => Checkout, connect => Connect,
            copy => Copy, delete => Delete, get => Get, head => Head, link => Link,
            lock => Lock, m_search => MSearch, merge => Merge,
            mkactivity => Mkactivity, mkcalendar => Mkcalendar, mkcol => Mkcol,
            r#move => Move, notify => Notify, options => Options, patch => Patch,
            post => Post, propfind => Propfind, proppatch => Proppatch,
            purge => Purge, put => Put, rebind => Rebind, report => Report,
            search => Search, source => Source, subscribe => Subscribe,
            trace => Trace, unbind => Unbind, unlink => Unlink, unlock => Unlock,
            unsubscribe => Unsubscribe
        );
    };
    (@emit $chain:ty; $($name:ident => $variant:ident),* $(,)?) => {
        $(
            #[doc = concat!("Registers `chain` for `", stringify!($variant), "` requests on `path`.")]
            pub fn $name(self, path: &str, chain: impl Into<$chain>) -> Self {
                self.on($crate::method::Method::$variant, path, chain)
            }
        )*
    };
}

pub(crate) use verb_methods;
