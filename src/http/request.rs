//! Request snapshot kept alongside every transfer.
//!
//! # Responsibilities
//! - Capture method, URL, version and headers before the body is consumed
//! - Travel with errors and promises so a transfer can be diagnosed later
//!
//! # Design Decisions
//! - The body is never part of the snapshot; it is moved into the transfer
//! - Immutable once taken
//! - `user:password@` is stripped from the URL; the snapshot ends up in
//!   error text and logs

use http::uri::Authority;
use http::{HeaderMap, Method, Request, Uri, Version};

/// Immutable snapshot of a request's head.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

impl RequestHead {
    /// Snapshot the head of any request, leaving the body untouched.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: without_userinfo(request.uri()),
            version: request.version(),
            headers: request.headers().clone(),
        }
    }
}

impl std::fmt::Display for RequestHead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.uri)
    }
}

/// Drop the userinfo part of the authority, if any.
pub(crate) fn without_userinfo(uri: &Uri) -> Uri {
    let Some((_, host)) = uri
        .authority()
        .and_then(|authority| authority.as_str().rsplit_once('@'))
    else {
        return uri.clone();
    };

    let mut parts = uri.clone().into_parts();
    parts.authority = host.parse::<Authority>().ok();
    Uri::from_parts(parts).unwrap_or_else(|_| Uri::from_static("/"))
}
