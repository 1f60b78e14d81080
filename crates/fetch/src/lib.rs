//! Upstream fetching for the proxy.
//!
//! Redirects are never followed by the HTTP client: the fetcher walks them
//! itself so each hop passes the SSRF guard before it is requested. TLS
//! certificates are always verified.

pub mod error;
pub mod fetcher;
pub mod headers;

pub use {
    error::{FetchError, Result},
    fetcher::{
        DEFAULT_MAX_REDIRECTS, FetchOptions, UpstreamFetcher, UpstreamRequest, UpstreamResponse,
    },
    headers::forwarded_headers,
};
