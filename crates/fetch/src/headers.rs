//! Request header allow-list for upstream fetches.

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderName, USER_AGENT};

/// Pick the headers of an inbound request to send upstream.
///
/// Only `Accept` and `Accept-Language` always pass. Everything else
/// (cookies, credentials, `Host`, hop-by-hop and forwarding headers) is
/// dropped.
///
/// `Content-Type` only travels with a body. `User-Agent` is the client's
/// own when `forward_user_agent` is set, otherwise the fetcher's default
/// applies.
#[must_use]
pub fn forwarded_headers(
    inbound: &HeaderMap,
    has_body: bool,
    forward_user_agent: bool,
) -> HeaderMap {
    let mut names: Vec<HeaderName> = vec![ACCEPT, ACCEPT_LANGUAGE];
    if has_body {
        names.push(CONTENT_TYPE);
    }
    if forward_user_agent {
        names.push(USER_AGENT);
    }

    let mut out = HeaderMap::new();
    for name in names {
        if let Some(value) = inbound.get(&name) {
            out.insert(name, value.clone());
        }
    }
    out
}

/// Flatten a response header map: for repeated names the last value wins.
#[must_use]
pub fn last_value_wins(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.keys_len());
    for (name, value) in headers {
        out.insert(name.clone(), value.clone());
    }
    out
}
