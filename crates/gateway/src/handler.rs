//! The proxy endpoint: target extraction, vetting, fetch and response shaping.

use std::sync::Arc;

use {
    axum::{
        body::Body,
        extract::{RawQuery, State},
        http::{
            HeaderMap, HeaderName, HeaderValue, Method,
            header::{
                CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, ETAG, EXPIRES, LAST_MODIFIED,
            },
        },
        response::{IntoResponse, Response},
    },
    bytes::Bytes,
    tracing::{debug, info, instrument, warn},
    wayfarer_fetch::{FetchError, UpstreamRequest, UpstreamResponse, forwarded_headers},
    wayfarer_rewrite::{HtmlRewriter, ProxyLinker, charset::charset_param},
};

use crate::{
    error::ProxyError,
    state::ProxyState,
    target::{decode_target, target_param},
};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Upstream headers relayed on passthrough responses.
static PASSTHROUGH_HEADERS: [HeaderName; 5] = [
    CONTENT_DISPOSITION,
    LAST_MODIFIED,
    ETAG,
    CACHE_CONTROL,
    EXPIRES,
];

/// Upstream headers relayed on rewritten HTML. The body changed, so
/// validators tied to the original bytes are not.
static REWRITTEN_HEADERS: [HeaderName; 3] = [LAST_MODIFIED, CACHE_CONTROL, EXPIRES];

/// `GET <proxy_path>?url=<target>`
#[instrument(skip_all)]
pub async fn proxy_get(
    State(state): State<Arc<ProxyState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    let target = query_target(query.as_deref()).ok_or(ProxyError::MissingUrl)?;
    let forwarded = forwarded_headers(&headers, false, state.forward_user_agent);
    proxy(&state, &target, &headers, UpstreamRequest::get(forwarded)).await
}

/// `POST <proxy_path>?url=<target>` relays the body upstream. Without a
/// query target, a urlencoded form field `url` names a page to navigate to,
/// fetched with a bodiless GET.
#[instrument(skip_all)]
pub async fn proxy_post(
    State(state): State<Arc<ProxyState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    if let Some(target) = query_target(query.as_deref()) {
        let request = UpstreamRequest {
            method: Method::POST,
            headers: forwarded_headers(&headers, true, state.forward_user_agent),
            body: Some(body),
        };
        return proxy(&state, &target, &headers, request).await;
    }

    let target = is_form(&headers)
        .then(|| target_param(&body))
        .flatten()
        .ok_or(ProxyError::MissingUrl)?;
    let forwarded = forwarded_headers(&headers, false, state.forward_user_agent);
    proxy(&state, &target, &headers, UpstreamRequest::get(forwarded)).await
}

fn query_target(query: Option<&str>) -> Option<String> {
    target_param(query?.as_bytes())
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .trim_start()
                .to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        })
}

async fn proxy(
    state: &ProxyState,
    raw_target: &str,
    inbound: &HeaderMap,
    request: UpstreamRequest,
) -> Result<Response, ProxyError> {
    let target = decode_target(raw_target);
    let validated = match state.guard.vet(&target).await {
        Ok(validated) => validated,
        Err(rejection) => {
            info!(reason = %rejection, "proxy target rejected");
            return Err(rejection.into());
        },
    };
    debug!(host = validated.url().host_str().unwrap_or_default(), "proxying");

    let upstream = match state.fetcher.fetch(validated, request).await {
        Ok(upstream) => upstream,
        Err(FetchError::Rejected(rejection)) => {
            info!(reason = %rejection, "redirect target rejected");
            return Err(FetchError::Rejected(rejection).into());
        },
        Err(e) => {
            warn!(error = %e, "upstream fetch failed");
            return Err(e.into());
        },
    };

    Ok(respond(upstream, state.linker_for(inbound)).await)
}

fn is_html(content_type: &str) -> bool {
    content_type
        .trim_start()
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("text/html"))
}

/// Shape the client response. Only successful HTML is rewritten; upstream
/// errors and other content types are relayed byte for byte.
async fn respond(upstream: UpstreamResponse, linker: ProxyLinker) -> Response {
    let content_type = upstream
        .content_type()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    if upstream.status.is_success() && is_html(&content_type) {
        let charset = charset_param(&content_type).map(str::to_string);
        let rewriter = HtmlRewriter::new(linker);
        let source = upstream.body.clone();
        let base = upstream.effective_url.clone();
        let rewritten = tokio::task::spawn_blocking(move || {
            rewriter.rewrite_with_charset(&source, &base, charset.as_deref())
        })
        .await;

        match rewritten {
            Ok(rewritten) => {
                let content_type = format!(
                    "text/html; charset={}",
                    rewritten.charset.to_ascii_lowercase()
                );
                return build(
                    &upstream,
                    &content_type,
                    &REWRITTEN_HEADERS,
                    Body::from(rewritten.body),
                );
            },
            Err(e) => {
                warn!(
                    url = %upstream.effective_url,
                    error = %e,
                    "html rewrite task failed, relaying original"
                );
            },
        }
    }

    build(
        &upstream,
        &content_type,
        &PASSTHROUGH_HEADERS,
        Body::from(upstream.body.clone()),
    )
}

fn build(
    upstream: &UpstreamResponse,
    content_type: &str,
    relayed: &[HeaderName],
    body: Body,
) -> Response {
    let mut headers = HeaderMap::new();
    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    headers.insert(CONTENT_TYPE, content_type);
    for name in relayed {
        if let Some(value) = upstream.headers.get(name) {
            headers.insert(name.clone(), value.clone());
        }
    }
    (upstream.status, headers, body).into_response()
}
