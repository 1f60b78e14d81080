use std::{sync::Arc, time::Duration};

use {
    bytes::{Bytes, BytesMut},
    reqwest::{
        Method, StatusCode,
        header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, LOCATION},
        redirect::Policy,
    },
    tracing::{debug, instrument},
    url::Url,
    wayfarer_network_filter::{SsrfGuard, ValidatedUrl},
};

use crate::{
    error::{FetchError, Result},
    headers::last_value_wins,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_REDIRECTS: usize = 8;
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 25 * 1024 * 1024;
pub const DEFAULT_USER_AGENT: &str = concat!("wayfarer/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Total budget for one fetch, redirects and body included.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_redirects: usize,
    pub max_response_bytes: usize,
    /// Sent when the client's own User-Agent is not forwarded.
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// What to send upstream besides the URL.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl UpstreamRequest {
    pub fn get(headers: HeaderMap) -> Self {
        Self {
            method: Method::GET,
            headers,
            body: None,
        }
    }
}

/// Final (non-redirect) upstream response, fully buffered.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// One value per header name.
    pub headers: HeaderMap,
    pub body: Bytes,
    /// URL the body actually came from, after redirects.
    pub effective_url: Url,
}

impl UpstreamResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

/// Fetches vetted targets, following and re-vetting redirects itself.
pub struct UpstreamFetcher {
    client: reqwest::Client,
    guard: Arc<SsrfGuard>,
    options: FetchOptions,
}

impl UpstreamFetcher {
    pub fn new(guard: Arc<SsrfGuard>, options: FetchOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .connect_timeout(options.connect_timeout)
            .user_agent(options.user_agent.clone())
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            guard,
            options,
        })
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetch `target`, following up to `max_redirects` redirects.
    ///
    /// Every hop is vetted by the guard before it is requested. 303, and
    /// 301/302 answering anything but GET/HEAD, continue as a bodiless GET;
    /// 307/308 repeat the method and body. Upstream 4xx/5xx are returned as
    /// responses, not errors.
    #[instrument(skip_all, fields(method = %request.method, url = %target.url()))]
    pub async fn fetch(
        &self,
        target: ValidatedUrl,
        request: UpstreamRequest,
    ) -> Result<UpstreamResponse> {
        let budget = self.options.timeout;
        tokio::time::timeout(budget, self.follow(target.into_url(), request))
            .await
            .map_err(|_| FetchError::Timeout(budget))?
    }

    async fn follow(&self, mut url: Url, mut request: UpstreamRequest) -> Result<UpstreamResponse> {
        let mut hops = 0;
        loop {
            let mut builder = self
                .client
                .request(request.method.clone(), url.clone())
                .headers(request.headers.clone());
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }
            let response = builder.send().await.map_err(|e| self.map_request_error(e))?;
            let status = response.status();

            let location = is_followed_redirect(status)
                .then(|| response.headers().get(LOCATION))
                .flatten();
            let Some(location) = location else {
                debug!(status = status.as_u16(), %url, "upstream responded");
                let headers = last_value_wins(response.headers());
                let body = self.read_body(response).await?;
                return Ok(UpstreamResponse {
                    status,
                    headers,
                    body,
                    effective_url: url,
                });
            };

            if hops >= self.options.max_redirects {
                return Err(FetchError::TooManyRedirects {
                    max: self.options.max_redirects,
                });
            }
            let location = location
                .to_str()
                .map_err(|_| FetchError::unreachable("redirect Location is not valid text"))?;
            let next = url
                .join(location)
                .map_err(|e| FetchError::unreachable(format!("bad redirect Location: {e}")))?;
            let next = match self.guard.vet_url(next).await {
                Ok(validated) => validated.into_url(),
                // A Location the client could never have asked for is the
                // upstream's fault, not bad input.
                Err(rejection) if rejection.is_invalid_input() => {
                    return Err(FetchError::unreachable(format!(
                        "unusable redirect Location: {rejection}"
                    )));
                },
                Err(rejection) => return Err(rejection.into()),
            };

            if switches_to_get(status, &request.method) {
                request.method = Method::GET;
                request.body = None;
                request.headers.remove(CONTENT_TYPE);
                request.headers.remove(CONTENT_LENGTH);
            }
            debug!(status = status.as_u16(), from = %url, to = %next, "following redirect");
            url = next;
            hops += 1;
        }
    }

    async fn read_body(&self, mut response: reqwest::Response) -> Result<Bytes> {
        let limit = self.options.max_response_bytes;
        let too_large = FetchError::BodyTooLarge { limit };
        if response
            .content_length()
            .is_some_and(|len| len > u64::try_from(limit).unwrap_or(u64::MAX))
        {
            return Err(too_large);
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.map_request_error(e))?
        {
            if body.len().saturating_add(chunk.len()) > limit {
                return Err(too_large);
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }

    fn map_request_error(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.options.timeout)
        } else {
            FetchError::unreachable(error)
        }
    }
}

fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

fn switches_to_get(status: StatusCode, method: &Method) -> bool {
    match status {
        StatusCode::SEE_OTHER => *method != Method::HEAD,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => {
            *method != Method::GET && *method != Method::HEAD
        },
        _ => false,
    }
}
