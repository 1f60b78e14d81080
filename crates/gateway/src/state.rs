use std::sync::Arc;

use {
    axum::http::{HeaderMap, header::HOST},
    url::Url,
    wayfarer_config::WayfarerConfig,
    wayfarer_fetch::{FetchError, FetchOptions, UpstreamFetcher},
    wayfarer_network_filter::SsrfGuard,
    wayfarer_rewrite::ProxyLinker,
};

/// Shared state for the proxy routes.
pub struct ProxyState {
    pub guard: Arc<SsrfGuard>,
    pub fetcher: UpstreamFetcher,
    pub proxy_path: String,
    pub public_url: Option<Url>,
    pub forward_user_agent: bool,
    pub max_request_body_bytes: usize,
    pub version: &'static str,
}

impl ProxyState {
    /// State with a system-resolver guard built from the `[ssrf]` section.
    pub fn from_config(config: &WayfarerConfig) -> Result<Arc<Self>, FetchError> {
        let guard = Arc::new(SsrfGuard::new(config.ssrf.allowlist.clone()));
        Self::with_guard(config, guard)
    }

    /// State around an existing guard (custom resolver, tests).
    pub fn with_guard(
        config: &WayfarerConfig,
        guard: Arc<SsrfGuard>,
    ) -> Result<Arc<Self>, FetchError> {
        let upstream = &config.upstream;
        let mut options = FetchOptions {
            timeout: upstream.timeout(),
            connect_timeout: upstream.connect_timeout(),
            max_redirects: upstream.max_redirects,
            max_response_bytes: upstream.max_response_bytes,
            ..FetchOptions::default()
        };
        if let Some(user_agent) = &upstream.user_agent {
            options.user_agent = user_agent.clone();
        }
        let fetcher = UpstreamFetcher::new(Arc::clone(&guard), options)?;

        Ok(Arc::new(Self {
            guard,
            fetcher,
            proxy_path: config.server.proxy_path.clone(),
            public_url: config.server.public_url.clone(),
            forward_user_agent: upstream.forward_user_agent,
            max_request_body_bytes: config.server.max_request_body_bytes,
            version: env!("CARGO_PKG_VERSION"),
        }))
    }

    /// Linker emitting absolute ProxyLinks on this proxy's origin.
    ///
    /// Uses `public_url` when configured, else `http://<Host>` from the
    /// inbound request, else plain root-relative links.
    pub fn linker_for(&self, inbound: &HeaderMap) -> ProxyLinker {
        let origin = self.public_url.clone().or_else(|| {
            let host = inbound.get(HOST)?.to_str().ok()?;
            Url::parse(&format!("http://{host}"))
                .ok()
                .filter(|url| url.path() == "/" && url.query().is_none())
        });
        match origin {
            Some(origin) => ProxyLinker::with_origin(&origin, &self.proxy_path),
            None => ProxyLinker::new(&self.proxy_path),
        }
    }
}
