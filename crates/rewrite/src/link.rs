//! ProxyLinks: same-origin URLs that re-enter the proxy.

use url::Url;

use crate::resolve::{is_web_url, resolve};

/// Default mount point of the proxy endpoint.
pub const DEFAULT_PROXY_PATH: &str = "/proxy";

/// Builds `<prefix>?url=<percent-encoded absolute URL>` links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyLinker {
    prefix: String,
}

impl Default for ProxyLinker {
    fn default() -> Self {
        Self::new(DEFAULT_PROXY_PATH)
    }
}

impl ProxyLinker {
    /// Root-relative links: `/proxy?url=...`.
    pub fn new(proxy_path: &str) -> Self {
        Self {
            prefix: proxy_path.to_string(),
        }
    }

    /// Absolute links on the proxy's own origin, e.g.
    /// `http://localhost:8080/proxy?url=...`. Any path already on `origin`
    /// is kept as a mount prefix.
    pub fn with_origin(origin: &Url, proxy_path: &str) -> Self {
        let mut root = origin.clone();
        root.set_query(None);
        root.set_fragment(None);
        Self {
            prefix: format!("{}{proxy_path}", root.as_str().trim_end_matches('/')),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The ProxyLink for an absolute target.
    #[must_use]
    pub fn link(&self, target: &Url) -> String {
        format!("{}?url={}", self.prefix, urlencoding::encode(target.as_str()))
    }

    /// Resolve `reference` against `base` and return its ProxyLink, or
    /// `None` when the reference is empty, fragment-only, unresolvable or
    /// not http(s). Callers keep the original value on `None`.
    #[must_use]
    pub fn rewrite(&self, reference: &str, base: &Url) -> Option<String> {
        let trimmed = reference.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        let resolved = resolve(reference, base).ok()?;
        is_web_url(&resolved).then(|| self.link(&resolved))
    }

    /// The absolute target carried by a link this linker produced.
    #[must_use]
    pub fn target_of(&self, link: &str) -> Option<String> {
        let encoded = link.strip_prefix(&self.prefix)?.strip_prefix("?url=")?;
        urlencoding::decode(encoded).ok().map(|s| s.into_owned())
    }
}
