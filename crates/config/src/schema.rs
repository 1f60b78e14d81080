use std::time::Duration;

use {
    ipnet::IpNet,
    serde::{Deserialize, Serialize},
    url::Url,
};

use crate::error::{ConfigError, Result};

/// Upper bound accepted for `upstream.max_redirects`.
pub const MAX_REDIRECTS_CEILING: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WayfarerConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub ssrf: SsrfConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Mount point of the proxy endpoint.
    pub proxy_path: String,
    /// Externally visible base URL of this proxy. When unset, ProxyLinks are
    /// made absolute from the inbound `Host` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<Url>,
    pub max_request_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8080,
            proxy_path: "/proxy".into(),
            public_url: None,
            max_request_body_bytes: 8 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_redirects: usize,
    pub max_response_bytes: usize,
    /// Replaces the built-in User-Agent for requests that do not forward
    /// the client's own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub forward_user_agent: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            connect_timeout_secs: 10,
            max_redirects: 8,
            max_response_bytes: 25 * 1024 * 1024,
            user_agent: None,
            forward_user_agent: true,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsrfConfig {
    /// Networks exempt from the blocked-range check.
    pub allowlist: Vec<IpNet>,
}

impl WayfarerConfig {
    /// Reject settings the proxy cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.server.proxy_path.starts_with('/') {
            return Err(ConfigError::invalid(
                "server.proxy_path",
                format!("{:?} must start with '/'", self.server.proxy_path),
            ));
        }
        if let Some(url) = &self.server.public_url
            && !matches!(url.scheme(), "http" | "https")
        {
            return Err(ConfigError::invalid(
                "server.public_url",
                format!("scheme {:?} is not http or https", url.scheme()),
            ));
        }
        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "upstream.timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.upstream.connect_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "upstream.connect_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.upstream.max_redirects > MAX_REDIRECTS_CEILING {
            return Err(ConfigError::invalid(
                "upstream.max_redirects",
                format!("at most {MAX_REDIRECTS_CEILING}"),
            ));
        }
        Ok(())
    }
}
