use std::{net::IpAddr, sync::Arc};

use {
    async_trait::async_trait,
    ipnet::IpNet,
    tracing::{debug, info},
    url::{Host, Url},
};

use crate::{
    Rejection, Result,
    ranges::{is_allowlisted, is_blocked_ip},
};

/// Resolves a hostname to the addresses a connection would use.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn lookup(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the system's `getaddrinfo` via tokio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn lookup(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>> {
        Ok(tokio::net::lookup_host((host, port))
            .await?
            .map(|addr| addr.ip())
            .collect())
    }
}

/// A target URL that passed the guard, with the addresses it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    url: Url,
    addrs: Vec<IpAddr>,
}

impl ValidatedUrl {
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Addresses seen at vetting time. Never empty.
    pub fn addrs(&self) -> &[IpAddr] {
        &self.addrs
    }

    pub fn into_url(self) -> Url {
        self.url
    }
}

/// Vets proxy targets before anything is fetched.
pub struct SsrfGuard {
    resolver: Arc<dyn HostResolver>,
    allowlist: Vec<IpNet>,
}

impl SsrfGuard {
    /// Guard using the system resolver.
    pub fn new(allowlist: Vec<IpNet>) -> Self {
        Self::with_resolver(Arc::new(SystemResolver), allowlist)
    }

    pub fn with_resolver(resolver: Arc<dyn HostResolver>, allowlist: Vec<IpNet>) -> Self {
        Self {
            resolver,
            allowlist,
        }
    }

    /// Parse and vet a raw target string.
    pub async fn vet(&self, target: &str) -> Result<ValidatedUrl> {
        let url =
            Url::parse(target.trim()).map_err(|e| Rejection::InvalidUrl(e.to_string()))?;
        self.vet_url(url).await
    }

    /// Vet an already-parsed URL.
    ///
    /// Every resolved address must be outside the blocked ranges (or inside
    /// the allowlist); one bad address rejects the whole target.
    pub async fn vet_url(&self, url: Url) -> Result<ValidatedUrl> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Rejection::InvalidScheme(url.scheme().to_string()));
        }

        let addrs = match url.host() {
            None => return Err(Rejection::MissingHost),
            Some(Host::Ipv4(v4)) => vec![IpAddr::V4(v4)],
            Some(Host::Ipv6(v6)) => vec![IpAddr::V6(v6)],
            Some(Host::Domain(domain)) => {
                let port = url.port_or_known_default().unwrap_or(80);
                match self.resolver.lookup(domain, port).await {
                    Ok(addrs) if !addrs.is_empty() => addrs,
                    Ok(_) => {
                        debug!(host = domain, "resolver returned no addresses");
                        return Err(Rejection::ResolutionFailed {
                            host: domain.to_string(),
                        });
                    },
                    Err(e) => {
                        debug!(host = domain, error = %e, "host resolution failed");
                        return Err(Rejection::ResolutionFailed {
                            host: domain.to_string(),
                        });
                    },
                }
            },
        };

        let host = url.host_str().unwrap_or_default();
        if let Some(ip) = addrs
            .iter()
            .find(|ip| is_blocked_ip(ip) && !is_allowlisted(ip, &self.allowlist))
        {
            info!(host, "refusing target in blocked address range");
            debug!(host, ip = %ip, "blocked address");
            return Err(Rejection::BlockedAddress {
                host: host.to_string(),
            });
        }

        Ok(ValidatedUrl { url, addrs })
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashMap};

    struct StaticResolver(HashMap<&'static str, Vec<IpAddr>>);

    #[async_trait]
    impl HostResolver for StaticResolver {
        async fn lookup(&self, host: &str, _port: u16) -> std::io::Result<Vec<IpAddr>> {
            self.0
                .get(host)
                .cloned()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, host))
        }
    }

    fn guard(allowlist: Vec<IpNet>) -> SsrfGuard {
        let mut table = HashMap::new();
        table.insert("public.example", vec!["93.184.216.34".parse().unwrap()]);
        table.insert("internal.example", vec!["10.1.2.3".parse().unwrap()]);
        table.insert(
            "mixed.example",
            vec![
                "93.184.216.34".parse().unwrap(),
                "192.168.0.10".parse().unwrap(),
            ],
        );
        table.insert("empty.example", vec![]);
        SsrfGuard::with_resolver(Arc::new(StaticResolver(table)), allowlist)
    }

    #[tokio::test]
    async fn loopback_literal_is_blocked() {
        let err = guard(vec![]).vet("http://127.0.0.1/x").await.unwrap_err();
        assert!(matches!(err, Rejection::BlockedAddress { .. }));
    }

    #[tokio::test]
    async fn private_literal_is_blocked() {
        let err = guard(vec![]).vet("http://10.0.0.5/").await.unwrap_err();
        assert!(matches!(err, Rejection::BlockedAddress { .. }));
    }

    #[tokio::test]
    async fn ipv6_loopback_literal_is_blocked() {
        let err = guard(vec![]).vet("http://[::1]:8080/").await.unwrap_err();
        assert!(matches!(err, Rejection::BlockedAddress { .. }));
    }

    #[tokio::test]
    async fn ftp_is_invalid_scheme() {
        let err = guard(vec![]).vet("ftp://h/x").await.unwrap_err();
        assert_eq!(err, Rejection::InvalidScheme("ftp".into()));
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn unparsable_is_invalid_url() {
        let err = guard(vec![]).vet("not a url").await.unwrap_err();
        assert!(matches!(err, Rejection::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn public_host_passes() {
        let ok = guard(vec![])
            .vet("https://public.example/page?q=1")
            .await
            .unwrap();
        assert_eq!(ok.url().as_str(), "https://public.example/page?q=1");
        assert_eq!(ok.addrs(), &["93.184.216.34".parse::<IpAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn public_literal_passes() {
        assert!(guard(vec![]).vet("http://93.184.216.34/").await.is_ok());
    }

    #[tokio::test]
    async fn any_blocked_address_rejects() {
        let err = guard(vec![])
            .vet("http://mixed.example/")
            .await
            .unwrap_err();
        assert_eq!(err, Rejection::BlockedAddress {
            host: "mixed.example".into()
        });
    }

    #[tokio::test]
    async fn resolution_failure() {
        let g = guard(vec![]);
        let err = g.vet("http://nowhere.example/").await.unwrap_err();
        assert!(matches!(err, Rejection::ResolutionFailed { .. }));
        let err = g.vet("http://empty.example/").await.unwrap_err();
        assert!(matches!(err, Rejection::ResolutionFailed { .. }));
    }

    #[tokio::test]
    async fn allowlist_permits_private() {
        let g = guard(vec!["10.0.0.0/8".parse().unwrap()]);
        assert!(g.vet("http://internal.example/api").await.is_ok());
        assert!(g.vet("http://127.0.0.1/").await.is_err());
    }
}
