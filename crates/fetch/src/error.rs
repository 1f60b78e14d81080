use std::time::Duration;

use {thiserror::Error, wayfarer_network_filter::Rejection};

#[derive(Debug, Error)]
pub enum FetchError {
    /// The target or a redirect hop failed the SSRF guard.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("more than {max} redirects")]
    TooManyRedirects { max: usize },

    #[error("upstream body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    pub fn unreachable(message: impl std::fmt::Display) -> Self {
        Self::Unreachable(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
