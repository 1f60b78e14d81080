use thiserror::Error;

/// Why a target URL was refused before any fetch.
///
/// Display strings are safe to show to clients: they name the host at most,
/// never the addresses it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("unsupported scheme: {0}")]
    InvalidScheme(String),

    #[error("url has no host")]
    MissingHost,

    #[error("could not resolve host {host}")]
    ResolutionFailed { host: String },

    #[error("host {host} resolves to a blocked address")]
    BlockedAddress { host: String },
}

impl Rejection {
    /// Whether the rejection is the client's fault (bad input) rather than
    /// a policy or network outcome.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl(_) | Self::InvalidScheme(_) | Self::MissingHost
        )
    }
}

pub type Result<T> = std::result::Result<T, Rejection>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_message_omits_addresses() {
        let err = Rejection::BlockedAddress {
            host: "intranet.example".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("intranet.example"));
        assert!(!msg.contains("10."));
    }

    #[test]
    fn input_classification() {
        assert!(Rejection::InvalidScheme("ftp".into()).is_invalid_input());
        assert!(Rejection::MissingHost.is_invalid_input());
        assert!(
            !Rejection::ResolutionFailed {
                host: "nope.invalid".into()
            }
            .is_invalid_input()
        );
        assert!(
            !Rejection::BlockedAddress {
                host: "localhost".into()
            }
            .is_invalid_input()
        );
    }
}
