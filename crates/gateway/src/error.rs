use {
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    thiserror::Error,
    wayfarer_fetch::FetchError,
    wayfarer_network_filter::Rejection,
};

/// Everything that can fail a proxy request before a response is produced.
///
/// Responses carry `{"code": ..., "error": ...}`. The message names the host
/// at most; resolved addresses never appear in it.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("missing url parameter")]
    MissingUrl,

    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingUrl => StatusCode::BAD_REQUEST,
            Self::Rejected(rejection) | Self::Fetch(FetchError::Rejected(rejection)) => {
                rejection_status(rejection)
            },
            Self::Fetch(FetchError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Fetch(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable machine-readable failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingUrl => "INVALID_INPUT",
            Self::Rejected(rejection) | Self::Fetch(FetchError::Rejected(rejection)) => {
                rejection_code(rejection)
            },
            Self::Fetch(FetchError::Timeout(_)) => "TIMEOUT",
            Self::Fetch(FetchError::TooManyRedirects { .. }) => "TOO_MANY_REDIRECTS",
            Self::Fetch(FetchError::BodyTooLarge { .. }) => "BODY_TOO_LARGE",
            Self::Fetch(FetchError::Unreachable(_) | FetchError::Client(_)) => {
                "UPSTREAM_UNREACHABLE"
            },
        }
    }
}

fn rejection_status(rejection: &Rejection) -> StatusCode {
    match rejection {
        Rejection::InvalidUrl(_) | Rejection::InvalidScheme(_) | Rejection::MissingHost => {
            StatusCode::BAD_REQUEST
        },
        Rejection::BlockedAddress { .. } => StatusCode::FORBIDDEN,
        Rejection::ResolutionFailed { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn rejection_code(rejection: &Rejection) -> &'static str {
    match rejection {
        Rejection::InvalidUrl(_) | Rejection::InvalidScheme(_) | Rejection::MissingHost => {
            "INVALID_INPUT"
        },
        Rejection::BlockedAddress { .. } => "FORBIDDEN",
        Rejection::ResolutionFailed { .. } => "RESOLUTION_FAILED",
    }
}

fn api_error(code: &str, error: impl Into<String>) -> serde_json::Value {
    serde_json::json!({
        "code": code,
        "error": error.into(),
    })
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), Json(api_error(self.code(), self.to_string()))).into_response()
    }
}
