use reqwest::StatusCode;
use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection, TLS or timeout failure before a response came back.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("authentication rejected (status {status}): {body}")]
    Auth { status: u16, body: String },
    #[error("{resource} not found")]
    NotFound { resource: String },
    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("{0} is not configured for this provider")]
    Unsupported(&'static str),
}

impl ProviderError {
    /// Map a non-success HTTP status to the matching error kind.
    pub fn from_status(status: StatusCode, resource: &str, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth {
                status: status.as_u16(),
                body,
            },
            StatusCode::NOT_FOUND => ProviderError::NotFound {
                resource: resource.to_string(),
            },
            _ => ProviderError::Api {
                status: status.as_u16(),
                body,
            },
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ProviderError::Auth { .. })
    }

    /// Short machine-friendly kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Network(_) => "network",
            ProviderError::Auth { .. } => "auth",
            ProviderError::NotFound { .. } => "not_found",
            ProviderError::Api { .. } => "api",
            ProviderError::MalformedResponse(_) => "malformed_response",
            ProviderError::Unsupported(_) => "unsupported",
        }
    }
}
