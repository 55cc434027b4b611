use thiserror::Error;

/// Failures of a call to the agent API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("reply stream broke: {0}")]
    Stream(#[source] reqwest::Error),

    #[error("invalid client configuration: {0}")]
    Config(#[source] reqwest::Error),
}

impl ApiError {
    /// HTTP status of a non-success answer, if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
