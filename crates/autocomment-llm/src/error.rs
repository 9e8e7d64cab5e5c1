use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// The local endpoint is down and there is no cloud key to fall back on.
    #[error("local endpoint {endpoint} is unreachable and no cloud_api_key is configured")]
    MissingCredential { endpoint: String },

    #[error("no models are installed on the local endpoint")]
    NoModels,

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("unexpected response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    #[error("model returned no text")]
    EmptyResponse,
}

impl LlmError {
    /// Conditions the run cannot continue past.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LlmError::MissingCredential { .. } | LlmError::NoModels
        )
    }
}
