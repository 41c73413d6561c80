use thiserror::Error;

/// Failure of a single provider attempt. The dispatcher's failover decision
/// is a function of the variant, never of the message text.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("decode: {0}")]
    Decode(String),
    #[error("guardrail rejected: {0}")]
    Guardrail(String),
    #[error("request cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Stable tag used for error-by-type stats and log records.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Configuration(_) => "configuration",
            ProviderError::Transport(_) => "transport",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Decode(_) => "decode",
            ProviderError::Guardrail(_) => "guardrail",
            ProviderError::Cancelled => "cancelled",
        }
    }

    /// Whether the dispatcher may try the next enabled provider.
    pub fn triggers_failover(&self) -> bool {
        !matches!(self, ProviderError::Cancelled)
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
