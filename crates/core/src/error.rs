use thiserror::Error;

/// Result type for repoagent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for repoagent operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single repository tool call failed; recovered locally with a
    /// partial or empty result
    #[error("Tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    /// The model service could not be reached or returned a server error
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The model service rejected the request due to rate limiting
    #[error("Model rate limited: {0}")]
    ModelRateLimited(String),

    /// The model responded, but not in the expected shape
    #[error("Malformed model response: {0}")]
    ModelMalformedResponse(String),

    /// Retrieval service errors
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// A cache entry could not be read; treated as a miss by callers
    #[error("Corrupt cache entry: {0}")]
    CacheCorrupt(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The run was cancelled from outside
    #[error("Run cancelled")]
    Cancelled,

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a tool failure error
    pub fn tool(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// Creates a retrieval error
    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Retrieval(msg.into())
    }

    /// Whether the failure is transient and worth retrying with backoff.
    /// Authentication and malformed-request failures are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ModelUnavailable(_) | Self::ModelRateLimited(_)
        )
    }
}

/// Truncate a payload for inclusion in an error message
pub fn truncate_for_error(text: &str) -> String {
    const MAX: usize = 200;
    if text.len() <= MAX {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{cut}...")
    }
}
