//! Error types for the code-assistant crate.

/// Assistant error taxonomy.
///
/// Tool failures are not represented: they travel back to the model as
/// `Error: ...` strings and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Blank query or path submitted by a caller.
    #[error("{0}")]
    InvalidInput(String),

    /// Tool service could not be reached when opening a session.
    #[error("tool service unreachable at {endpoint}: {reason}")]
    ServiceUnavailable { endpoint: String, reason: String },

    /// Reasoning loop produced a trace we cannot take an answer from.
    #[error("malformed agent trace: {0}")]
    MalformedTrace(String),

    /// Tool protocol violation after the session was established.
    #[error("tool protocol error: {0}")]
    Protocol(String),

    /// Language model request failed.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Request exceeded its configured deadline.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anything else.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AssistantError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

/// Convenience result type for assistant operations.
pub type AssistantResult<T> = Result<T, AssistantError>;
