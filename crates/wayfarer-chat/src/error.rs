//! Error types for the chat pipeline.

use wayfarer_core::error::WayfarerError;

/// Broad failure classes used for logging and HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad request shape; surfaced as 400.
    Validation,
    /// LLM or data provider unreachable or erroring.
    UpstreamUnavailable,
    /// The LLM answered in the wrong shape for the requested mode.
    ProtocolViolation,
    /// A required credential or resource is missing.
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::ProtocolViolation => "protocol_violation",
            ErrorKind::Configuration => "configuration",
        }
    }
}

/// Errors from a text-generation call.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM API key is not configured")]
    MissingApiKey,
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed LLM response: {0}")]
    Malformed(String),
    #[error("unexpected function call `{0}` in text generation")]
    UnexpectedFunctionCall(String),
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::MissingApiKey => ErrorKind::Configuration,
            LlmError::Http(_) | LlmError::Status { .. } | LlmError::Malformed(_) => {
                ErrorKind::UpstreamUnavailable
            }
            LlmError::UnexpectedFunctionCall(_) => ErrorKind::ProtocolViolation,
        }
    }
}

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("template error: {0}")]
    Template(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) => ErrorKind::Validation,
            ChatError::Template(_) => ErrorKind::Configuration,
            ChatError::Llm(e) => e.kind(),
        }
    }
}

impl From<WayfarerError> for ChatError {
    fn from(err: WayfarerError) -> Self {
        ChatError::Template(err.to_string())
    }
}
