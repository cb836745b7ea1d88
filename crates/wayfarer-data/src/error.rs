//! Error types for upstream data providers.
//!
//! These never escape the gateway: it logs them and reports the data as
//! unavailable.

/// Errors from a single provider call.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("{0} API key is not configured")]
    MissingApiKey(&'static str),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl DataError {
    /// Build a `Status` error, keeping at most 200 characters of the body.
    pub fn status(status: u16, body: &str) -> Self {
        DataError::Status {
            status,
            body: body.chars().take(200).collect(),
        }
    }
}
