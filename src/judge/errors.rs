use thiserror::Error;

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Invalid submission timestamp: {0}")]
    InvalidTimestamp(String),

    /// Every retry attempt failed
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    Unavailable {
        operation: String,
        attempts: u32,
        last_error: String,
    },
}

impl JudgeError {
    /// Malformed data won't get better by asking again
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            JudgeError::InvalidTimestamp(_) | JudgeError::Unavailable { .. }
        )
    }
}
