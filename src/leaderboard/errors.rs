use thiserror::Error;

use crate::judge::JudgeError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error("Player {0} is already registered")]
    AlreadyRegistered(String),

    #[error("Player {0} is not registered")]
    NotRegistered(String),

    #[error("Could not verify judge account {0}")]
    VerificationFailed(String),

    #[error("Season {0} not found")]
    SeasonNotFound(String),

    /// Lost an optimistic-concurrency race; retry the whole operation
    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Judge unavailable: {0}")]
    UpstreamUnavailable(#[source] JudgeError),

    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),
}

impl From<StoreError> for LeaderboardError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(message) => LeaderboardError::Conflict(message),
            other => LeaderboardError::Storage(other),
        }
    }
}

impl From<JudgeError> for LeaderboardError {
    fn from(error: JudgeError) -> Self {
        LeaderboardError::UpstreamUnavailable(error)
    }
}

impl LeaderboardError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LeaderboardError::Conflict(_))
    }
}
