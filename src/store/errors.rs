use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// An atomic write's check failed because another writer got there first
    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Latest season pointer references missing season {0}")]
    DanglingPointer(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}
