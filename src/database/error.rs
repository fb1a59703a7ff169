use thiserror::Error;

/// Failures of the order and transaction stores
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("record not found: {id}")]
    NotFound { id: String },

    #[error("record already exists: {id}")]
    Duplicate { id: String },

    /// A conditional update found the record in a different status
    #[error("status conflict on {id}: expected {expected}, found {actual}")]
    StatusConflict {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("store unavailable: {message}")]
    Unavailable { message: String },
}

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }
}
