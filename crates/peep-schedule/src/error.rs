//! Error types for the reminder store.

use peep_core::error::PeepError;

/// Errors from reminder persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("No reminder at position {0}")]
    NotFound(usize),
    #[error("Corrupt reminder row: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<StoreError> for PeepError {
    fn from(err: StoreError) -> Self {
        PeepError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NotFound(3);
        assert_eq!(err.to_string(), "No reminder at position 3");

        let err = StoreError::Database("disk I/O error".to_string());
        assert_eq!(err.to_string(), "Database error: disk I/O error");
    }

    #[test]
    fn test_store_error_into_peep_error() {
        let err: PeepError = StoreError::NotFound(0).into();
        assert!(matches!(err, PeepError::Storage(_)));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Database(_)));
    }
}
