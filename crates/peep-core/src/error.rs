use thiserror::Error;

/// Top-level error type for the Peep workspace.
///
/// Subsystem crates define their own error enums and implement
/// `From<SubsystemError> for PeepError` so `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PeepError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Voice error: {0}")]
    Voice(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for PeepError {
    fn from(err: toml::de::Error) -> Self {
        PeepError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for PeepError {
    fn from(err: toml::ser::Error) -> Self {
        PeepError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PeepError {
    fn from(err: serde_json::Error) -> Self {
        PeepError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Peep operations.
pub type Result<T> = std::result::Result<T, PeepError>;
