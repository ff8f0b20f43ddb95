//! Error types for the voice layer.

use peep_core::error::PeepError;

/// Errors raised by speech adapters and the dialogue controller.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("Speech output failed: {0}")]
    OutputFailed(String),
    #[error("Speech input failed: {0}")]
    InputFailed(String),
    #[error("Speech capability unavailable: {0}")]
    Unavailable(String),
    #[error("Speech input already has an active registration")]
    AlreadyRegistered,
    #[error("Dialogue session closed before finishing")]
    SessionClosed,
}

impl From<VoiceError> for PeepError {
    fn from(err: VoiceError) -> Self {
        PeepError::Voice(err.to_string())
    }
}
