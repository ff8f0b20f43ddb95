//! Shared configuration, error and domain types for the Peep reminder assistant.

pub mod config;
pub mod error;
pub mod types;

pub use config::PeepConfig;
pub use error::{PeepError, Result};
pub use types::*;
