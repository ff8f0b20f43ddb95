use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PeepError, Result};

/// Top-level configuration for the Peep application.
///
/// Loaded from `~/.peep/config.toml` by default. Every section falls back to
/// its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeepConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl PeepConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PeepConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PeepError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the reminder list.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.peep/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Voice dialogue timing and recognition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Locale passed to the speech recognizer.
    pub locale: String,
    /// Delay before the first prompt of a session.
    pub initial_delay_ms: u64,
    /// How long a listening turn may stay silent before it times out.
    pub listen_timeout_ms: u64,
    /// Pause between a failure notice and re-asking the current step.
    pub retry_delay_ms: u64,
    /// Pause before listening again after a recoverable recognizer error.
    pub recoverable_restart_delay_ms: u64,
    /// Pause between the cancel announcement and leaving the dialogue.
    pub cancel_delay_ms: u64,
    /// Recognizer error codes that are retried silently.
    pub recoverable_error_codes: Vec<String>,
    /// Fragments of our own prompts that the recognizer tends to pick up.
    pub echo_markers: Vec<String>,
    /// Consecutive failed turns before the dialogue gives up. 0 disables the cap.
    pub max_consecutive_retries: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            locale: "ko-KR".to_string(),
            initial_delay_ms: 1000,
            listen_timeout_ms: 7000,
            retry_delay_ms: 2000,
            recoverable_restart_delay_ms: 1000,
            cancel_delay_ms: 2000,
            recoverable_error_codes: vec!["5".to_string(), "7".to_string()],
            echo_markers: vec![
                "입력하시려면 음성".to_string(),
                "다시 말씀해 주세요".to_string(),
            ],
            max_consecutive_retries: 5,
        }
    }
}

impl VoiceConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn listen_timeout(&self) -> Duration {
        Duration::from_millis(self.listen_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn recoverable_restart_delay(&self) -> Duration {
        Duration::from_millis(self.recoverable_restart_delay_ms)
    }

    pub fn cancel_delay(&self) -> Duration {
        Duration::from_millis(self.cancel_delay_ms)
    }

    /// Whether a recognizer error code should be retried silently.
    pub fn is_recoverable(&self, code: &str) -> bool {
        self.recoverable_error_codes.iter().any(|c| c == code)
    }
}

/// Reminder list and notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Notification channel the planned reminders are posted to.
    pub channel_id: String,
    /// Title shown on every dosage notification.
    pub title: String,
    /// SQLite file holding the reminder list, inside the data directory.
    pub store_file: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            channel_id: "schedule-channel".to_string(),
            title: "삐약삐약".to_string(),
            store_file: "peep.db".to_string(),
        }
    }
}
