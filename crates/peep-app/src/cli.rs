//! CLI argument definitions for the Peep application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Peep - spoken medication reminders.
#[derive(Parser, Debug)]
#[command(name = "peep", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Data directory holding the reminder database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add a reminder through the spoken dialogue (default).
    Voice,
    /// Print the stored reminders.
    List,
    /// Print the notifications each stored reminder schedules.
    Plan {
        /// Emit JSON instead of one line per notification.
        #[arg(long)]
        json: bool,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PEEP_CONFIG env var > ~/.peep/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PEEP_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Data directory override, if one was given on the command line.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Log level override, if one was given on the command line.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }

    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Voice)
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".peep").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

pub fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let var = "USERPROFILE";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";
    std::env::var(var).ok().map(PathBuf::from)
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = path
        .strip_prefix("~/")
        .or_else(|| path.strip_prefix("~\\"));
    match (rest, home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        (Some(rest), None) => PathBuf::from(".").join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_voice() {
        let args = CliArgs::try_parse_from(["peep"]).unwrap();
        assert_eq!(args.command(), Command::Voice);
        assert!(args.resolve_data_dir().is_none());
        assert!(args.resolve_log_level().is_none());
    }

    #[test]
    fn test_parse_subcommands() {
        let args = CliArgs::try_parse_from(["peep", "list"]).unwrap();
        assert_eq!(args.command(), Command::List);

        let args = CliArgs::try_parse_from(["peep", "plan", "--json"]).unwrap();
        assert_eq!(args.command(), Command::Plan { json: true });
    }

    #[test]
    fn test_global_overrides() {
        let args = CliArgs::try_parse_from([
            "peep", "-c", "/tmp/p.toml", "-d", "/tmp/data", "-l", "debug", "plan",
        ])
        .unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/p.toml"));
        assert_eq!(args.resolve_data_dir().as_deref(), Some("/tmp/data"));
        assert_eq!(args.resolve_log_level().as_deref(), Some("debug"));
    }

    #[test]
    fn test_unknown_subcommand_is_rejected() {
        assert!(CliArgs::try_parse_from(["peep", "delete"]).is_err());
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/var/peep"), PathBuf::from("/var/peep"));
        assert_eq!(expand_home("data"), PathBuf::from("data"));
        assert!(expand_home("~/.peep/data").ends_with(".peep/data"));
    }
}
