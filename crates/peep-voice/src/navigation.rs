//! Navigation collaborator.
//!
//! The dialogue hands control back to the surrounding app through a
//! [`Navigator`]: screen changes on terminal transitions and short toast-style
//! notices for silently retried recognizer errors.

use std::fmt;
use std::sync::Mutex;

/// Where the app should go when the dialogue leaves the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Home screen. Voice state is reset there.
    Home { cancelled_from_schedule: bool },
    /// Drug name and dosage entry screen.
    NameEntry { voice_mode: bool },
    /// Reminder list.
    Schedule {
        reset_inputs: bool,
        restart_voice: bool,
    },
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Home { .. } => write!(f, "Home"),
            Destination::NameEntry { .. } => write!(f, "NameEntry"),
            Destination::Schedule { .. } => write!(f, "Schedule"),
        }
    }
}

/// Navigation layer the dialogue reports to.
pub trait Navigator: Send + Sync {
    fn navigate(&self, destination: Destination);

    /// Show a transient notice without speaking it.
    fn notify(&self, message: &str);
}

/// Navigator that only records what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    destinations: Mutex<Vec<Destination>>,
    notices: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn destinations(&self) -> Vec<Destination> {
        self.destinations.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, destination: Destination) {
        tracing::info!(%destination, "Navigate");
        self.destinations.lock().unwrap().push(destination);
    }

    fn notify(&self, message: &str) {
        tracing::info!(message = %message, "Notice");
        self.notices.lock().unwrap().push(message.to_string());
    }
}
