//! Reminder dialogue: steps, the turn state machine and its async driver.

pub mod controller;
pub mod machine;
pub mod step;

pub use controller::{DialogueController, DialogueHandle};
pub use machine::{DialogueInput, DialogueOutcome, DialogueSession, Effect, ReminderDraft};
pub use step::DialogueStep;
