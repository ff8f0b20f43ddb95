//! Peep Schedule crate - reminder persistence and notification planning.
//!
//! Stores finished reminders in SQLite (or memory, for tests) and turns each
//! reminder into weekly-repeating dose notifications with stable ids.

pub mod db;
pub mod error;
pub mod plan;
pub mod store;

pub use db::Database;
pub use error::StoreError;
pub use plan::{
    cancelled_ids, next_occurrence, notification_id, plan_notifications, PlannedNotification,
    Repeat,
};
pub use store::{InMemoryReminderStore, ReminderStore, SqliteReminderStore};
