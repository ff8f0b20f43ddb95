//! Reminder persistence.
//!
//! The dialogue hands finished records to a [`ReminderStore`]. Reminders are
//! addressed by their position in the list (insertion order), which is how
//! the schedule screen refers to them when one is edited.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};

use peep_core::types::ReminderRecord;

use crate::db::Database;
use crate::error::StoreError;

/// Persistence collaborator for reminder records.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Append a reminder to the list.
    async fn save(&self, record: &ReminderRecord) -> Result<(), StoreError>;

    /// All reminders in insertion order.
    async fn list(&self) -> Result<Vec<ReminderRecord>, StoreError>;

    /// Overwrite the reminder at `index`.
    async fn replace(&self, index: usize, record: &ReminderRecord) -> Result<(), StoreError>;
}

// =============================================================================
// In-memory
// =============================================================================

/// Volatile store for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryReminderStore {
    records: Mutex<Vec<ReminderRecord>>,
}

impl InMemoryReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<MutexGuard<'_, Vec<ReminderRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|e| StoreError::Database(format!("Reminder list lock poisoned: {}", e)))
    }
}

#[async_trait]
impl ReminderStore for InMemoryReminderStore {
    async fn save(&self, record: &ReminderRecord) -> Result<(), StoreError> {
        self.records()?.push(record.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ReminderRecord>, StoreError> {
        Ok(self.records()?.clone())
    }

    async fn replace(&self, index: usize, record: &ReminderRecord) -> Result<(), StoreError> {
        let mut records = self.records()?;
        let slot = records.get_mut(index).ok_or(StoreError::NotFound(index))?;
        *slot = record.clone();
        Ok(())
    }
}

// =============================================================================
// SQLite
// =============================================================================

/// Reminder store backed by the SQLite `reminders` table.
#[derive(Debug, Clone)]
pub struct SqliteReminderStore {
    db: Arc<Database>,
}

impl SqliteReminderStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Run a query on the blocking pool so SQLite I/O never stalls the runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| StoreError::Database(format!("Database task panicked: {}", e)))?
    }
}

type ReminderRow = (String, i64, String, String, String);

fn row_to_record(row: ReminderRow) -> Result<ReminderRecord, StoreError> {
    let (name, dosage, days, times, notes) = row;
    let dosage = u32::try_from(dosage)
        .map_err(|_| StoreError::Database(format!("Invalid dosage {} for {}", dosage, name)))?;
    Ok(ReminderRecord {
        name,
        dosage,
        days: serde_json::from_str(&days)?,
        times: serde_json::from_str(&times)?,
        notes,
    })
}

#[async_trait]
impl ReminderStore for SqliteReminderStore {
    async fn save(&self, record: &ReminderRecord) -> Result<(), StoreError> {
        let days = serde_json::to_string(&record.days)?;
        let times = serde_json::to_string(&record.times)?;
        let (name, dosage, notes) = (record.name.clone(), record.dosage, record.notes.clone());
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO reminders (name, dosage, days, times, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![name, dosage, days, times, notes],
            )?;
            Ok(())
        })
        .await?;
        tracing::info!(name = %record.name, "Reminder saved");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ReminderRecord>, StoreError> {
        let rows: Vec<ReminderRow> = self
            .blocking(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name, dosage, days, times, notes FROM reminders ORDER BY id",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        rows.into_iter().map(row_to_record).collect()
    }

    async fn replace(&self, index: usize, record: &ReminderRecord) -> Result<(), StoreError> {
        let days = serde_json::to_string(&record.days)?;
        let times = serde_json::to_string(&record.times)?;
        let (name, dosage, notes) = (record.name.clone(), record.dosage, record.notes.clone());
        self.blocking(move |conn| {
            let id: Option<i64> = conn
                .query_row(
                    "SELECT id FROM reminders ORDER BY id LIMIT 1 OFFSET ?1",
                    rusqlite::params![index as i64],
                    |row| row.get(0),
                )
                .optional()?;
            let id = id.ok_or(StoreError::NotFound(index))?;
            conn.execute(
                "UPDATE reminders SET name = ?1, dosage = ?2, days = ?3, times = ?4, notes = ?5
                 WHERE id = ?6",
                rusqlite::params![name, dosage, days, times, notes, id],
            )?;
            Ok(())
        })
        .await?;
        tracing::info!(index, name = %record.name, "Reminder replaced");
        Ok(())
    }
}
