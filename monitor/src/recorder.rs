//! Lock-state recorder.
//!
//! Persists the time of the most recent lock or unlock transition. Both
//! events write the same key: last write wins, with no ordering checks and
//! no alert logic.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tracing::debug;

use crate::journal::ActivityJournal;
use crate::store::{SettingsStore, StorageError};
use crate::types::{keys, LockEvent};

/// Writes `last_transition_time` in response to lock-state events.
pub struct LockRecorder {
    settings: Arc<dyn SettingsStore>,
    journal: Option<Arc<ActivityJournal>>,
}

impl LockRecorder {
    #[must_use]
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            settings,
            journal: None,
        }
    }

    #[must_use]
    pub fn with_journal(mut self, journal: Arc<ActivityJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Records a lock transition at `now_millis`.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the write fails.
    pub fn on_locked(&self, now_millis: i64) -> Result<(), StorageError> {
        self.record(LockEvent::Locked, now_millis)
    }

    /// Records an unlock transition at `now_millis`.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the write fails.
    pub fn on_unlocked(&self, now_millis: i64) -> Result<(), StorageError> {
        self.record(LockEvent::Unlocked, now_millis)
    }

    /// Stores `now_millis` as the last transition time, unconditionally.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the write fails.
    pub fn record(&self, event: LockEvent, now_millis: i64) -> Result<(), StorageError> {
        self.settings
            .set_i64(keys::LAST_TRANSITION_TIME, now_millis)?;

        debug!(event = %event, at = now_millis, "Lock transition recorded");

        if let Some(journal) = &self.journal {
            let at = Utc
                .timestamp_millis_opt(now_millis)
                .single()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| now_millis.to_string());
            journal.record(event.journal_kind(), &format!("Device {event} at {at}"));
        }
        Ok(())
    }
}
