//! Persistent settings and contact storage.
//!
//! The monitor never touches global state directly: every component receives
//! a [`SettingsStore`] and, where needed, a [`ContactStore`]. Two backends are
//! provided:
//!
//! - [`memory::MemoryStore`]: process-local, used by tests and dry runs
//! - [`file::FileStore`]: directory-backed, used by the daemon and CLI
//!
//! Individual key reads and writes are atomic; there are no cross-key
//! transactions. Each persisted timestamp has exactly one writer.

pub mod file;
pub mod memory;

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::types::{keys, Contact, NewContact, DEFAULT_ALERT_TEMPLATE};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors raised by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backing medium could not be read or written.
    #[error("storage unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted data exists but cannot be decoded.
    #[error("corrupt data in {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    /// A setting key contains characters that cannot be stored.
    #[error("invalid setting key: '{0}'")]
    InvalidKey(String),

    /// A contact failed validation before being stored.
    #[error("invalid contact: {0}")]
    InvalidContact(String),

    /// The in-memory backend's lock was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Key-value store for monitor settings.
///
/// Values are stored as text. The typed helpers fall back to the supplied
/// default when a key is absent or its value does not parse.
pub trait SettingsStore: Send + Sync {
    /// Returns the raw value for `key`, or `None` if it has never been set.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn get_i64(&self, key: &str, default: i64) -> Result<i64, StorageError> {
        Ok(self
            .get(key)?
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(default))
    }

    fn set_i64(&self, key: &str, value: i64) -> Result<(), StorageError> {
        self.set(key, &value.to_string())
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, StorageError> {
        Ok(self
            .get(key)?
            .and_then(|v| v.trim().parse::<bool>().ok())
            .unwrap_or(default))
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), StorageError> {
        self.set(key, if value { "true" } else { "false" })
    }
}

/// Ordered collection of emergency contacts.
pub trait ContactStore: Send + Sync {
    /// Returns every contact in insertion order.
    fn list_contacts(&self) -> Result<Vec<Contact>, StorageError>;

    fn get_contact(&self, id: Uuid) -> Result<Option<Contact>, StorageError>;

    /// Stores a new contact and returns its assigned id.
    fn add_contact(&self, contact: NewContact) -> Result<Uuid, StorageError>;

    /// Replaces the fields of an existing contact. Returns `false` if `id`
    /// is unknown.
    fn update_contact(&self, id: Uuid, contact: NewContact) -> Result<bool, StorageError>;

    /// Removes a contact. Returns `false` if `id` is unknown.
    fn remove_contact(&self, id: Uuid) -> Result<bool, StorageError>;

    fn has_contacts(&self) -> Result<bool, StorageError> {
        Ok(!self.list_contacts()?.is_empty())
    }
}

/// Checks that a contact draft has a name and a phone number.
pub(crate) fn validate_contact(contact: &NewContact) -> Result<(), StorageError> {
    if contact.name.trim().is_empty() {
        return Err(StorageError::InvalidContact(
            "name cannot be empty".to_string(),
        ));
    }
    if contact.phone.trim().is_empty() {
        return Err(StorageError::InvalidContact(
            "phone number cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Point-in-time view of the persisted monitor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorState {
    pub service_enabled: bool,
    pub last_transition_time: i64,
    pub last_alert_time: i64,
}

impl MonitorState {
    /// Reads all three monitor keys, applying the documented defaults.
    pub fn load(store: &dyn SettingsStore) -> Result<Self, StorageError> {
        Ok(Self {
            service_enabled: store.get_bool(keys::SERVICE_ENABLED, false)?,
            last_transition_time: store.get_i64(keys::LAST_TRANSITION_TIME, 0)?,
            last_alert_time: store.get_i64(keys::LAST_ALERT_TIME, 0)?,
        })
    }
}

/// Returns the stored alert template, or the default when none is set.
pub fn alert_template(store: &dyn SettingsStore) -> Result<String, StorageError> {
    Ok(store
        .get(keys::SMS_TEMPLATE)?
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ALERT_TEMPLATE.to_string()))
}
