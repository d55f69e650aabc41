//! Core domain types for LockWatch.
//!
//! This module defines the lock-state events delivered by the host environment,
//! the emergency contact record, and the persisted setting keys shared by the
//! recorder, evaluator, and dispatcher.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default alert text used when no template has been stored.
pub const DEFAULT_ALERT_TEMPLATE: &str =
    "[LockWatch] The user has not unlocked their phone for 5 hours. Please check that they are safe.";

/// Keys of the persisted monitor state.
pub mod keys {
    /// Whether the evaluator runs its decision logic at all.
    pub const SERVICE_ENABLED: &str = "service_enabled";

    /// Milliseconds since epoch of the most recent lock or unlock.
    pub const LAST_TRANSITION_TIME: &str = "last_transition_time";

    /// Milliseconds since epoch of the last successful alert dispatch.
    pub const LAST_ALERT_TIME: &str = "last_alert_time";

    /// Alert message text.
    pub const SMS_TEMPLATE: &str = "sms_template";
}

/// A lock-state transition reported by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockEvent {
    Locked,
    Unlocked,
}

impl LockEvent {
    /// Returns the journal kind used for this event.
    #[must_use]
    pub fn journal_kind(self) -> &'static str {
        match self {
            Self::Locked => "LOCK",
            Self::Unlocked => "UNLOCK",
        }
    }
}

impl fmt::Display for LockEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "locked"),
            Self::Unlocked => write!(f, "unlocked"),
        }
    }
}

/// Error returned when a line cannot be parsed as a [`LockEvent`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized lock event: '{0}' (expected 'locked' or 'unlocked')")]
pub struct ParseLockEventError(pub String);

impl FromStr for LockEvent {
    type Err = ParseLockEventError;

    /// Parses `locked`/`lock` and `unlocked`/`unlock`, ignoring case and
    /// surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "locked" | "lock" => Ok(Self::Locked),
            "unlocked" | "unlock" => Ok(Self::Unlocked),
            _ => Err(ParseLockEventError(s.trim().to_string())),
        }
    }
}

/// An emergency contact that receives alert messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Opaque identifier assigned by the contact store.
    pub id: Uuid,

    /// Display name.
    pub name: String,

    /// Phone number the alert is sent to.
    pub phone: String,

    /// Whether this is the user's primary contact.
    #[serde(default)]
    pub is_default: bool,
}

/// Fields supplied when creating or updating a contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub name: String,
    pub phone: String,
    pub is_default: bool,
}

impl NewContact {
    /// Creates a contact draft, trimming surrounding whitespace.
    #[must_use]
    pub fn new(name: impl Into<String>, phone: impl Into<String>, is_default: bool) -> Self {
        Self {
            name: name.into().trim().to_string(),
            phone: phone.into().trim().to_string(),
            is_default,
        }
    }

    /// Converts the draft into a stored contact with the given id.
    #[must_use]
    pub fn into_contact(self, id: Uuid) -> Contact {
        Contact {
            id,
            name: self.name,
            phone: self.phone,
            is_default: self.is_default,
        }
    }
}
