//! Alert dispatcher.
//!
//! Sends the current alert template to every configured contact:
//!
//! - The transport's capability check runs first; if it fails nothing is sent.
//! - An empty contact list fails with [`DispatchError::EmptyAudience`].
//! - Each contact gets one independent attempt, bounded by the send timeout.
//!   Attempts run concurrently, and one slow or failing contact never stops
//!   the others.
//! - The dispatch succeeds if at least one send succeeded. Failures are
//!   returned as structured [`SendFailure`] records in contact order.
//!
//! The dispatcher does not touch `last_alert_time`; its caller records the
//! alert only when a [`DispatchReport`] comes back.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::journal::ActivityJournal;
use crate::store::{alert_template, ContactStore, SettingsStore, StorageError};
use crate::transport::{MessageTransport, TransportError};
use crate::types::Contact;

/// Default per-contact send timeout.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// A send that did not reach its contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFailure {
    pub contact_id: Uuid,
    pub name: String,
    pub phone: String,
    pub reason: String,
}

/// Result of a dispatch in which at least one contact was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    /// Contacts that received the message.
    pub sent_count: usize,

    /// Contacts the message was attempted for.
    pub attempted: usize,

    /// Contacts that could not be reached, in contact order.
    pub failures: Vec<SendFailure>,
}

/// Reasons a dispatch reached nobody.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The messaging transport cannot be used.
    #[error("messaging capability unavailable: {0}")]
    CapabilityUnavailable(#[source] TransportError),

    /// No contacts are configured.
    #[error("no contacts configured")]
    EmptyAudience,

    /// Every per-contact send failed.
    #[error("failed to send alert to all {} contacts", failures.len())]
    AllSendsFailed { failures: Vec<SendFailure> },

    /// Contacts or the template could not be read.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Sends the alert template to every contact.
pub struct AlertDispatcher {
    transport: Arc<dyn MessageTransport>,
    send_timeout: Duration,
    journal: Option<Arc<ActivityJournal>>,
}

impl AlertDispatcher {
    #[must_use]
    pub fn new(transport: Arc<dyn MessageTransport>) -> Self {
        Self {
            transport,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            journal: None,
        }
    }

    #[must_use]
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    #[must_use]
    pub fn with_journal(mut self, journal: Arc<ActivityJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Sends the current template to all contacts.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError` if the transport is unavailable, there are no
    /// contacts, storage cannot be read, or every send failed.
    pub async fn dispatch(
        &self,
        settings: &dyn SettingsStore,
        contacts: &dyn ContactStore,
    ) -> Result<DispatchReport, DispatchError> {
        self.transport
            .check_available()
            .map_err(DispatchError::CapabilityUnavailable)?;

        let contacts = contacts.list_contacts()?;
        if contacts.is_empty() {
            return Err(DispatchError::EmptyAudience);
        }

        let template = alert_template(settings)?;
        debug!(contacts = contacts.len(), "Dispatching alert");

        let attempts = contacts.iter().map(|contact| {
            let template = template.as_str();
            async move { (contact, self.send_one(contact, template).await) }
        });
        let results = join_all(attempts).await;

        let attempted = results.len();
        let mut sent_count = 0;
        let mut failures = Vec::new();

        for (contact, result) in results {
            match result {
                Ok(()) => {
                    sent_count += 1;
                    info!(name = %contact.name, phone = %contact.phone, "Alert sent");
                    self.journal(
                        "SMS_SENT",
                        &format!("Alert sent to {} ({})", contact.name, contact.phone),
                    );
                }
                Err(e) => {
                    warn!(
                        name = %contact.name,
                        phone = %contact.phone,
                        error = %e,
                        "Failed to send alert"
                    );
                    self.journal(
                        "SMS_FAILED",
                        &format!("Failed to send to {} ({}): {e}", contact.name, contact.phone),
                    );
                    failures.push(SendFailure {
                        contact_id: contact.id,
                        name: contact.name.clone(),
                        phone: contact.phone.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if sent_count == 0 {
            return Err(DispatchError::AllSendsFailed { failures });
        }

        Ok(DispatchReport {
            sent_count,
            attempted,
            failures,
        })
    }

    async fn send_one(&self, contact: &Contact, text: &str) -> Result<(), TransportError> {
        match timeout(self.send_timeout, self.transport.send(&contact.phone, text)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::TimedOut {
                timeout_secs: self.send_timeout.as_secs(),
            }),
        }
    }

    fn journal(&self, kind: &str, details: &str) {
        if let Some(journal) = &self.journal {
            journal.record(kind, details);
        }
    }
}
