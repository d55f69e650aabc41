//! Outbound text-message transports.
//!
//! A [`MessageTransport`] exposes two operations: a capability check that
//! must pass before any message is attempted, and a single send attempt to
//! one phone number. Transports never retry; the dispatcher decides what a
//! failure means for the alert as a whole.
//!
//! - [`http::HttpSmsGateway`]: delivers through an HTTP/JSON SMS gateway
//! - [`DisabledTransport`]: always unavailable (no gateway configured)
//! - [`DryRunTransport`]: logs messages instead of sending them

pub mod http;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub use http::{GatewayConfig, HttpSmsGateway};

/// Errors a transport can report.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The transport cannot be used at all right now.
    #[error("messaging unavailable: {0}")]
    Unavailable(String),

    /// Network or protocol failure before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway refused our credentials (401/403).
    #[error("authentication failed: gateway rejected credentials")]
    AuthFailed,

    /// The gateway is throttling requests (429).
    #[error("rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// The gateway returned any other non-success status.
    #[error("gateway rejected message: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// The send did not complete within the configured timeout.
    #[error("send timed out after {timeout_secs} seconds")]
    TimedOut { timeout_secs: u64 },

    /// The configured gateway URL or header values are unusable.
    #[error("invalid gateway configuration: {0}")]
    InvalidConfiguration(String),
}

/// A channel capable of delivering a text message to a phone number.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Verifies that messages can be sent at all.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Unavailable` if the capability is missing.
    fn check_available(&self) -> Result<(), TransportError>;

    /// Makes one attempt to deliver `text` to `phone`.
    async fn send(&self, phone: &str, text: &str) -> Result<(), TransportError>;
}

/// Transport used when no delivery channel is configured.
#[derive(Debug, Clone)]
pub struct DisabledTransport {
    reason: String,
}

impl DisabledTransport {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl MessageTransport for DisabledTransport {
    fn check_available(&self) -> Result<(), TransportError> {
        Err(TransportError::Unavailable(self.reason.clone()))
    }

    async fn send(&self, _phone: &str, _text: &str) -> Result<(), TransportError> {
        Err(TransportError::Unavailable(self.reason.clone()))
    }
}

/// Transport that only logs what it would have sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunTransport;

#[async_trait]
impl MessageTransport for DryRunTransport {
    fn check_available(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(&self, phone: &str, text: &str) -> Result<(), TransportError> {
        info!(phone, chars = text.chars().count(), "Dry run: message not sent");
        Ok(())
    }
}
