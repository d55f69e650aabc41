//! HTTP SMS gateway client.
//!
//! Sends each message as one JSON POST to `<gateway_url>/messages`:
//!
//! ```json
//! {"to": "+15550100", "body": "...", "from": "LockWatch"}
//! ```
//!
//! `from` is omitted when no sender is configured. When a token is set it is
//! sent as `Authorization: Bearer <token>`.
//!
//! Status mapping:
//!
//! | Response | Result |
//! |----------|--------|
//! | 2xx | `Ok(())` |
//! | 401, 403 | [`TransportError::AuthFailed`] |
//! | 429 | [`TransportError::RateLimited`] (from `Retry-After`, default 60s) |
//! | other | [`TransportError::Rejected`] |
//!
//! # Example
//!
//! ```no_run
//! use lockwatch_monitor::transport::{GatewayConfig, HttpSmsGateway, MessageTransport};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = GatewayConfig::new("https://sms.example.com/v1".to_string());
//!     let gateway = HttpSmsGateway::new(config).unwrap();
//!     gateway.send("+15550100", "Are you OK?").await.unwrap();
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use super::{MessageTransport, TransportError};

/// HTTP request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Reported wait when a 429 carries no usable `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Connection settings for the SMS gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway base URL (e.g., `https://sms.example.com/v1`).
    pub url: String,

    /// Optional bearer token.
    pub token: Option<String>,

    /// Optional sender number or alphanumeric ID.
    pub sender: Option<String>,

    /// Timeout applied to each HTTP request.
    pub request_timeout: Duration,
}

impl GatewayConfig {
    /// Creates a configuration with no credentials and the default timeout.
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            url,
            token: None,
            sender: None,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn with_sender(mut self, sender: Option<String>) -> Self {
        self.sender = sender;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    to: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a str>,
}

/// Delivers text messages through an HTTP SMS gateway.
#[derive(Debug, Clone)]
pub struct HttpSmsGateway {
    endpoint: String,
    sender: Option<String>,
    client: Client,
}

impl HttpSmsGateway {
    /// Builds a gateway client.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidConfiguration` if the URL is empty or
    /// the token cannot be used as a header value, and `TransportError::Http`
    /// if the HTTP client cannot be constructed.
    pub fn new(config: GatewayConfig) -> Result<Self, TransportError> {
        let base = config.url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(TransportError::InvalidConfiguration(
                "gateway URL cannot be empty".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                TransportError::InvalidConfiguration(
                    "gateway token contains invalid characters".to_string(),
                )
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(5)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            endpoint: format!("{base}/messages"),
            sender: config.sender,
            client,
        })
    }

    /// Returns the URL messages are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn parse_retry_after(response: &reqwest::Response) -> u64 {
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
    }
}

#[async_trait]
impl MessageTransport for HttpSmsGateway {
    fn check_available(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(&self, phone: &str, text: &str) -> Result<(), TransportError> {
        let message = OutboundMessage {
            to: phone,
            body: text,
            from: self.sender.as_deref(),
        };

        debug!(url = %self.endpoint, phone, "Posting message to SMS gateway");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&message)
            .send()
            .await?;
        let status = response.status();

        match status {
            _ if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(status = status.as_u16(), "SMS gateway rejected credentials");
                Err(TransportError::AuthFailed)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = Self::parse_retry_after(&response);
                warn!(retry_after_secs, "Rate limited by SMS gateway");
                Err(TransportError::RateLimited { retry_after_secs })
            }
            _ => {
                let message = response.text().await.unwrap_or_default();
                Err(TransportError::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}
