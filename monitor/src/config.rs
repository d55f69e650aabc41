//! Configuration module for LockWatch Monitor.
//!
//! This module handles parsing configuration from environment variables.
//! Every variable is optional.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LOCKWATCH_DATA_DIR` | `~/.lockwatch` | Directory for settings, contacts and the activity journal |
//! | `LOCKWATCH_SMS_GATEWAY_URL` | - | SMS gateway base URL (messaging is unavailable when unset) |
//! | `LOCKWATCH_SMS_GATEWAY_TOKEN` | - | Bearer token for the SMS gateway |
//! | `LOCKWATCH_SMS_SENDER` | - | Sender number or ID passed to the gateway |
//! | `LOCKWATCH_ACTIVE_START_HOUR` | 8 | First hour (inclusive) in which alerts may fire, 0-23 |
//! | `LOCKWATCH_ACTIVE_END_HOUR` | 20 | Hour (exclusive) at which the active window closes, 1-24 |
//! | `LOCKWATCH_UNLOCK_THRESHOLD_HOURS` | 5 | Whole hours without a lock transition before alerting |
//! | `LOCKWATCH_ALERT_COOLDOWN_MINS` | 30 | Minimum minutes between successful alerts |
//! | `LOCKWATCH_CHECK_INTERVAL_SECS` | 3600 | Seconds between scheduled checks |
//! | `LOCKWATCH_SEND_TIMEOUT_SECS` | 30 | Per-contact send timeout in seconds |
//!
//! # Example
//!
//! ```no_run
//! use lockwatch_monitor::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Data directory: {}", config.data_dir.display());
//! ```

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use directories::BaseDirs;
use thiserror::Error;

use crate::evaluator::{
    MonitorPolicy, DEFAULT_ACTIVE_END_HOUR, DEFAULT_ACTIVE_START_HOUR,
    DEFAULT_UNLOCK_THRESHOLD_HOURS,
};
use crate::transport::GatewayConfig;

/// Default data directory name relative to home.
const DEFAULT_DATA_DIR: &str = ".lockwatch";

/// Default minutes between successful alerts.
const DEFAULT_ALERT_COOLDOWN_MINS: u64 = 30;

/// Default seconds between scheduled checks.
const DEFAULT_CHECK_INTERVAL_SECS: u64 = 3600;

/// Default per-contact send timeout.
const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,
}

/// Configuration for the LockWatch Monitor.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `settings/`, `contacts.json` and `lockwatch.log`.
    pub data_dir: PathBuf,

    /// SMS gateway settings. `None` means messaging is unavailable.
    pub gateway: Option<GatewayConfig>,

    /// Inclusive start of the active window.
    pub active_start_hour: u32,

    /// Exclusive end of the active window.
    pub active_end_hour: u32,

    /// Whole hours without a transition that trigger an alert.
    pub unlock_threshold_hours: u32,

    /// Minimum time between successful alerts.
    pub alert_cooldown: Duration,

    /// Period of the scheduled check.
    pub check_interval: Duration,

    /// Upper bound on a single contact's send.
    pub send_timeout: Duration,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - A numeric variable is set but cannot be parsed or is out of range
    /// - `LOCKWATCH_ACTIVE_END_HOUR` is not greater than `LOCKWATCH_ACTIVE_START_HOUR`
    /// - `LOCKWATCH_DATA_DIR` is unset and the home directory cannot be determined
    pub fn from_env() -> Result<Self, ConfigError> {
        // Optional: LOCKWATCH_DATA_DIR (default: ~/.lockwatch)
        let data_dir = match non_empty_var("LOCKWATCH_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => BaseDirs::new()
                .ok_or(ConfigError::NoHomeDirectory)?
                .home_dir()
                .join(DEFAULT_DATA_DIR),
        };

        // Per-contact send timeout, also the gateway's HTTP request timeout
        let send_timeout_secs = parse_var(
            "LOCKWATCH_SEND_TIMEOUT_SECS",
            DEFAULT_SEND_TIMEOUT_SECS,
            "positive integer",
        )?;
        if send_timeout_secs == 0 {
            return Err(invalid(
                "LOCKWATCH_SEND_TIMEOUT_SECS",
                "send timeout must be at least 1 second".to_string(),
            ));
        }
        let send_timeout = Duration::from_secs(send_timeout_secs);

        // Optional: gateway (enabled if LOCKWATCH_SMS_GATEWAY_URL is set)
        let gateway = non_empty_var("LOCKWATCH_SMS_GATEWAY_URL").map(|url| {
            GatewayConfig::new(url)
                .with_token(non_empty_var("LOCKWATCH_SMS_GATEWAY_TOKEN"))
                .with_sender(non_empty_var("LOCKWATCH_SMS_SENDER"))
                .with_request_timeout(send_timeout)
        });

        // Active window: start in 0-23, end in 1-24, start < end
        let active_start_hour = parse_var(
            "LOCKWATCH_ACTIVE_START_HOUR",
            DEFAULT_ACTIVE_START_HOUR,
            "hour 0-23",
        )?;
        if active_start_hour > 23 {
            return Err(invalid(
                "LOCKWATCH_ACTIVE_START_HOUR",
                format!("start hour must be between 0 and 23, got {active_start_hour}"),
            ));
        }

        let active_end_hour =
            parse_var("LOCKWATCH_ACTIVE_END_HOUR", DEFAULT_ACTIVE_END_HOUR, "hour 1-24")?;
        if !(1..=24).contains(&active_end_hour) {
            return Err(invalid(
                "LOCKWATCH_ACTIVE_END_HOUR",
                format!("end hour must be between 1 and 24, got {active_end_hour}"),
            ));
        }
        if active_end_hour <= active_start_hour {
            return Err(invalid(
                "LOCKWATCH_ACTIVE_END_HOUR",
                format!(
                    "end hour ({active_end_hour}) must be greater than start hour ({active_start_hour})"
                ),
            ));
        }

        let unlock_threshold_hours = parse_var(
            "LOCKWATCH_UNLOCK_THRESHOLD_HOURS",
            DEFAULT_UNLOCK_THRESHOLD_HOURS,
            "positive integer",
        )?;
        if unlock_threshold_hours == 0 {
            return Err(invalid(
                "LOCKWATCH_UNLOCK_THRESHOLD_HOURS",
                "threshold must be at least 1 hour".to_string(),
            ));
        }

        let cooldown_mins = parse_var(
            "LOCKWATCH_ALERT_COOLDOWN_MINS",
            DEFAULT_ALERT_COOLDOWN_MINS,
            "non-negative integer",
        )?;

        let check_interval_secs = parse_var(
            "LOCKWATCH_CHECK_INTERVAL_SECS",
            DEFAULT_CHECK_INTERVAL_SECS,
            "positive integer",
        )?;
        if check_interval_secs == 0 {
            return Err(invalid(
                "LOCKWATCH_CHECK_INTERVAL_SECS",
                "check interval must be at least 1 second".to_string(),
            ));
        }

        Ok(Self {
            data_dir,
            gateway,
            active_start_hour,
            active_end_hour,
            unlock_threshold_hours,
            alert_cooldown: Duration::from_secs(cooldown_mins.saturating_mul(60)),
            check_interval: Duration::from_secs(check_interval_secs),
            send_timeout,
        })
    }

    /// Returns the alert policy described by this configuration.
    #[must_use]
    pub fn policy(&self) -> MonitorPolicy {
        MonitorPolicy {
            active_start_hour: self.active_start_hour,
            active_end_hour: self.active_end_hour,
            unlock_threshold_hours: self.unlock_threshold_hours,
            alert_cooldown: self.alert_cooldown,
        }
    }
}

/// Reads a variable, treating an empty or whitespace-only value as unset.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses an optional variable, returning `default` when it is unset.
fn parse_var<T: FromStr>(key: &str, default: T, expected: &str) -> Result<T, ConfigError> {
    match non_empty_var(key) {
        Some(val) => val
            .parse::<T>()
            .map_err(|_| invalid(key, format!("expected {expected}, got '{val}'"))),
        None => Ok(default),
    }
}

fn invalid(key: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    }
}
