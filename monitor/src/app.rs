//! Component wiring.
//!
//! Builds the file store, journal, transport, recorder and monitor described
//! by a [`Config`], so the binary and integration tests assemble them the
//! same way.

use std::fs;
use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::SystemClock;
use crate::config::Config;
use crate::dispatcher::AlertDispatcher;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::journal::ActivityJournal;
use crate::monitor::UnlockMonitor;
use crate::recorder::LockRecorder;
use crate::store::FileStore;
use crate::transport::{DisabledTransport, DryRunTransport, HttpSmsGateway, MessageTransport};

/// Reason reported when no gateway is configured.
const NO_GATEWAY_REASON: &str = "no SMS gateway configured (set LOCKWATCH_SMS_GATEWAY_URL)";

/// How alerts leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// Use the configured gateway, or report messaging as unavailable.
    #[default]
    Live,

    /// Log messages instead of sending them.
    DryRun,
}

/// Fully wired monitor components sharing one data directory.
pub struct App {
    pub config: Config,
    pub store: Arc<FileStore>,
    pub journal: Arc<ActivityJournal>,
    pub recorder: LockRecorder,
    pub monitor: Arc<UnlockMonitor>,
}

impl App {
    /// Opens the data directory and builds every component.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Io` if the data directory cannot be created and
    /// `MonitorError::Transport` if the gateway client cannot be built.
    pub fn open(config: Config, mode: TransportMode) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let store = Arc::new(FileStore::new(config.data_dir.clone()));
        let journal = Arc::new(ActivityJournal::in_dir(&config.data_dir));
        let transport = build_transport(&config, mode)?;

        let dispatcher = AlertDispatcher::new(transport)
            .with_send_timeout(config.send_timeout)
            .with_journal(journal.clone());

        let monitor = UnlockMonitor::new(
            store.clone(),
            store.clone(),
            Arc::new(SystemClock),
            Evaluator::new(config.policy()),
            dispatcher,
        )
        .with_journal(journal.clone());

        let recorder = LockRecorder::new(store.clone()).with_journal(journal.clone());

        info!(data_dir = %config.data_dir.display(), ?mode, "Components initialized");

        Ok(Self {
            config,
            store,
            journal,
            recorder,
            monitor: Arc::new(monitor),
        })
    }
}

/// Selects the transport for `mode`.
///
/// # Errors
///
/// Returns `MonitorError::Transport` if the configured gateway is unusable.
pub fn build_transport(config: &Config, mode: TransportMode) -> Result<Arc<dyn MessageTransport>> {
    if mode == TransportMode::DryRun {
        return Ok(Arc::new(DryRunTransport));
    }

    match &config.gateway {
        Some(gateway) => {
            let client = HttpSmsGateway::new(gateway.clone())?;
            info!(endpoint = %client.endpoint(), "SMS gateway configured");
            Ok(Arc::new(client))
        }
        None => {
            warn!("No SMS gateway configured, alerts cannot be sent");
            Ok(Arc::new(DisabledTransport::new(NO_GATEWAY_REASON)))
        }
    }
}
