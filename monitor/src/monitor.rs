//! Unlock monitor: one check cycle and the periodic task that drives it.
//!
//! A check cycle evaluates the persisted state, dispatches an alert when the
//! evaluator says so, and records `last_alert_time` only when at least one
//! contact was reached. Every failure stays inside its cycle; the periodic
//! task keeps running and retries on the next tick.
//!
//! # Scheduling
//!
//! [`UnlockMonitor::start`] runs one check immediately, then spawns a task
//! that checks again every interval, starting one interval later. The
//! returned [`MonitorHandle`] stops the task or restarts it, which runs a
//! fresh immediate check and resets the timer. Persisted timestamps are never
//! reset by a restart.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::dispatcher::{AlertDispatcher, DispatchError, DispatchReport};
use crate::evaluator::{Decision, Evaluator};
use crate::journal::ActivityJournal;
use crate::store::{ContactStore, SettingsStore, StorageError};
use crate::types::keys;

/// Shortest period the scheduler accepts.
const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(1);

/// Result of one check cycle.
#[derive(Debug)]
pub enum CheckOutcome {
    /// The evaluator decided not to alert.
    NotTriggered(Decision),

    /// An alert reached at least one contact and was recorded.
    Alerted(DispatchReport),

    /// An alert was due but reached nobody.
    AlertFailed(DispatchError),

    /// Persisted state could not be read; the cycle was skipped.
    Skipped(StorageError),
}

impl CheckOutcome {
    #[must_use]
    pub fn is_alerted(&self) -> bool {
        matches!(self, Self::Alerted(_))
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotTriggered(decision) => write!(f, "no alert: {decision}"),
            Self::Alerted(report) => write!(
                f,
                "alert sent to {} of {} contacts",
                report.sent_count, report.attempted
            ),
            Self::AlertFailed(e) => write!(f, "alert failed: {e}"),
            Self::Skipped(e) => write!(f, "check skipped: {e}"),
        }
    }
}

/// Ties the evaluator and dispatcher to the stores and clock.
pub struct UnlockMonitor {
    settings: Arc<dyn SettingsStore>,
    contacts: Arc<dyn ContactStore>,
    clock: Arc<dyn Clock>,
    evaluator: Evaluator,
    dispatcher: AlertDispatcher,
    journal: Option<Arc<ActivityJournal>>,
}

impl UnlockMonitor {
    #[must_use]
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        contacts: Arc<dyn ContactStore>,
        clock: Arc<dyn Clock>,
        evaluator: Evaluator,
        dispatcher: AlertDispatcher,
    ) -> Self {
        Self {
            settings,
            contacts,
            clock,
            evaluator,
            dispatcher,
            journal: None,
        }
    }

    #[must_use]
    pub fn with_journal(mut self, journal: Arc<ActivityJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    #[must_use]
    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Runs one evaluate-dispatch-record cycle.
    pub async fn run_check(&self) -> CheckOutcome {
        let decision = match self
            .evaluator
            .evaluate_now(self.settings.as_ref(), self.clock.as_ref())
        {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "Skipping unlock check, state unavailable");
                self.journal("CHECK", &format!("Skipped: {e}"));
                return CheckOutcome::Skipped(e);
            }
        };

        debug!(%decision, "Unlock check evaluated");

        let Decision::Trigger { elapsed_hours } = decision else {
            if decision != Decision::Disabled {
                self.journal("CHECK", &decision.to_string());
            }
            return CheckOutcome::NotTriggered(decision);
        };

        info!(elapsed_hours, "No lock transition within threshold, sending alert");
        self.journal(
            "ALERT",
            &format!("No lock transition for {elapsed_hours} hours, sending alert"),
        );

        match self
            .dispatcher
            .dispatch(self.settings.as_ref(), self.contacts.as_ref())
            .await
        {
            Ok(report) => {
                self.record_alert_time();
                info!(
                    sent = report.sent_count,
                    failed = report.failures.len(),
                    "Alert dispatched"
                );
                self.journal(
                    "ALERT",
                    &format!(
                        "Alert sent to {} of {} contacts",
                        report.sent_count, report.attempted
                    ),
                );
                CheckOutcome::Alerted(report)
            }
            Err(DispatchError::Storage(e)) => {
                warn!(error = %e, "Skipping alert, contacts or template unavailable");
                self.journal("CHECK", &format!("Skipped: {e}"));
                CheckOutcome::Skipped(e)
            }
            Err(e) => {
                error!(error = %e, "Alert dispatch failed");
                self.journal("ALERT", &format!("Alert failed: {e}"));
                CheckOutcome::AlertFailed(e)
            }
        }
    }

    /// Sends the alert template to all contacts immediately.
    ///
    /// Bypasses the evaluator and leaves `last_alert_time` untouched.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher's error when nobody could be reached.
    pub async fn send_test_alert(&self) -> Result<DispatchReport, DispatchError> {
        let result = self
            .dispatcher
            .dispatch(self.settings.as_ref(), self.contacts.as_ref())
            .await;

        match &result {
            Ok(report) => self.journal(
                "TEST_SMS",
                &format!(
                    "Test alert sent to {} of {} contacts",
                    report.sent_count, report.attempted
                ),
            ),
            Err(e) => self.journal("TEST_SMS", &format!("Test alert failed: {e}")),
        }
        result
    }

    /// Runs one check now and then every `interval` until stopped.
    pub async fn start(self: Arc<Self>, interval: Duration) -> MonitorHandle {
        let interval = interval.max(MIN_CHECK_INTERVAL);

        info!(interval_secs = interval.as_secs(), "Unlock monitor started");
        self.journal(
            "SERVICE",
            &format!("Monitor started, checking every {}s", interval.as_secs()),
        );

        let outcome = self.run_check().await;
        debug!(%outcome, "Initial unlock check complete");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(Self::run_periodic(self.clone(), interval, shutdown_rx));

        MonitorHandle {
            monitor: self,
            interval,
            shutdown_tx,
            task,
        }
    }

    async fn run_periodic(
        monitor: Arc<Self>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = monitor.run_check().await;
                    debug!(%outcome, "Scheduled unlock check complete");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Writes `max(previous, now)` so the alert time never moves backwards.
    fn record_alert_time(&self) {
        let now = self.clock.now_millis();
        let result = self
            .settings
            .get_i64(keys::LAST_ALERT_TIME, 0)
            .and_then(|previous| self.settings.set_i64(keys::LAST_ALERT_TIME, previous.max(now)));

        if let Err(e) = result {
            warn!(error = %e, "Alert sent but failed to record alert time");
        }
    }

    fn journal(&self, kind: &str, details: &str) {
        if let Some(journal) = &self.journal {
            journal.record(kind, details);
        }
    }
}

/// Handle to a running periodic monitor task.
pub struct MonitorHandle {
    monitor: Arc<UnlockMonitor>,
    interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancels the periodic task and waits for it to exit.
    ///
    /// A check already in progress runs to completion first.
    pub async fn stop(self) -> Arc<UnlockMonitor> {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Monitor task ended abnormally");
        }

        info!("Unlock monitor stopped");
        self.monitor.journal("SERVICE", "Monitor stopped");
        self.monitor
    }

    /// Stops the task, then starts it again with an immediate check.
    pub async fn restart(self) -> Self {
        let interval = self.interval;
        let monitor = self.stop().await;
        monitor.start(interval).await
    }
}
