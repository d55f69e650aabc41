//! Unlock-duration evaluator.
//!
//! Decides, once per invocation, whether an alert should be dispatched now.
//! The decision is a pure function of the persisted [`MonitorState`], the
//! current time, and the local hour of day:
//!
//! 1. Monitoring disabled: no alert.
//! 2. Hour outside `[active_start_hour, active_end_hour)`: no alert.
//! 3. Whole hours since the last lock/unlock below the threshold: no alert.
//!    Partial hours are floored, so 4h59m counts as 4.
//! 4. Less than the cooldown since the last successful alert: no alert.
//! 5. Otherwise: alert.
//!
//! The cooldown is compared in milliseconds, so a 30-minute cooldown blocks
//! for exactly 30 minutes.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::clock::{Clock, HOUR_MILLIS};
use crate::store::{MonitorState, SettingsStore, StorageError};

/// Default inclusive start of the active window.
pub const DEFAULT_ACTIVE_START_HOUR: u32 = 8;

/// Default exclusive end of the active window.
pub const DEFAULT_ACTIVE_END_HOUR: u32 = 20;

/// Default whole hours without a lock transition before alerting.
pub const DEFAULT_UNLOCK_THRESHOLD_HOURS: u32 = 5;

/// Default minimum time between successful alerts.
pub const DEFAULT_ALERT_COOLDOWN: Duration = Duration::from_secs(30 * 60);

/// Thresholds that drive the alert decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorPolicy {
    /// First hour of the day (inclusive) in which alerts may fire.
    pub active_start_hour: u32,

    /// Hour of the day (exclusive) at which the active window closes.
    pub active_end_hour: u32,

    /// Whole hours since the last transition that trigger an alert.
    pub unlock_threshold_hours: u32,

    /// Minimum time since the last successful alert.
    pub alert_cooldown: Duration,
}

impl Default for MonitorPolicy {
    fn default() -> Self {
        Self {
            active_start_hour: DEFAULT_ACTIVE_START_HOUR,
            active_end_hour: DEFAULT_ACTIVE_END_HOUR,
            unlock_threshold_hours: DEFAULT_UNLOCK_THRESHOLD_HOURS,
            alert_cooldown: DEFAULT_ALERT_COOLDOWN,
        }
    }
}

impl MonitorPolicy {
    /// Returns `true` if `hour` falls inside the half-open active window.
    #[must_use]
    pub fn is_active_hour(&self, hour: u32) -> bool {
        (self.active_start_hour..self.active_end_hour).contains(&hour)
    }

    fn cooldown_millis(&self) -> i64 {
        i64::try_from(self.alert_cooldown.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Monitoring is switched off.
    Disabled,

    /// The current hour is outside the active window.
    OutsideActiveWindow { hour: u32 },

    /// Not enough whole hours have passed since the last transition.
    BelowThreshold { elapsed_hours: i64 },

    /// The threshold is met but an alert was sent too recently.
    CoolingDown {
        elapsed_hours: i64,
        since_last_alert_millis: i64,
    },

    /// An alert should be dispatched now.
    Trigger { elapsed_hours: i64 },
}

impl Decision {
    #[must_use]
    pub fn should_alert(&self) -> bool {
        matches!(self, Self::Trigger { .. })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "monitoring disabled"),
            Self::OutsideActiveWindow { hour } => {
                write!(f, "hour {hour:02} is outside the active window")
            }
            Self::BelowThreshold { elapsed_hours } => {
                write!(f, "{elapsed_hours}h since last lock transition, below threshold")
            }
            Self::CoolingDown {
                since_last_alert_millis,
                ..
            } => write!(
                f,
                "alert sent {}m ago, still cooling down",
                since_last_alert_millis / 60_000
            ),
            Self::Trigger { elapsed_hours } => {
                write!(f, "{elapsed_hours}h since last lock transition, alerting")
            }
        }
    }
}

/// Applies a [`MonitorPolicy`] to the persisted monitor state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator {
    policy: MonitorPolicy,
}

impl Evaluator {
    #[must_use]
    pub fn new(policy: MonitorPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &MonitorPolicy {
        &self.policy
    }

    /// Decides whether to alert given a state snapshot and the current time.
    #[must_use]
    pub fn evaluate(&self, state: &MonitorState, now_millis: i64, hour: u32) -> Decision {
        if !state.service_enabled {
            return Decision::Disabled;
        }

        if !self.policy.is_active_hour(hour) {
            return Decision::OutsideActiveWindow { hour };
        }

        let elapsed_hours = now_millis
            .saturating_sub(state.last_transition_time)
            .div_euclid(HOUR_MILLIS);
        if elapsed_hours < i64::from(self.policy.unlock_threshold_hours) {
            return Decision::BelowThreshold { elapsed_hours };
        }

        let since_last_alert_millis = now_millis.saturating_sub(state.last_alert_time);
        if since_last_alert_millis < self.policy.cooldown_millis() {
            return Decision::CoolingDown {
                elapsed_hours,
                since_last_alert_millis,
            };
        }

        Decision::Trigger { elapsed_hours }
    }

    /// Reads the persisted state and evaluates it against `clock`.
    ///
    /// # Errors
    ///
    /// Returns the store's error if any monitor key cannot be read.
    pub fn evaluate_now(
        &self,
        settings: &dyn SettingsStore,
        clock: &dyn Clock,
    ) -> Result<Decision, StorageError> {
        let state = MonitorState::load(settings)?;
        Ok(self.evaluate(&state, clock.now_millis(), clock.current_hour()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, MINUTE_MILLIS};
    use crate::store::MemoryStore;
    use crate::types::keys;

    /// An arbitrary "now": 2024-05-01T12:00:00Z.
    const NOW: i64 = 1_714_564_800_000;

    fn state(enabled: bool, transition_ago: i64, alert_ago: i64) -> MonitorState {
        MonitorState {
            service_enabled: enabled,
            last_transition_time: NOW - transition_ago,
            last_alert_time: NOW - alert_ago,
        }
    }

    fn evaluator() -> Evaluator {
        Evaluator::new(MonitorPolicy::default())
    }

    #[test]
    fn disabled_never_triggers() {
        let decision = evaluator().evaluate(&state(false, 100 * HOUR_MILLIS, 100 * HOUR_MILLIS), NOW, 12);
        assert_eq!(decision, Decision::Disabled);
    }

    #[test]
    fn outside_window_never_triggers() {
        let s = state(true, 10 * HOUR_MILLIS, 100 * HOUR_MILLIS);
        for hour in [0, 7, 20, 21, 23] {
            assert_eq!(
                evaluator().evaluate(&s, NOW, hour),
                Decision::OutsideActiveWindow { hour },
                "hour {hour}"
            );
        }
    }

    #[test]
    fn window_is_half_open() {
        let s = state(true, 10 * HOUR_MILLIS, 100 * HOUR_MILLIS);
        assert!(evaluator().evaluate(&s, NOW, 8).should_alert());
        assert!(evaluator().evaluate(&s, NOW, 19).should_alert());
        assert!(!evaluator().evaluate(&s, NOW, 20).should_alert());
    }

    #[test]
    fn partial_hours_are_floored() {
        let just_under = 5 * HOUR_MILLIS - MINUTE_MILLIS;
        let decision = evaluator().evaluate(&state(true, just_under, 100 * HOUR_MILLIS), NOW, 12);
        assert_eq!(decision, Decision::BelowThreshold { elapsed_hours: 4 });
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let decision = evaluator().evaluate(&state(true, 5 * HOUR_MILLIS, 100 * HOUR_MILLIS), NOW, 12);
        assert_eq!(decision, Decision::Trigger { elapsed_hours: 5 });
    }

    #[test]
    fn cooldown_blocks_for_exactly_its_duration() {
        let policy = MonitorPolicy::default();
        let e = Evaluator::new(policy);

        let recent = e.evaluate(&state(true, 6 * HOUR_MILLIS, 29 * MINUTE_MILLIS), NOW, 12);
        assert!(matches!(recent, Decision::CoolingDown { elapsed_hours: 6, .. }));

        let at_boundary = e.evaluate(&state(true, 6 * HOUR_MILLIS, 30 * MINUTE_MILLIS), NOW, 12);
        assert_eq!(at_boundary, Decision::Trigger { elapsed_hours: 6 });
    }

    #[test]
    fn never_alerted_passes_cooldown() {
        let s = MonitorState {
            service_enabled: true,
            last_transition_time: NOW - 6 * HOUR_MILLIS,
            last_alert_time: 0,
        };
        assert!(evaluator().evaluate(&s, NOW, 12).should_alert());
    }

    #[test]
    fn never_recorded_transition_triggers_in_window() {
        let s = MonitorState {
            service_enabled: true,
            last_transition_time: 0,
            last_alert_time: 0,
        };
        assert!(matches!(
            evaluator().evaluate(&s, NOW, 12),
            Decision::Trigger { elapsed_hours } if elapsed_hours > 5
        ));
        assert_eq!(
            evaluator().evaluate(&s, NOW, 21),
            Decision::OutsideActiveWindow { hour: 21 }
        );
    }

    #[test]
    fn transition_in_the_future_does_not_trigger() {
        let s = state(true, -2 * HOUR_MILLIS, 100 * HOUR_MILLIS);
        assert!(matches!(
            evaluator().evaluate(&s, NOW, 12),
            Decision::BelowThreshold { .. }
        ));
    }

    #[test]
    fn custom_policy_is_respected() {
        let e = Evaluator::new(MonitorPolicy {
            active_start_hour: 0,
            active_end_hour: 24,
            unlock_threshold_hours: 1,
            alert_cooldown: Duration::from_secs(0),
        });
        let s = state(true, HOUR_MILLIS, 0);
        assert!(e.evaluate(&s, NOW, 23).should_alert());
    }

    #[test]
    fn evaluate_now_reads_store_and_clock() {
        let store = MemoryStore::new();
        store.set_bool(keys::SERVICE_ENABLED, true).unwrap();
        store
            .set_i64(keys::LAST_TRANSITION_TIME, NOW - 7 * HOUR_MILLIS)
            .unwrap();
        let clock = ManualClock::new(NOW, 10);

        let decision = evaluator().evaluate_now(&store, &clock).unwrap();
        assert_eq!(decision, Decision::Trigger { elapsed_hours: 7 });
    }

    #[test]
    fn decision_display_is_human_readable() {
        assert_eq!(Decision::Disabled.to_string(), "monitoring disabled");
        assert_eq!(
            Decision::OutsideActiveWindow { hour: 7 }.to_string(),
            "hour 07 is outside the active window"
        );
        assert_eq!(
            Decision::CoolingDown {
                elapsed_hours: 6,
                since_last_alert_millis: 10 * MINUTE_MILLIS
            }
            .to_string(),
            "alert sent 10m ago, still cooling down"
        );
    }

    #[test]
    fn decision_serializes_with_tag() {
        let json = serde_json::to_value(Decision::Trigger { elapsed_hours: 5 }).unwrap();
        assert_eq!(json["decision"], "trigger");
        assert_eq!(json["elapsed_hours"], 5);
    }
}
