//! LockWatch Monitor - personal-safety lock monitor.
//!
//! This crate watches device lock/unlock transitions and, when a device has
//! gone too long without one during the active hours of the day, sends a text
//! alert to a list of emergency contacts.
//!
//! # Overview
//!
//! Three pieces cooperate through persisted state:
//!
//! - The [`recorder`] stores the time of every lock or unlock transition.
//! - The [`evaluator`] runs on a timer and decides whether an alert is due,
//!   based on the active window, the time since the last transition and a
//!   cooldown since the last alert.
//! - The [`dispatcher`] sends the alert template to every contact. A single
//!   successful send counts as success, and only then is the alert time
//!   recorded.
//!
//! [`monitor`] ties these together into a check cycle and a cancellable
//! periodic task.
//!
//! # Modules
//!
//! - [`types`]: Lock events, contacts and setting keys
//! - [`clock`]: Wall-clock abstraction
//! - [`store`]: Settings and contact storage (memory and file backends)
//! - [`recorder`]: Lock-state recorder
//! - [`evaluator`]: Unlock-duration evaluator
//! - [`transport`]: Text-message transports (HTTP gateway, dry run, disabled)
//! - [`dispatcher`]: Alert dispatcher
//! - [`monitor`]: Check cycle and periodic scheduling
//! - [`journal`]: Human-readable activity journal
//! - [`config`]: Configuration from environment variables
//! - [`app`]: Component wiring from a configuration
//! - [`error`]: Error types for monitor operations

pub mod app;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod evaluator;
pub mod journal;
pub mod monitor;
pub mod recorder;
pub mod store;
pub mod transport;
pub mod types;

pub use app::{App, TransportMode};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use dispatcher::{AlertDispatcher, DispatchError, DispatchReport, SendFailure};
pub use error::{MonitorError, Result};
pub use evaluator::{Decision, Evaluator, MonitorPolicy};
pub use journal::ActivityJournal;
pub use monitor::{CheckOutcome, MonitorHandle, UnlockMonitor};
pub use recorder::LockRecorder;
pub use store::{ContactStore, FileStore, MemoryStore, MonitorState, SettingsStore, StorageError};
pub use transport::{MessageTransport, TransportError};
pub use types::{Contact, LockEvent, NewContact};
