//! Error types for the LockWatch Monitor.
//!
//! Each component defines its own error enum next to the code that raises
//! it. [`MonitorError`] covers the failures of wiring components together in
//! [`crate::app`]: creating the data directory and building the transport.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors that can occur while assembling the monitor.
///
/// # Examples
///
/// ```ignore
/// use lockwatch_monitor::error::Result;
///
/// fn prepare(dir: &Path) -> Result<()> {
///     std::fs::create_dir_all(dir)?;
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum MonitorError {
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The messaging transport could not be built.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// A specialized `Result` type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
