//! Human-readable activity journal.
//!
//! Every lock transition, check, alert, and per-contact send result is
//! appended as one line to `<data_dir>/lockwatch.log`:
//!
//! ```text
//! [2024-05-01 14:03:11] SMS_SENT: Alert sent to Alice (+15550100)
//! ```
//!
//! The file is capped: before an append, a file larger than
//! [`MAX_JOURNAL_BYTES`] is rewritten to hold only its last
//! [`RETAINED_LINES`] lines.
//!
//! Journal writes are best-effort. [`ActivityJournal::record`] logs failures
//! through `tracing` and never returns an error to the caller.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use thiserror::Error;
use tracing::warn;

/// Journal filename inside the data directory.
pub const JOURNAL_FILE: &str = "lockwatch.log";

/// Size above which the journal is trimmed (1 MiB).
pub const MAX_JOURNAL_BYTES: u64 = 1024 * 1024;

/// Lines kept when the journal is trimmed.
pub const RETAINED_LINES: usize = 1000;

/// Timestamp format for journal lines.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors that can occur while reading or writing the journal.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("journal I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("journal lock poisoned")]
    Poisoned,
}

/// Append-only, size-capped text journal.
#[derive(Debug)]
pub struct ActivityJournal {
    path: PathBuf,
    max_bytes: u64,
    retained_lines: usize,
    write_lock: Mutex<()>,
}

impl ActivityJournal {
    /// Opens the journal in `data_dir` with the default size cap.
    #[must_use]
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::with_limits(data_dir.join(JOURNAL_FILE), MAX_JOURNAL_BYTES, RETAINED_LINES)
    }

    /// Opens a journal at `path` that trims to `retained_lines` once it
    /// exceeds `max_bytes`.
    #[must_use]
    pub fn with_limits(path: PathBuf, max_bytes: u64, retained_lines: usize) -> Self {
        Self {
            path,
            max_bytes,
            retained_lines,
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends an entry, logging instead of failing if the write is refused.
    pub fn record(&self, kind: &str, details: &str) {
        if let Err(e) = self.try_record(kind, details) {
            warn!(error = %e, kind, "Failed to write journal entry");
        }
    }

    /// Appends an entry, trimming the file first if it has grown too large.
    ///
    /// # Errors
    ///
    /// Returns `JournalError::Io` if the directory or file cannot be written.
    pub fn try_record(&self, kind: &str, details: &str) -> Result<(), JournalError> {
        let _guard = self.write_lock.lock().map_err(|_| JournalError::Poisoned)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        self.trim_if_oversized()?;

        let timestamp = Local::now().format(TIMESTAMP_FORMAT);
        let line = format!("[{timestamp}] {kind}: {details}\n");

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| self.io_error(e))
    }

    /// Returns every journal line, oldest first. A missing journal is empty.
    /// Damaged bytes are replaced with U+FFFD rather than failing the read.
    ///
    /// # Errors
    ///
    /// Returns `JournalError::Io` if the file exists but cannot be read.
    pub fn entries(&self) -> Result<Vec<String>, JournalError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Deletes the journal file.
    ///
    /// # Errors
    ///
    /// Returns `JournalError::Io` if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), JournalError> {
        let _guard = self.write_lock.lock().map_err(|_| JournalError::Poisoned)?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn trim_if_oversized(&self) -> Result<(), JournalError> {
        let len = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(self.io_error(e)),
        };
        if len <= self.max_bytes {
            return Ok(());
        }

        let bytes = fs::read(&self.path).map_err(|e| self.io_error(e))?;
        let contents = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = contents.lines().collect();
        let keep_from = lines.len().saturating_sub(self.retained_lines);

        let mut trimmed = lines[keep_from..].join("\n");
        if !trimmed.is_empty() {
            trimmed.push('\n');
        }
        fs::write(&self.path, trimmed).map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: std::io::Error) -> JournalError {
        JournalError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn record_appends_formatted_lines() {
        let dir = TempDir::new().unwrap();
        let journal = ActivityJournal::in_dir(dir.path());

        journal.record("LOCK", "Device locked");
        journal.record("UNLOCK", "Device unlocked");

        let entries = journal.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].starts_with('['));
        assert!(entries[0].ends_with("] LOCK: Device locked"));
        assert!(entries[1].ends_with("] UNLOCK: Device unlocked"));
    }

    #[test]
    fn timestamp_has_expected_shape() {
        let dir = TempDir::new().unwrap();
        let journal = ActivityJournal::in_dir(dir.path());
        journal.record("CHECK", "x");

        let line = &journal.entries().unwrap()[0];
        // "[YYYY-MM-DD HH:MM:SS]"
        assert_eq!(&line[20..21], "]");
        assert_eq!(&line[5..6], "-");
        assert_eq!(&line[11..12], " ");
    }

    #[test]
    fn missing_journal_has_no_entries() {
        let dir = TempDir::new().unwrap();
        let journal = ActivityJournal::in_dir(dir.path());
        assert!(journal.entries().unwrap().is_empty());
    }

    #[test]
    fn clear_removes_entries_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let journal = ActivityJournal::in_dir(dir.path());
        journal.record("SERVICE", "started");

        journal.clear().unwrap();
        assert!(journal.entries().unwrap().is_empty());
        journal.clear().unwrap();
    }

    #[test]
    fn oversized_journal_keeps_only_recent_lines() {
        let dir = TempDir::new().unwrap();
        let journal = ActivityJournal::with_limits(dir.path().join("small.log"), 200, 3);

        for i in 0..20 {
            journal.record("CHECK", &format!("entry {i}"));
        }

        let entries = journal.entries().unwrap();
        assert!(entries.len() < 20, "journal should have been trimmed");
        assert!(entries.last().unwrap().ends_with("entry 19"));

        let size = fs::metadata(journal.path()).unwrap().len();
        // At most one append past the cap before the next trim.
        assert!(size <= 200 + 64, "journal grew to {size} bytes");
    }

    #[test]
    fn damaged_bytes_do_not_block_trim_or_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("damaged.log");
        let mut seed = b"[2024-05-01 12:00:00] SMS_SENT: Alert sent to \xe4\xbd".to_vec();
        seed.extend(std::iter::repeat(b'x').take(300));
        seed.push(b'\n');
        fs::write(&path, &seed).unwrap();

        let journal = ActivityJournal::with_limits(path, 200, 5);
        journal.try_record("CHECK", "after damage").unwrap();

        let entries = journal.entries().unwrap();
        assert!(entries[0].contains('\u{FFFD}'));
        assert!(entries.last().unwrap().ends_with("CHECK: after damage"));
    }

    #[test]
    fn record_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let journal = ActivityJournal::in_dir(&nested);

        journal.try_record("SERVICE", "started").unwrap();
        assert!(nested.join(JOURNAL_FILE).exists());
    }

    #[test]
    fn record_swallows_write_failures() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let journal = ActivityJournal::in_dir(&blocker);
        journal.record("SERVICE", "started");
        assert!(journal.try_record("SERVICE", "started").is_err());
    }
}
