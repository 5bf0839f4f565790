//! Connection lifecycle - lazy open, liveness probing, bounded reconnect
//!
//! The manager owns the process's administrative/read handle. It is not
//! safe for concurrent callers; loader workers open their own connections.

use crate::{Error, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fixed sleep between reconnect attempts
pub const RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Owns the shared connection handle to the database file.
///
/// The handle starts absent and is established on the first call to
/// [`ensure_live`](ConnectionManager::ensure_live). A handle that stops
/// answering the liveness probe is dropped and reopened.
pub struct ConnectionManager {
    path: PathBuf,
    conn: Option<Connection>,
    retry_interval: Duration,
}

impl ConnectionManager {
    /// Create a manager for the database at `path`. Does not open anything.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            conn: None,
            retry_interval: RETRY_INTERVAL,
        }
    }

    /// Override the sleep between reconnect attempts
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the database file and store the handle.
    ///
    /// Opening a file-backed handle can succeed even when the file is
    /// unusable until first access, so this does not probe; callers that
    /// need a verified handle go through `ensure_live`.
    pub fn open(&mut self) -> Result<()> {
        let conn = Connection::open(&self.path).map_err(|source| Error::OpenFailed {
            path: self.path.display().to_string(),
            source,
        })?;
        self.conn = Some(conn);
        Ok(())
    }

    /// Verify the handle is live, reconnecting up to `max_attempts` times.
    ///
    /// Each attempt probes the existing handle if there is one, otherwise
    /// opens a fresh handle and probes it before trusting it. A fixed
    /// interval elapses between attempts. On exhaustion the error carries
    /// the attempt count and the time we gave up.
    pub fn ensure_live(&mut self, max_attempts: u32) -> Result<()> {
        for attempt in 1..=max_attempts {
            if let Some(conn) = &self.conn {
                match probe(conn) {
                    Ok(()) => return Ok(()),
                    Err(err) => {
                        tracing::warn!(attempt, error = %err, "liveness probe failed, dropping handle");
                        self.conn = None;
                    }
                }
            }

            match self.open() {
                Ok(()) => {
                    // Probe the fresh handle too: a file-backed open succeeds
                    // against an unreadable file until first use.
                    if let Some(conn) = &self.conn {
                        match probe(conn) {
                            Ok(()) => return Ok(()),
                            Err(err) => {
                                tracing::warn!(attempt, error = %err, "fresh handle failed probe");
                                self.conn = None;
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "database open failed");
                }
            }

            if attempt < max_attempts {
                std::thread::sleep(self.retry_interval);
            }
        }

        Err(Error::Timeout {
            attempts: max_attempts,
            timestamp: chrono::Utc::now(),
        })
    }

    /// Access the live handle. Call after a successful `ensure_live`.
    pub fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::NotConnected)
    }
}

/// Lightweight round-trip check that the handle still talks to the backend
fn probe(conn: &Connection) -> rusqlite::Result<()> {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .map(|_| ())
}
