//! Rotating plain-text diagnostic log, one line per translated hook event.
//! Append-only, reset at each process start; write failures are swallowed,
//! the log must never take the router down.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

const MAX_LOG_BYTES: u64 = 1024 * 1024;

pub struct HookLog {
    path: PathBuf,
}

impl HookLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Truncate the log, discarding lines from a previous run.
    pub fn reset(&self) {
        if let Err(e) = std::fs::write(&self.path, b"") {
            debug!("hook log reset failed: {}", e);
        }
    }

    /// Append one timestamped line. Oversized logs are truncated first.
    pub fn append(&self, line: &str) {
        self.rotate_if_oversized();
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "[{}] {}", Utc::now().to_rfc3339(), line));
        if let Err(e) = result {
            debug!("hook log append failed: {}", e);
        }
    }

    fn rotate_if_oversized(&self) {
        let oversized = std::fs::metadata(&self.path)
            .map(|m| m.len() > MAX_LOG_BYTES)
            .unwrap_or(false);
        if oversized {
            self.reset();
        }
    }
}
