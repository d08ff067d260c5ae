//! The write logger.

use super::config::JournalConfig;
use super::entry::LogEntry;
use super::name::LogFileName;
use crate::error::{Result, ShadowError};
use crate::region::MappedRegion;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// The most recently opened log.
struct OpenLog {
    name: String,
    path: PathBuf,
    file: File,
}

/// Where a write was logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    /// The log file the entry was appended to.
    pub log_path: PathBuf,
    /// The logged entry.
    pub entry: LogEntry,
}

/// Logs every write against a mapped region before applying it.
pub struct WriteLogger {
    config: JournalConfig,
    current: Mutex<Option<OpenLog>>,
    record_count: AtomicU64,
}

impl WriteLogger {
    /// Create a logger. No file is touched until the first write.
    pub fn new(config: JournalConfig) -> Self {
        Self {
            config,
            current: Mutex::new(None),
            record_count: AtomicU64::new(0),
        }
    }

    /// The logger's configuration.
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// Log `payload` at `offset` for `region`, then write it into the region.
    ///
    /// Nothing is logged or written if the payload is empty, the write would
    /// overrun the region, or the region is not watched.
    pub fn record_and_apply(
        &self,
        region: &mut MappedRegion,
        offset: u64,
        payload: &[u8],
    ) -> Result<WriteReceipt> {
        let entry = LogEntry::new(offset, payload)?;
        region.check_bounds(offset, payload.len())?;
        if !region.is_watched() {
            return Err(ShadowError::RegionNotWatched {
                path: region.path().to_path_buf(),
            });
        }

        let log_path = self.append(region.file_name(), &entry)?;
        region.write_at(offset, payload)?;

        tracing::debug!(
            target_file = region.file_name(),
            offset,
            length = payload.len(),
            log = %log_path.display(),
            "Applied logged write"
        );

        Ok(WriteReceipt { log_path, entry })
    }

    /// Append `entry` to the current log of `target`.
    ///
    /// Returns the log file path.
    pub fn append(&self, target: &str, entry: &LogEntry) -> Result<PathBuf> {
        let timestamp = chrono::Local::now().naive_local();
        let name = LogFileName::new(target, timestamp).to_string();
        let line = entry.encode();

        let mut current = self.current.lock();
        let reuse = current.as_ref().is_some_and(|log| log.name == name);
        if !reuse {
            *current = Some(self.open_log(name)?);
        }
        let log = current
            .as_mut()
            .ok_or_else(|| ShadowError::LogWrite {
                path: self.config.process_dir(),
                cause: "no open log".to_string(),
            })?;

        log.file
            .write_all(&line)
            .map_err(|e| log_write(&log.path, e))?;
        if self.config.sync_on_write {
            log.file.sync_data().map_err(|e| log_write(&log.path, e))?;
        }

        self.record_count.fetch_add(1, Ordering::Relaxed);
        Ok(log.path.clone())
    }

    fn open_log(&self, name: String) -> Result<OpenLog> {
        let dir = self.config.process_dir();
        std::fs::create_dir_all(&dir).map_err(|e| log_write(&dir, e))?;

        let path = dir.join(&name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| log_write(&path, e))?;

        tracing::info!(log = %path.display(), "Opened write log");
        Ok(OpenLog { name, path, file })
    }

    /// Path of the most recently used log, if any.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.current.lock().as_ref().map(|log| log.path.clone())
    }

    /// Number of entries appended by this logger.
    pub fn record_count(&self) -> u64 {
        self.record_count.load(Ordering::Relaxed)
    }
}

fn log_write(path: &Path, err: std::io::Error) -> ShadowError {
    ShadowError::LogWrite {
        path: path.to_path_buf(),
        cause: err.to_string(),
    }
}
