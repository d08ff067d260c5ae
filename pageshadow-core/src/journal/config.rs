//! Write logger configuration.

use super::name::process_dir_name;
use std::path::PathBuf;

/// Where and how the write logger stores its logs.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Root of all per-process log directories.
    pub log_root: PathBuf,
    /// Process id naming the log directory.
    pub pid: u32,
    /// Whether to `sync_data` after each append.
    pub sync_on_write: bool,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            log_root: PathBuf::from("logs"),
            pid: std::process::id(),
            sync_on_write: true,
        }
    }
}

impl JournalConfig {
    /// Set the log root directory.
    pub fn with_log_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.log_root = root.into();
        self
    }

    /// Set the owning process id.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    /// Set sync on write.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    /// `<log_root>/logs_<pid>`.
    pub fn process_dir(&self) -> PathBuf {
        self.log_root.join(process_dir_name(self.pid))
    }
}
