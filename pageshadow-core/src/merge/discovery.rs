//! Finding the logs that belong to a source file.

use crate::error::{Result, ShadowError};
use crate::journal::{LogFileName, parse_process_dir};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// A log file found under the log root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLog {
    /// Full path of the log.
    pub path: PathBuf,
    /// Pid from the owning `logs_<pid>` directory.
    pub pid: u32,
    /// Parsed file name.
    pub name: LogFileName,
}

impl DiscoveredLog {
    /// Replay order key: timestamp, then pid, then file name.
    pub fn order_key(&self) -> (NaiveDateTime, u32, String) {
        (self.name.timestamp, self.pid, self.name.to_string())
    }
}

/// Collect every log under `log_root` whose target is exactly `target`,
/// in replay order.
///
/// A missing log root yields no logs.
pub fn logs_for_target(log_root: &Path, target: &str) -> Result<Vec<DiscoveredLog>> {
    let mut logs = Vec::new();

    let process_dirs = match std::fs::read_dir(log_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(log_root = %log_root.display(), "No log root, nothing to replay");
            return Ok(logs);
        }
        Err(e) => return Err(input_error(log_root, e)),
    };

    for dir_entry in process_dirs {
        let dir_entry = dir_entry.map_err(|e| input_error(log_root, e))?;
        let dir_name = dir_entry.file_name();
        let Some(pid) = dir_name.to_str().and_then(parse_process_dir) else {
            continue;
        };
        let dir_path = dir_entry.path();
        if !dir_path.is_dir() {
            continue;
        }

        for file_entry in std::fs::read_dir(&dir_path).map_err(|e| input_error(&dir_path, e))? {
            let file_entry = file_entry.map_err(|e| input_error(&dir_path, e))?;
            let file_name = file_entry.file_name();
            let Some(name) = file_name.to_str().and_then(LogFileName::parse) else {
                continue;
            };
            if name.target != target {
                continue;
            }
            logs.push(DiscoveredLog {
                path: file_entry.path(),
                pid,
                name,
            });
        }
    }

    logs.sort_by_key(DiscoveredLog::order_key);
    Ok(logs)
}

fn input_error(path: &Path, err: std::io::Error) -> ShadowError {
    ShadowError::MergeInput {
        path: path.to_path_buf(),
        cause: err.to_string(),
    }
}
