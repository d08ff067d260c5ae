//! Log file and process directory naming.
//!
//! Log files are named `log_<target>_<YYYYmmdd_HHMMSS>.log` and live in
//! `logs_<pid>` directories. The target is recovered by parsing from the
//! right, so targets containing underscores round-trip.

use chrono::NaiveDateTime;
use std::fmt;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const LOG_PREFIX: &str = "log_";
const LOG_SUFFIX: &str = ".log";
const PROCESS_DIR_PREFIX: &str = "logs_";

/// Parsed name of a log file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogFileName {
    /// Base name of the file the log targets.
    pub target: String,
    /// Local time the log was opened, one-second resolution.
    pub timestamp: NaiveDateTime,
}

impl LogFileName {
    /// Name for a log of `target` opened at `timestamp`.
    pub fn new(target: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self {
            target: target.into(),
            timestamp,
        }
    }

    /// Parse a file name such as `log_file0_20250101_120000.log`.
    pub fn parse(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(LOG_SUFFIX)?.strip_prefix(LOG_PREFIX)?;
        let mut parts = stem.rsplitn(3, '_');
        let time = parts.next()?;
        let date = parts.next()?;
        let target = parts.next()?;

        if target.is_empty()
            || date.len() != 8
            || time.len() != 6
            || !date.bytes().chain(time.bytes()).all(|b| b.is_ascii_digit())
        {
            return None;
        }

        let timestamp =
            NaiveDateTime::parse_from_str(&format!("{}_{}", date, time), TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            target: target.to_string(),
            timestamp,
        })
    }

    /// The timestamp as it appears in the file name.
    pub fn timestamp_label(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

impl fmt::Display for LogFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}_{}{}",
            LOG_PREFIX,
            self.target,
            self.timestamp.format(TIMESTAMP_FORMAT),
            LOG_SUFFIX
        )
    }
}

/// Name of the log directory owned by process `pid`.
pub fn process_dir_name(pid: u32) -> String {
    format!("{}{}", PROCESS_DIR_PREFIX, pid)
}

/// Owning pid of a directory named `logs_<pid>`.
pub fn parse_process_dir(name: &str) -> Option<u32> {
    name.strip_prefix(PROCESS_DIR_PREFIX)?.parse().ok()
}
