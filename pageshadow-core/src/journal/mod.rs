//! Append-only write logs.
//!
//! Every intentional write against a [`MappedRegion`](crate::region::MappedRegion)
//! goes through [`WriteLogger::record_and_apply`], which appends a
//! [`LogEntry`] to `logs/logs_<pid>/log_<target>_<timestamp>.log` and only then
//! applies the write to memory. [`LogReader`] reads the entries back for
//! replay.

mod config;
mod entry;
mod name;
mod reader;
mod writer;

pub use config::JournalConfig;
pub use entry::{EntryDefect, LogEntry, Parsed, parse_entry};
pub use name::{LogFileName, parse_process_dir, process_dir_name};
pub use reader::LogReader;
pub use writer::{WriteLogger, WriteReceipt};
