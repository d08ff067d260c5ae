//! Tolerant log reader.

use super::entry::{LogEntry, Parsed, parse_entry};
use crate::error::{Result, ShadowError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Iterates the well-formed entries of one log file.
///
/// Defective or torn entries are skipped: the reader logs a warning with the
/// byte position, counts the skip and resumes after the next newline.
pub struct LogReader {
    path: PathBuf,
    data: Vec<u8>,
    position: usize,
    skipped: usize,
}

impl LogReader {
    /// Read the log at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ShadowError::LogRead {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;

        let mut data = Vec::new();
        BufReader::new(file)
            .read_to_end(&mut data)
            .map_err(|e| ShadowError::LogRead {
                path: path.to_path_buf(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_bytes(path, data))
    }

    /// Read entries from an in-memory log labelled `path`.
    pub fn from_bytes(path: impl Into<PathBuf>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            data,
            position: 0,
            skipped: 0,
        }
    }

    /// The log being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Byte position of the next entry.
    pub fn position(&self) -> u64 {
        self.position as u64
    }
}

impl Iterator for LogReader {
    type Item = LogEntry;

    fn next(&mut self) -> Option<LogEntry> {
        while self.position < self.data.len() {
            match parse_entry(&self.data[self.position..]) {
                Parsed::Entry { entry, consumed } => {
                    self.position += consumed;
                    return Some(entry);
                }
                Parsed::Defect { defect, resume } => {
                    let err = ShadowError::LogCorruption {
                        position: self.position as u64,
                        cause: defect.to_string(),
                    };
                    tracing::warn!(log = %self.path.display(), "Skipping log entry: {}", err);
                    self.skipped += 1;
                    self.position += resume;
                }
            }
        }
        None
    }
}
