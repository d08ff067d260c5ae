//! Offline replay of write logs onto copies of their original files.
//!
//! The original file is only ever opened for reading. Each merge truncates
//! and rebuilds its output, so re-running with the same inputs produces the
//! same bytes.

mod discovery;

pub use discovery::{DiscoveredLog, logs_for_target};

use crate::error::{Result, ShadowError};
use crate::journal::LogReader;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Result of a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// The file that was written.
    pub output: PathBuf,
    /// Entries replayed onto the output.
    pub applied: usize,
    /// Unparsable entries that were skipped.
    pub skipped: usize,
    /// Logs replayed, in order.
    pub logs: Vec<PathBuf>,
}

/// Rebuilds files from their originals plus write logs.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    merge_root: PathBuf,
    log_root: PathBuf,
}

impl MergeEngine {
    /// Create an engine writing under `merge_root` and scanning `log_root`.
    pub fn new(merge_root: impl Into<PathBuf>, log_root: impl Into<PathBuf>) -> Self {
        Self {
            merge_root: merge_root.into(),
            log_root: log_root.into(),
        }
    }

    /// Directory merge outputs are written under.
    pub fn merge_root(&self) -> &Path {
        &self.merge_root
    }

    /// Directory scanned for per-process logs.
    pub fn log_root(&self) -> &Path {
        &self.log_root
    }

    /// Replay one log onto a copy of `original`.
    ///
    /// Output: `<merge_root>/merge_<name>/<name>_<log-name>`.
    pub fn merge(&self, original: impl AsRef<Path>, log: impl AsRef<Path>) -> Result<MergeReport> {
        let original = original.as_ref();
        let log = log.as_ref();

        let source = open_input(original)?;
        let mut reader = LogReader::open(log).map_err(|e| ShadowError::MergeInput {
            path: log.to_path_buf(),
            cause: e.to_string(),
        })?;

        let name = base_name(original)?;
        let log_name = base_name(log)?;
        let dir = self.merge_root.join(format!("merge_{}", name));
        std::fs::create_dir_all(&dir).map_err(|e| output_error(&dir, e))?;
        let output_path = dir.join(format!("{}_{}", name, log_name));

        let mut output = create_output(&output_path)?;
        copy_original(source, original, &mut output, &output_path)?;
        let applied = replay(&mut reader, &mut output, &output_path)?;
        output.flush().map_err(|e| output_error(&output_path, e))?;

        let report = MergeReport {
            output: output_path,
            applied,
            skipped: reader.skipped(),
            logs: vec![log.to_path_buf()],
        };
        tracing::info!(
            output = %report.output.display(),
            applied = report.applied,
            skipped = report.skipped,
            "Merged log"
        );
        Ok(report)
    }

    /// Replay every log of `source` onto a copy of it.
    ///
    /// Output: `<merge_root>/merge_all_<name>`. Logs are found under
    /// `<log_root>/logs_<pid>/` and applied in timestamp, pid, file-name
    /// order. Without a log root the output is a plain copy.
    pub fn merge_all(&self, source: impl AsRef<Path>) -> Result<MergeReport> {
        let source_path = source.as_ref();
        let input = open_input(source_path)?;
        let name = base_name(source_path)?;

        std::fs::create_dir_all(&self.merge_root)
            .map_err(|e| output_error(&self.merge_root, e))?;
        let output_path = self.merge_root.join(format!("merge_all_{}", name));
        let mut output = create_output(&output_path)?;
        copy_original(input, source_path, &mut output, &output_path)?;

        let logs = logs_for_target(&self.log_root, &name)?;
        let mut applied = 0;
        let mut skipped = 0;
        for log in &logs {
            let mut reader = LogReader::open(&log.path).map_err(|e| ShadowError::MergeInput {
                path: log.path.clone(),
                cause: e.to_string(),
            })?;
            applied += replay(&mut reader, &mut output, &output_path)?;
            skipped += reader.skipped();
            tracing::debug!(log = %log.path.display(), pid = log.pid, "Replayed log");
        }
        output.flush().map_err(|e| output_error(&output_path, e))?;

        let report = MergeReport {
            output: output_path,
            applied,
            skipped,
            logs: logs.into_iter().map(|log| log.path).collect(),
        };
        tracing::info!(
            output = %report.output.display(),
            logs = report.logs.len(),
            applied = report.applied,
            skipped = report.skipped,
            "Merged all logs"
        );
        Ok(report)
    }
}

fn replay(reader: &mut LogReader, output: &mut File, output_path: &Path) -> Result<usize> {
    let mut applied = 0;
    for entry in reader.by_ref() {
        output
            .seek(SeekFrom::Start(entry.offset))
            .and_then(|_| output.write_all(&entry.data))
            .map_err(|e| output_error(output_path, e))?;
        applied += 1;
    }
    Ok(applied)
}

fn open_input(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| ShadowError::MergeInput {
        path: path.to_path_buf(),
        cause: e.to_string(),
    })
}

fn create_output(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| output_error(path, e))
}

fn copy_original(source: File, source_path: &Path, output: &mut File, output_path: &Path) -> Result<()> {
    let mut source = BufReader::new(source);
    std::io::copy(&mut source, output).map_err(|e| ShadowError::MergeOutput {
        path: output_path.to_path_buf(),
        cause: format!("copying {}: {}", source_path.display(), e),
    })?;
    Ok(())
}

fn base_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| ShadowError::MergeInput {
            path: path.to_path_buf(),
            cause: "path has no UTF-8 file name".to_string(),
        })
}

fn output_error(path: &Path, err: std::io::Error) -> ShadowError {
    ShadowError::MergeOutput {
        path: path.to_path_buf(),
        cause: err.to_string(),
    }
}
