//! Run configuration.
//!
//! Layered: built-in defaults, then an optional YAML file, then
//! `PAGESHADOW_*` environment variables. The binary applies its own flags on
//! top and calls [`ShadowConfig::validate`].

use crate::error::{Result, ShadowError};
use crate::journal::JournalConfig;
use crate::redirect::RebindStrategy;
use crate::translator::PteditorPaths;
use crate::workspace::Workspace;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Demo content seeded into each file by `init`.
pub const DEFAULT_DEMO_DATA: &str = "------------ Hello World! ------------";
/// Payload each worker writes.
pub const DEFAULT_WRITE_PAYLOAD: &str = "xxx";
/// Offset each worker writes at.
pub const DEFAULT_WRITE_OFFSET: u64 = 15;

/// Settings for a pageshadow run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShadowConfig {
    /// Working directory holding `files/`, `logs/` and `merge/`.
    pub root: PathBuf,

    /// Number of demo files (`files/file0` ..).
    #[serde(default = "default_files")]
    pub files: usize,

    /// Number of worker processes spawned by `test`.
    #[serde(default = "default_processes")]
    pub processes: usize,

    /// Content seeded into each demo file.
    #[serde(default = "default_demo_data")]
    pub demo_data: String,

    /// Offset of the demo write.
    #[serde(default = "default_write_offset")]
    pub write_offset: u64,

    /// Payload of the demo write.
    #[serde(default = "default_write_payload")]
    pub write_payload: String,

    /// `sync_data` after each log append.
    #[serde(default = "default_true")]
    pub sync_on_write: bool,

    /// Take `logs/.workers.lock` around each worker's writes.
    pub serialize_workers: bool,

    /// How faulting pages are rebound.
    pub rebind: RebindStrategy,

    /// PTEditor control device.
    #[serde(default = "default_pteditor_device")]
    pub pteditor_device: PathBuf,

    /// Physical memory device used to map page tables.
    #[serde(default = "default_physical_memory_device")]
    pub physical_memory_device: PathBuf,
}

fn default_files() -> usize {
    1
}
fn default_processes() -> usize {
    1
}
fn default_demo_data() -> String {
    DEFAULT_DEMO_DATA.to_string()
}
fn default_write_offset() -> u64 {
    DEFAULT_WRITE_OFFSET
}
fn default_write_payload() -> String {
    DEFAULT_WRITE_PAYLOAD.to_string()
}
fn default_true() -> bool {
    true
}
fn default_pteditor_device() -> PathBuf {
    PteditorPaths::default().device
}
fn default_physical_memory_device() -> PathBuf {
    PteditorPaths::default().physical_memory
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            files: default_files(),
            processes: default_processes(),
            demo_data: default_demo_data(),
            write_offset: default_write_offset(),
            write_payload: default_write_payload(),
            sync_on_write: true,
            serialize_workers: false,
            rebind: RebindStrategy::default(),
            pteditor_device: default_pteditor_device(),
            physical_memory_device: default_physical_memory_device(),
        }
    }
}

impl ShadowConfig {
    /// Defaults, overlaid with `path` if given, overlaid with the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_from(|key| std::env::var(key).ok())
    }

    /// Parse a YAML configuration file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ShadowError::io(path, e))?;
        Self::from_yaml(&content).map_err(|e| ShadowError::ConfigParse {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })
    }

    /// Parse YAML text.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Apply `PAGESHADOW_ROOT`, `PAGESHADOW_FILES`, `PAGESHADOW_PROCESSES` and
    /// `PAGESHADOW_REBIND` as returned by `lookup`.
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(root) = lookup("PAGESHADOW_ROOT") {
            self.root = PathBuf::from(root);
        }
        if let Some(files) = lookup("PAGESHADOW_FILES") {
            self.files = parse_count("files", &files)?;
        }
        if let Some(processes) = lookup("PAGESHADOW_PROCESSES") {
            self.processes = parse_count("processes", &processes)?;
        }
        if let Some(rebind) = lookup("PAGESHADOW_REBIND") {
            self.rebind = rebind.parse()?;
        }
        Ok(self)
    }

    /// Set the working directory.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Set the number of demo files.
    pub fn with_files(mut self, files: usize) -> Self {
        self.files = files;
        self
    }

    /// Set the number of worker processes.
    pub fn with_processes(mut self, processes: usize) -> Self {
        self.processes = processes;
        self
    }

    /// Set the rebind strategy.
    pub fn with_rebind(mut self, rebind: RebindStrategy) -> Self {
        self.rebind = rebind;
        self
    }

    /// Set worker serialization.
    pub fn with_serialize_workers(mut self, serialize: bool) -> Self {
        self.serialize_workers = serialize;
        self
    }

    /// Set sync on write.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    /// Check value ranges and that the demo write fits the demo data.
    pub fn validate(&self) -> Result<()> {
        if self.files == 0 {
            return Err(invalid("files", "must be at least 1"));
        }
        if self.processes == 0 {
            return Err(invalid("processes", "must be at least 1"));
        }
        if self.write_payload.is_empty() {
            return Err(invalid("write_payload", "must not be empty"));
        }
        if self.demo_data.is_empty() {
            return Err(invalid("demo_data", "must not be empty"));
        }
        let end = self
            .write_offset
            .checked_add(self.write_payload.len() as u64);
        if end.is_none_or(|end| end > self.demo_data.len() as u64) {
            return Err(invalid(
                "write_offset",
                format!(
                    "write of {} bytes at offset {} does not fit in {} bytes of demo data",
                    self.write_payload.len(),
                    self.write_offset,
                    self.demo_data.len()
                ),
            ));
        }
        Ok(())
    }

    /// Directory layout under `root`.
    pub fn workspace(&self) -> Workspace {
        Workspace::new(&self.root)
    }

    /// Journal settings for the current process.
    pub fn journal_config(&self) -> JournalConfig {
        JournalConfig::default()
            .with_log_root(self.workspace().logs_dir())
            .with_sync(self.sync_on_write)
    }

    /// Devices for the PTEditor translator.
    pub fn pteditor_paths(&self) -> PteditorPaths {
        PteditorPaths {
            device: self.pteditor_device.clone(),
            physical_memory: self.physical_memory_device.clone(),
        }
    }
}

fn parse_count(field: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(field, format!("'{}' is not a count", value)))
}

fn invalid(field: &str, cause: impl Into<String>) -> ShadowError {
    ShadowError::ConfigValue {
        field: field.to_string(),
        cause: cause.into(),
    }
}
