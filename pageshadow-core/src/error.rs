//! Error types for pageshadow.
//!
//! Every error carries the path, offset or address it concerns so a failed
//! write or merge can be traced back to the file and entry involved.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for pageshadow operations.
#[derive(Error, Debug)]
pub enum ShadowError {
    // =========================================================================
    // Region Errors (E001-E099)
    // =========================================================================
    /// Failed to open or map a file read-only.
    #[error("E001: Failed to map {path} read-only: {cause}")]
    RegionMap {
        /// The file that could not be mapped.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    /// The backing file is empty, so there is nothing to map.
    #[error("E002: Cannot map empty file {path}")]
    EmptyRegion {
        /// The empty file.
        path: PathBuf,
    },

    /// A write would run past the end of the mapped region.
    #[error(
        "E003: Write of {length} bytes at offset {offset} exceeds region of {region_size} bytes"
    )]
    OutOfBounds {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        length: u64,
        /// Size of the mapped region.
        region_size: u64,
    },

    /// A write with no payload was requested.
    #[error("E004: Refusing to log an empty write at offset {offset}")]
    EmptyPayload {
        /// Requested offset.
        offset: u64,
    },

    // =========================================================================
    // Interceptor Errors (E100-E199)
    // =========================================================================
    /// Installing the write-fault handler failed.
    #[error("E101: Failed to install write-fault handler: {cause}")]
    InterceptorInstall {
        /// Reason for the failure.
        cause: String,
    },

    /// The fixed-size region table is full.
    #[error("E102: Cannot watch region at {base:#x}: all {capacity} region slots are in use")]
    RegionTableFull {
        /// Base address of the region that could not be registered.
        base: usize,
        /// Number of slots in the table.
        capacity: usize,
    },

    /// A region was used for writes without an installed interceptor.
    #[error("E103: Region {path} is not watched by a fault interceptor")]
    RegionNotWatched {
        /// The region's backing file.
        path: PathBuf,
    },

    // =========================================================================
    // Translator / Redirect Errors (E200-E299)
    // =========================================================================
    /// The page-table facility could not be opened.
    #[error("E201: Page-table facility {device} unavailable: {cause}")]
    TranslatorUnavailable {
        /// The device that failed to open.
        device: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    /// Resolving or updating a translation failed.
    #[error("E202: Translation failed for address {address:#x}: {cause}")]
    Translation {
        /// The virtual address involved.
        address: usize,
        /// Reason for the failure.
        cause: String,
    },

    // =========================================================================
    // Journal Errors (E300-E399)
    // =========================================================================
    /// Appending to a write log failed.
    #[error("E301: Log append failed at {path}: {cause}")]
    LogWrite {
        /// The log file.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    /// Reading a write log failed.
    #[error("E302: Log read failed at {path}: {cause}")]
    LogRead {
        /// The log file.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    /// A log entry could not be parsed.
    #[error("E303: Malformed log entry at byte {position}: {cause}")]
    LogCorruption {
        /// Byte position of the entry within the log.
        position: u64,
        /// Description of the problem.
        cause: String,
    },

    // =========================================================================
    // Merge Errors (E400-E499)
    // =========================================================================
    /// A merge input (original or log) could not be opened.
    #[error("E401: Failed to open merge input {path}: {cause}")]
    MergeInput {
        /// The input path.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    /// The merge output could not be created or written.
    #[error("E402: Failed to write merge output {path}: {cause}")]
    MergeOutput {
        /// The output path.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    // =========================================================================
    // Configuration Errors (E500-E599)
    // =========================================================================
    /// Invalid configuration value.
    #[error("E501: Invalid configuration for '{field}': {cause}")]
    ConfigValue {
        /// The offending field.
        field: String,
        /// Description of the problem.
        cause: String,
    },

    /// Configuration file could not be parsed.
    #[error("E502: Failed to parse configuration {path}: {cause}")]
    ConfigParse {
        /// The configuration file.
        path: PathBuf,
        /// Parser message.
        cause: String,
    },

    // =========================================================================
    // I/O Errors (E900-E999)
    // =========================================================================
    /// File I/O error.
    #[error("E901: I/O error at {path}: {cause}")]
    Io {
        /// The path where the I/O error occurred.
        path: PathBuf,
        /// Description of the I/O error.
        cause: String,
    },
}

impl ShadowError {
    /// Get the error code (e.g., "E001").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::RegionMap { .. } => "E001",
            Self::EmptyRegion { .. } => "E002",
            Self::OutOfBounds { .. } => "E003",
            Self::EmptyPayload { .. } => "E004",
            Self::InterceptorInstall { .. } => "E101",
            Self::RegionTableFull { .. } => "E102",
            Self::RegionNotWatched { .. } => "E103",
            Self::TranslatorUnavailable { .. } => "E201",
            Self::Translation { .. } => "E202",
            Self::LogWrite { .. } => "E301",
            Self::LogRead { .. } => "E302",
            Self::LogCorruption { .. } => "E303",
            Self::MergeInput { .. } => "E401",
            Self::MergeOutput { .. } => "E402",
            Self::ConfigValue { .. } => "E501",
            Self::ConfigParse { .. } => "E502",
            Self::Io { .. } => "E901",
        }
    }

    /// Check if this error is a configuration/validation error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigValue { .. } | Self::ConfigParse { .. })
    }

    /// Check if this error means redirection cannot continue in this process.
    ///
    /// Inside the fault handler these conditions terminate the process; outside
    /// it they are reported to the caller.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InterceptorInstall { .. }
                | Self::TranslatorUnavailable { .. }
                | Self::Translation { .. }
        )
    }

    /// Shorthand for an I/O error at a path.
    pub(crate) fn io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.into(),
            cause: err.to_string(),
        }
    }
}

/// Result type alias using `ShadowError`.
pub type Result<T> = std::result::Result<T, ShadowError>;
