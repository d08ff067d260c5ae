//! pageshadow core library
//!
//! Transparent write redirection for files mapped read-only, backed by an
//! append-only write log and an offline merge.
//!
//! # Overview
//!
//! A process maps a file read-only and writes to it anyway. The first write
//! to each page raises a permission fault; the [`FaultInterceptor`] catches it
//! and the [`PageRedirector`] swaps in a private writable copy of the page, so
//! the file on disk never changes. Every intentional write goes through the
//! [`WriteLogger`], which appends `Offset, Length, Data` entries to a
//! per-process log before touching memory. Later, the [`MergeEngine`] replays
//! one or all logs onto a fresh copy of the original file.
//!
//! # Key Components
//!
//! - **paging / translator**: the x86-64 four-level layout and the
//!   [`AddressTranslator`] boundary to the kernel page-table facility
//! - **redirect**: page copy plus rebind, through page-table edits or `mremap`
//! - **interceptor**: the `SIGSEGV` handler and its trap state machine
//! - **journal**: log entry format, file naming, writer and tolerant reader
//! - **merge**: single-log and all-logs replay
//!
//! # Example
//!
//! ```ignore
//! use pageshadow_core::prelude::*;
//!
//! let rebinder = RebindStrategy::Remap.build(&PteditorPaths::default())?;
//! let interceptor = FaultInterceptor::install(PageRedirector::new(rebinder))?;
//!
//! let mut region = MappedRegion::open_watched("files/file0", interceptor)?;
//! let logger = WriteLogger::new(JournalConfig::default());
//! let receipt = logger.record_and_apply(&mut region, 15, b"xxx")?;
//!
//! let report = Workspace::new(".")
//!     .merge_engine()
//!     .merge("files/file0", &receipt.log_path)?;
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod diff;
pub mod error;
pub mod interceptor;
pub mod journal;
pub mod merge;
pub mod observability;
pub mod paging;
pub mod prelude;
pub mod redirect;
pub mod region;
pub mod translator;
pub mod workspace;

// Re-export key types at crate root for convenience
pub use config::ShadowConfig;
pub use error::{Result, ShadowError};
pub use interceptor::{FaultInterceptor, InterceptorStats};
pub use journal::{JournalConfig, LogEntry, LogReader, WriteLogger, WriteReceipt};
pub use merge::{MergeEngine, MergeReport};
pub use redirect::{PageRebinder, PageRedirector, RebindStrategy};
pub use region::MappedRegion;
pub use translator::{AddressTranslator, Pteditor, PteditorPaths};
pub use workspace::Workspace;
