//! Prelude for convenient imports.
//!
//! ```ignore
//! use pageshadow_core::prelude::*;
//! ```

// Errors and configuration
pub use crate::config::ShadowConfig;
pub use crate::error::{Result, ShadowError};

// Redirection
pub use crate::interceptor::{FaultInterceptor, InterceptorStats, TrapState};
pub use crate::paging::{PAGE_SIZE, PagingLayout};
pub use crate::redirect::{
    PageRebinder, PageRedirector, PageTableRebinder, RebindStrategy, RemapRebinder,
};
pub use crate::region::MappedRegion;
pub use crate::translator::{AddressTranslator, Pteditor, PteditorPaths};

// Logging and replay
pub use crate::journal::{JournalConfig, LogEntry, LogFileName, LogReader, WriteLogger, WriteReceipt};
pub use crate::merge::{MergeEngine, MergeReport};
pub use crate::workspace::Workspace;
