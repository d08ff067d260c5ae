//! Paging layout and page-table entry helpers.
//!
//! Redirection assumes x86-64 four-level paging with 4 KiB pages and 512
//! entries per table. That assumption lives here, in [`PagingLayout`], instead
//! of being spread through the redirect code as raw shifts and masks.

mod entry;
mod layout;

pub use entry::{EntryValid, PageTableEntry, TranslationEntry};
pub use layout::{PAGE_SIZE, PagingLayout, TableLevel};
