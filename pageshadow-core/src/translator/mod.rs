//! Address translation boundary.
//!
//! The page redirector never touches page tables directly. It goes through an
//! [`AddressTranslator`], which resolves a virtual address to its full
//! translation, maps a page-table frame into the process, publishes an updated
//! entry and invalidates the TLB. On Linux the production implementation is
//! [`Pteditor`], backed by the PTEditor kernel module.
//!
//! Translator methods may be called from inside the write-fault handler, so
//! they report failures through the allocation-free [`TranslateError`].

mod pteditor;
mod table;

pub use pteditor::{Pteditor, PteditorPaths};
pub use table::TableMapping;

use crate::error::ShadowError;
use crate::paging::{PagingLayout, TranslationEntry};
use thiserror::Error;

/// Failure reported by an [`AddressTranslator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// The facility could not resolve the address.
    #[error("resolve failed for {address:#x} (errno {errno})")]
    Resolve {
        /// The virtual address.
        address: usize,
        /// OS error number.
        errno: i32,
    },

    /// The walk stopped before reaching a leaf entry.
    #[error("no leaf page-table entry for {address:#x}")]
    NoLeaf {
        /// The virtual address.
        address: usize,
    },

    /// A page-table frame could not be mapped.
    #[error("mapping page-table frame {pfn:#x} failed (errno {errno})")]
    MapTable {
        /// The frame number.
        pfn: u64,
        /// OS error number.
        errno: i32,
    },

    /// Publishing an updated entry failed.
    #[error("update failed for {address:#x} (errno {errno})")]
    Update {
        /// The virtual address.
        address: usize,
        /// OS error number.
        errno: i32,
    },

    /// TLB invalidation failed.
    #[error("TLB invalidation failed for {address:#x} (errno {errno})")]
    Invalidate {
        /// The virtual address.
        address: usize,
        /// OS error number.
        errno: i32,
    },
}

impl TranslateError {
    /// The virtual address (or frame) the failure concerns.
    pub fn address(&self) -> usize {
        match *self {
            Self::Resolve { address, .. }
            | Self::NoLeaf { address }
            | Self::Update { address, .. }
            | Self::Invalidate { address, .. } => address,
            Self::MapTable { pfn, .. } => pfn as usize,
        }
    }
}

impl From<TranslateError> for ShadowError {
    fn from(err: TranslateError) -> Self {
        ShadowError::Translation {
            address: err.address(),
            cause: err.to_string(),
        }
    }
}

/// Access to the page tables of the calling process.
///
/// # Safety contract
///
/// `update` and writes through a [`TableMapping`] change live translations.
/// Callers must only retarget pages they own and must invalidate the TLB
/// entry afterwards.
pub trait AddressTranslator: Send + Sync {
    /// The paging hierarchy this translator walks.
    fn layout(&self) -> PagingLayout {
        PagingLayout::X86_64_4K
    }

    /// Resolve all levels of the translation of `vaddr`.
    fn resolve(&self, vaddr: usize) -> Result<TranslationEntry, TranslateError>;

    /// Map the page table stored in physical frame `pfn`.
    fn map_table(&self, pfn: u64) -> Result<TableMapping, TranslateError>;

    /// Write back the levels flagged valid in `entry` for `vaddr`.
    fn update(&self, vaddr: usize, entry: &TranslationEntry) -> Result<(), TranslateError>;

    /// Drop any cached translation of `vaddr`.
    fn invalidate(&self, vaddr: usize) -> Result<(), TranslateError>;
}

/// Last OS error number without allocating.
pub(crate) fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}
