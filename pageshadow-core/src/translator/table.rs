//! A page table mapped into the process for direct entry edits.

use crate::paging::PageTableEntry;
use std::ptr::NonNull;

/// View of one page table's entries.
///
/// Mappings created by a kernel-backed translator are unmapped on drop.
/// Borrowed mappings (used by in-process translators) are left alone.
pub struct TableMapping {
    base: NonNull<u64>,
    entries: usize,
    unmap_len: usize,
}

impl TableMapping {
    /// View `entries` entries at `base` without taking ownership.
    ///
    /// # Safety
    ///
    /// `base` must point at `entries` valid, writable `u64`s that outlive the
    /// returned mapping.
    pub unsafe fn borrowed(base: NonNull<u64>, entries: usize) -> Self {
        Self {
            base,
            entries,
            unmap_len: 0,
        }
    }

    /// Take ownership of an `mmap`ed table of `len` bytes.
    ///
    /// # Safety
    ///
    /// `base` must be the start of a live mapping of `len` bytes that holds at
    /// least `entries` entries and is not unmapped elsewhere.
    pub(crate) unsafe fn mapped(base: NonNull<u64>, entries: usize, len: usize) -> Self {
        Self {
            base,
            entries,
            unmap_len: len,
        }
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Read the entry at `index`.
    pub fn read(&self, index: usize) -> Option<PageTableEntry> {
        if index >= self.entries {
            return None;
        }
        // SAFETY: index is in bounds of the table this mapping covers.
        let raw = unsafe { self.base.as_ptr().add(index).read_volatile() };
        Some(PageTableEntry::from_raw(raw))
    }

    /// Overwrite the entry at `index`. Returns false if out of range.
    pub fn write(&mut self, index: usize, entry: PageTableEntry) -> bool {
        if index >= self.entries {
            return false;
        }
        // SAFETY: index is in bounds and the mapping is writable.
        unsafe { self.base.as_ptr().add(index).write_volatile(entry.as_raw()) };
        true
    }
}

impl Drop for TableMapping {
    fn drop(&mut self) {
        if self.unmap_len > 0 {
            // SAFETY: `mapped` guarantees we own this mapping.
            unsafe {
                libc::munmap(self.base.as_ptr().cast(), self.unmap_len);
            }
        }
    }
}
