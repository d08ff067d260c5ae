//! Fixed-size, lock-free bookkeeping read by the fault handler.
//!
//! Both tables are plain arrays of atomics so the handler can consult them
//! without allocating or locking. A zero base marks a free slot.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Maximum number of regions watched at once.
pub const MAX_REGIONS: usize = 64;

/// Maximum number of pages redirected over the life of the process.
pub const MAX_REDIRECTED_PAGES: usize = 8192;

/// Table of watched `[base, base + len)` ranges.
pub(crate) struct RegionTable {
    bases: [AtomicUsize; MAX_REGIONS],
    lens: [AtomicUsize; MAX_REGIONS],
}

impl RegionTable {
    pub(crate) const fn new() -> Self {
        Self {
            bases: [const { AtomicUsize::new(0) }; MAX_REGIONS],
            lens: [const { AtomicUsize::new(0) }; MAX_REGIONS],
        }
    }

    /// Claim a slot for a range. Returns false when every slot is taken.
    pub(crate) fn insert(&self, base: usize, len: usize) -> bool {
        for (slot, slot_len) in self.bases.iter().zip(&self.lens) {
            if slot
                .compare_exchange(0, base, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                slot_len.store(len, Ordering::Release);
                return true;
            }
        }
        false
    }

    /// Release the slot holding `base`.
    pub(crate) fn remove(&self, base: usize) -> bool {
        for (slot, slot_len) in self.bases.iter().zip(&self.lens) {
            if slot.load(Ordering::Acquire) == base {
                slot_len.store(0, Ordering::Release);
                slot.store(0, Ordering::Release);
                return true;
            }
        }
        false
    }

    /// Check whether `addr` falls inside any watched range.
    pub(crate) fn contains(&self, addr: usize) -> bool {
        self.bases.iter().zip(&self.lens).any(|(slot, slot_len)| {
            let base = slot.load(Ordering::Acquire);
            let len = slot_len.load(Ordering::Acquire);
            base != 0 && addr >= base && addr - base < len
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.bases
            .iter()
            .filter(|slot| slot.load(Ordering::Acquire) != 0)
            .count()
    }
}

/// Set of page bases that have already been redirected.
pub(crate) struct PageSet {
    pages: [AtomicUsize; MAX_REDIRECTED_PAGES],
}

impl PageSet {
    pub(crate) const fn new() -> Self {
        Self {
            pages: [const { AtomicUsize::new(0) }; MAX_REDIRECTED_PAGES],
        }
    }

    pub(crate) fn contains(&self, page: usize) -> bool {
        self.pages
            .iter()
            .any(|slot| slot.load(Ordering::Acquire) == page)
    }

    /// Record `page`. Returns false when the set is full.
    pub(crate) fn insert(&self, page: usize) -> bool {
        if self.contains(page) {
            return true;
        }
        self.pages.iter().any(|slot| {
            slot.compare_exchange(0, page, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        })
    }

    /// Forget every page inside `[base, base + len)`.
    pub(crate) fn remove_range(&self, base: usize, len: usize) -> usize {
        let mut removed = 0;
        for slot in &self.pages {
            let page = slot.load(Ordering::Acquire);
            if page != 0
                && page >= base
                && page - base < len
                && slot
                    .compare_exchange(page, 0, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            {
                removed += 1;
            }
        }
        removed
    }
}
