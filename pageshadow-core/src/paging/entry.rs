//! Raw page-table entries as exchanged with the page-table facility.

use std::fmt;

/// Physical frame number field of an x86-64 entry: bits 12..52.
const PFN_SHIFT: u32 = 12;
const PFN_MASK: u64 = (1 << 40) - 1;

const PRESENT: u64 = 1 << 0;
const WRITABLE: u64 = 1 << 1;
const USER: u64 = 1 << 2;

/// A single 64-bit page-table entry at any level.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct PageTableEntry(u64);

impl PageTableEntry {
    /// The empty entry.
    pub const EMPTY: Self = Self(0);

    /// Wrap a raw entry.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw entry bits.
    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Physical frame number this entry points at.
    #[inline]
    pub const fn pfn(self) -> u64 {
        (self.0 >> PFN_SHIFT) & PFN_MASK
    }

    /// Copy of this entry pointing at `pfn`; all other bits are kept.
    #[inline]
    #[must_use]
    pub const fn with_pfn(self, pfn: u64) -> Self {
        let cleared = self.0 & !(PFN_MASK << PFN_SHIFT);
        Self(cleared | ((pfn & PFN_MASK) << PFN_SHIFT))
    }

    /// Physical address of the frame.
    #[inline]
    pub const fn frame_address(self) -> u64 {
        self.pfn() << PFN_SHIFT
    }

    #[inline]
    pub const fn is_present(self) -> bool {
        self.0 & PRESENT != 0
    }

    #[inline]
    pub const fn is_writable(self) -> bool {
        self.0 & WRITABLE != 0
    }

    #[inline]
    pub const fn is_user(self) -> bool {
        self.0 & USER != 0
    }
}

impl fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PageTableEntry({:#018x}, pfn={:#x}, {}{}{})",
            self.0,
            self.pfn(),
            if self.is_present() { "P" } else { "-" },
            if self.is_writable() { "W" } else { "-" },
            if self.is_user() { "U" } else { "-" },
        )
    }
}

/// Mask of levels that carry meaningful data in a [`TranslationEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct EntryValid(usize);

impl EntryValid {
    pub const PGD: Self = Self(1 << 0);
    pub const P4D: Self = Self(1 << 1);
    pub const PUD: Self = Self(1 << 2);
    pub const PMD: Self = Self(1 << 3);
    pub const PTE: Self = Self(1 << 4);
    pub const ALL: Self = Self(0x1f);

    /// The raw mask.
    #[inline]
    pub const fn bits(self) -> usize {
        self.0
    }

    /// Check whether every level in `other` is marked valid.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two masks.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Full translation of one virtual address, laid out like the PTEditor
/// `ptedit_entry_t` so it can be passed straight through `ioctl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct TranslationEntry {
    /// Owning process id, 0 for the calling process.
    pub pid: usize,
    /// The virtual address this entry describes.
    pub vaddr: usize,
    pub pgd: u64,
    pub p4d: u64,
    pub pud: u64,
    pub pmd: u64,
    pub pte: u64,
    /// Which of the level fields are valid (on resolve) or should be written
    /// (on update).
    pub valid: EntryValid,
}

impl TranslationEntry {
    /// An empty request for `vaddr` in the calling process.
    pub const fn request(vaddr: usize) -> Self {
        Self {
            pid: 0,
            vaddr,
            pgd: 0,
            p4d: 0,
            pud: 0,
            pmd: 0,
            pte: 0,
            valid: EntryValid(0),
        }
    }

    /// The leaf entry.
    #[inline]
    pub const fn pte(&self) -> PageTableEntry {
        PageTableEntry::from_raw(self.pte)
    }

    /// The page-directory entry pointing at the leaf page table.
    #[inline]
    pub const fn pmd(&self) -> PageTableEntry {
        PageTableEntry::from_raw(self.pmd)
    }

    /// Check that the walk reached a leaf entry.
    #[inline]
    pub const fn has_leaf(&self) -> bool {
        self.valid.contains(EntryValid::PMD.union(EntryValid::PTE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_pfn_keeps_flag_bits() {
        let entry = PageTableEntry::from_raw(0x8000_0000_1234_5067);
        let moved = entry.with_pfn(0xabcde);
        assert_eq!(moved.pfn(), 0xabcde);
        assert_eq!(moved.as_raw() & 0xfff, 0x067);
        assert_eq!(moved.as_raw() >> 52, entry.as_raw() >> 52);
        assert_eq!(moved.frame_address(), 0xabcde << 12);
    }

    #[test]
    fn flag_accessors() {
        let entry = PageTableEntry::from_raw(0b101);
        assert!(entry.is_present());
        assert!(!entry.is_writable());
        assert!(entry.is_user());
    }

    #[test]
    fn translation_entry_matches_ioctl_layout() {
        assert_eq!(std::mem::size_of::<TranslationEntry>(), 8 * 8);
        let request = TranslationEntry::request(0x1000);
        assert_eq!(request.vaddr, 0x1000);
        assert!(!request.has_leaf());
    }

    #[test]
    fn valid_mask_union() {
        let mask = EntryValid::PMD.union(EntryValid::PTE);
        assert!(mask.contains(EntryValid::PTE));
        assert!(!mask.contains(EntryValid::PGD));
        assert!(EntryValid::ALL.contains(mask));
    }
}
