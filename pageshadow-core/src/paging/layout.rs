//! Paging hierarchy parameters and address arithmetic.

use std::fmt;

/// Size of a base page on the supported layout.
pub const PAGE_SIZE: usize = 4096;

/// One level of the translation hierarchy, leaf-first numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum TableLevel {
    /// Page table (PTE level).
    Pt = 1,
    /// Page directory (PMD level).
    Pd = 2,
    /// Page directory pointer table (PUD level).
    Pdpt = 3,
    /// Top-level table (PGD level).
    Pml4 = 4,
}

impl fmt::Display for TableLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pml4 => write!(f, "PML4"),
            Self::Pdpt => write!(f, "PDPT"),
            Self::Pd => write!(f, "PD"),
            Self::Pt => write!(f, "PT"),
        }
    }
}

/// Parameters of a radix paging hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingLayout {
    /// log2 of the page size.
    pub page_shift: u32,
    /// log2 of the number of entries per table.
    pub index_bits: u32,
    /// Number of translation levels.
    pub levels: u8,
}

impl PagingLayout {
    /// Four levels, 4 KiB pages, 512 entries per table.
    pub const X86_64_4K: Self = Self {
        page_shift: 12,
        index_bits: 9,
        levels: 4,
    };

    /// Page size in bytes.
    #[inline]
    pub const fn page_size(&self) -> usize {
        1 << self.page_shift
    }

    /// Entries per page table.
    #[inline]
    pub const fn entries_per_table(&self) -> usize {
        1 << self.index_bits
    }

    /// Round an address down to the start of its page.
    #[inline]
    pub const fn align_down(&self, addr: usize) -> usize {
        addr & !(self.page_size() - 1)
    }

    /// Offset of an address within its page.
    #[inline]
    pub const fn page_offset(&self, addr: usize) -> usize {
        addr & (self.page_size() - 1)
    }

    /// Check whether an address is page aligned.
    #[inline]
    pub const fn is_aligned(&self, addr: usize) -> bool {
        self.page_offset(addr) == 0
    }

    /// Index of the entry for `addr` inside the table at `level`.
    #[inline]
    pub const fn table_index(&self, level: TableLevel, addr: usize) -> usize {
        let shift = self.page_shift + (level as u32 - 1) * self.index_bits;
        (addr >> shift) & (self.entries_per_table() - 1)
    }

    /// Index of the leaf entry for `addr` inside its page table.
    #[inline]
    pub const fn pt_index(&self, addr: usize) -> usize {
        self.table_index(TableLevel::Pt, addr)
    }

    /// Number of pages touched by the byte range `[offset, offset + len)`.
    pub const fn pages_spanned(&self, offset: usize, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let first = offset >> self.page_shift;
        let last = (offset + len - 1) >> self.page_shift;
        last - first + 1
    }
}

impl Default for PagingLayout {
    fn default() -> Self {
        Self::X86_64_4K
    }
}
