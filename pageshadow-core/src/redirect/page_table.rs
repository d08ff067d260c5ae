//! Rebinding by editing the leaf page-table entry.

use super::{PageRebinder, RedirectFault};
use crate::paging::EntryValid;
use crate::translator::{AddressTranslator, TranslateError};

/// Points the faulting page's leaf entry at the shadow page's frame.
///
/// The sequence is: resolve both pages, map the page table named by the
/// faulting page's PMD entry, swap the frame-number bits of the leaf entry,
/// publish the shadow page's leaf entry for the faulting address, then
/// invalidate the faulting address. If publishing or invalidation fails the
/// old leaf entry is written back.
///
/// The shadow mapping stays in place afterwards. It keeps the frame referenced
/// for as long as the faulting address uses it.
pub struct PageTableRebinder<T: AddressTranslator> {
    translator: T,
}

impl<T: AddressTranslator> PageTableRebinder<T> {
    /// Create a rebinder over `translator`.
    pub fn new(translator: T) -> Self {
        Self { translator }
    }

    /// The underlying translator.
    pub fn translator(&self) -> &T {
        &self.translator
    }
}

impl<T: AddressTranslator> PageRebinder for PageTableRebinder<T> {
    fn name(&self) -> &'static str {
        "pteditor"
    }

    unsafe fn rebind(
        &self,
        fault_page: usize,
        shadow_page: usize,
    ) -> std::result::Result<bool, RedirectFault> {
        let layout = self.translator.layout();

        let fault_entry = self.translator.resolve(fault_page)?;
        if !fault_entry.has_leaf() {
            return Err(TranslateError::NoLeaf {
                address: fault_page,
            }
            .into());
        }
        let shadow_entry = self.translator.resolve(shadow_page)?;
        if !shadow_entry.has_leaf() {
            return Err(TranslateError::NoLeaf {
                address: shadow_page,
            }
            .into());
        }

        let mut table = self.translator.map_table(fault_entry.pmd().pfn())?;
        let index = layout.pt_index(fault_page);
        let old = table
            .read(index)
            .ok_or(RedirectFault::TableIndex { index })?;
        table.write(index, old.with_pfn(shadow_entry.pte().pfn()));

        // Only the leaf level is published; the upper levels of the shadow
        // page describe a different region of the address space.
        let mut published = shadow_entry;
        published.valid = EntryValid::PTE;

        let finish = self
            .translator
            .update(fault_page, &published)
            .and_then(|()| self.translator.invalidate(fault_page));

        if let Err(err) = finish {
            table.write(index, old);
            let _ = self.translator.invalidate(fault_page);
            return Err(err.into());
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::{PAGE_SIZE, PageTableEntry, PagingLayout, TranslationEntry};
    use crate::translator::TableMapping;
    use parking_lot::Mutex;
    use std::ptr::NonNull;

    const TABLE_PFN: u64 = 0x4_2000;
    const FILE_PFN: u64 = 0x1_0000;
    const SHADOW_PFN: u64 = 0x7_7777;
    // Present, user, accessed, dirty; not writable.
    const READ_ONLY_FLAGS: u64 = 0x65;
    const WRITABLE_FLAGS: u64 = 0x67;
    const FAULT_PAGE: usize = 0x7f00_1234_5000;
    const SHADOW_PAGE: usize = 0x7f00_9999_0000;

    /// In-process stand-in for the kernel page-table facility.
    struct SimulatedTranslator {
        table: usize,
        updates: Mutex<Vec<(usize, TranslationEntry)>>,
        invalidations: Mutex<Vec<usize>>,
        fail_update: bool,
    }

    impl SimulatedTranslator {
        fn new(table: &mut [u64], fail_update: bool) -> Self {
            Self {
                table: table.as_mut_ptr() as usize,
                updates: Mutex::new(Vec::new()),
                invalidations: Mutex::new(Vec::new()),
                fail_update,
            }
        }
    }

    impl AddressTranslator for SimulatedTranslator {
        fn resolve(&self, vaddr: usize) -> Result<TranslationEntry, TranslateError> {
            let mut entry = TranslationEntry::request(vaddr);
            entry.pmd = (TABLE_PFN << 12) | WRITABLE_FLAGS;
            entry.pte = if vaddr == SHADOW_PAGE {
                (SHADOW_PFN << 12) | WRITABLE_FLAGS
            } else {
                (FILE_PFN << 12) | READ_ONLY_FLAGS
            };
            entry.valid = EntryValid::ALL;
            Ok(entry)
        }

        fn map_table(&self, pfn: u64) -> Result<TableMapping, TranslateError> {
            assert_eq!(pfn, TABLE_PFN);
            let base = NonNull::new(self.table as *mut u64).unwrap();
            Ok(unsafe { TableMapping::borrowed(base, 512) })
        }

        fn update(&self, vaddr: usize, entry: &TranslationEntry) -> Result<(), TranslateError> {
            if self.fail_update {
                return Err(TranslateError::Update {
                    address: vaddr,
                    errno: 1,
                });
            }
            self.updates.lock().push((vaddr, *entry));
            Ok(())
        }

        fn invalidate(&self, vaddr: usize) -> Result<(), TranslateError> {
            self.invalidations.lock().push(vaddr);
            Ok(())
        }
    }

    fn populated_table() -> Vec<u64> {
        let mut table = vec![0u64; PAGE_SIZE / 8];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = ((FILE_PFN + i as u64) << 12) | READ_ONLY_FLAGS;
        }
        table
    }

    #[test]
    fn rewrites_only_the_frame_bits_of_the_leaf() {
        let mut table = populated_table();
        let before = table.clone();
        let rebinder = PageTableRebinder::new(SimulatedTranslator::new(&mut table, false));

        let consumed = unsafe { rebinder.rebind(FAULT_PAGE, SHADOW_PAGE) }.unwrap();
        assert!(!consumed);

        let index = PagingLayout::X86_64_4K.pt_index(FAULT_PAGE);
        assert_eq!(index, (FAULT_PAGE >> 12) & 0x1ff);

        let entry = PageTableEntry::from_raw(table[index]);
        assert_eq!(entry.pfn(), SHADOW_PFN);
        assert_eq!(entry.as_raw() & 0xfff, READ_ONLY_FLAGS);

        for (i, (now, was)) in table.iter().zip(&before).enumerate() {
            if i != index {
                assert_eq!(now, was, "entry {} changed", i);
            }
        }
    }

    #[test]
    fn publishes_shadow_leaf_and_invalidates_fault_page() {
        let mut table = populated_table();
        let rebinder = PageTableRebinder::new(SimulatedTranslator::new(&mut table, false));

        unsafe { rebinder.rebind(FAULT_PAGE, SHADOW_PAGE) }.unwrap();

        let updates = rebinder.translator().updates.lock();
        assert_eq!(updates.len(), 1);
        let (vaddr, published) = updates[0];
        assert_eq!(vaddr, FAULT_PAGE);
        assert_eq!(published.pte().pfn(), SHADOW_PFN);
        assert!(published.pte().is_writable());
        assert_eq!(published.valid, EntryValid::PTE);

        assert_eq!(*rebinder.translator().invalidations.lock(), vec![FAULT_PAGE]);
    }

    #[test]
    fn failed_update_restores_the_old_entry() {
        let mut table = populated_table();
        let before = table.clone();
        let rebinder = PageTableRebinder::new(SimulatedTranslator::new(&mut table, true));

        let err = unsafe { rebinder.rebind(FAULT_PAGE, SHADOW_PAGE) }.unwrap_err();
        assert!(matches!(
            err,
            RedirectFault::Translate(TranslateError::Update { .. })
        ));
        assert_eq!(table, before);
    }
}
