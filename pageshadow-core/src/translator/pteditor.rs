//! PTEditor-backed translator.
//!
//! Talks to the PTEditor kernel module through `ioctl` on its character
//! device and maps physical page-table frames through its `umem` interface
//! (or `/dev/mem` when `umem` is not available).

use super::{AddressTranslator, TableMapping, TranslateError, last_errno};
use crate::error::{Result, ShadowError};
use crate::paging::{EntryValid, PAGE_SIZE, TranslationEntry};
use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

const PTEDITOR_IOCTL_MAGIC: u64 = 0x3d17;

/// `_IOR(PTEDITOR_IOCTL_MAGIC, nr, size_t)`.
const fn ior(nr: u64) -> u64 {
    (2 << 30) | ((std::mem::size_of::<usize>() as u64) << 16) | (PTEDITOR_IOCTL_MAGIC << 8) | nr
}

const CMD_VM_RESOLVE: u64 = ior(1);
const CMD_VM_UPDATE: u64 = ior(2);
const CMD_INVALIDATE_TLB: u64 = ior(10);

/// Device paths used by [`Pteditor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PteditorPaths {
    /// The PTEditor control device.
    pub device: PathBuf,
    /// Physical memory device used to map page-table frames.
    pub physical_memory: PathBuf,
}

impl Default for PteditorPaths {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/pteditor"),
            physical_memory: PathBuf::from("/proc/umem"),
        }
    }
}

/// Translator backed by the PTEditor kernel module.
pub struct Pteditor {
    device: File,
    physical_memory: File,
    paths: PteditorPaths,
}

impl Pteditor {
    /// Open the PTEditor device and a physical memory device.
    ///
    /// Falls back to `/dev/mem` when the configured physical memory device
    /// cannot be opened.
    pub fn open(paths: PteditorPaths) -> Result<Self> {
        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&paths.device)
            .map_err(|e| ShadowError::TranslatorUnavailable {
                device: paths.device.clone(),
                cause: e.to_string(),
            })?;

        let physical_memory = match open_rw(&paths.physical_memory) {
            Ok(file) => file,
            Err(primary) => {
                tracing::debug!(
                    device = %paths.physical_memory.display(),
                    error = %primary,
                    "Physical memory device unavailable, falling back to /dev/mem"
                );
                open_rw(Path::new("/dev/mem")).map_err(|e| {
                    ShadowError::TranslatorUnavailable {
                        device: paths.physical_memory.clone(),
                        cause: format!("{}; /dev/mem: {}", primary, e),
                    }
                })?
            }
        };

        tracing::info!(device = %paths.device.display(), "Opened page-table facility");

        Ok(Self {
            device,
            physical_memory,
            paths,
        })
    }

    /// Check whether the PTEditor device node exists.
    pub fn is_available(paths: &PteditorPaths) -> bool {
        paths.device.exists()
    }

    /// The paths this translator was opened with.
    pub fn paths(&self) -> &PteditorPaths {
        &self.paths
    }

    fn ioctl(&self, request: u64, arg: usize) -> i32 {
        // SAFETY: the PTEditor commands used here take either a pointer to a
        // `ptedit_entry_t` or a plain address, both passed as `size_t`.
        unsafe { libc::ioctl(self.device.as_raw_fd(), request as _, arg) }
    }
}

impl AddressTranslator for Pteditor {
    fn resolve(&self, vaddr: usize) -> std::result::Result<TranslationEntry, TranslateError> {
        let mut entry = TranslationEntry::request(vaddr);
        let rc = self.ioctl(CMD_VM_RESOLVE, &mut entry as *mut TranslationEntry as usize);
        if rc != 0 {
            return Err(TranslateError::Resolve {
                address: vaddr,
                errno: last_errno(),
            });
        }
        Ok(entry)
    }

    fn map_table(&self, pfn: u64) -> std::result::Result<TableMapping, TranslateError> {
        let offset = pfn * PAGE_SIZE as u64;
        // SAFETY: mapping a single page of the physical memory device; the
        // result is checked before use.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                PAGE_SIZE,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                self.physical_memory.as_raw_fd(),
                offset as libc::off_t,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(TranslateError::MapTable {
                pfn,
                errno: last_errno(),
            });
        }
        let base = NonNull::new(ptr.cast::<u64>()).ok_or(TranslateError::MapTable { pfn, errno: 0 })?;
        let entries = self.layout().entries_per_table();
        // SAFETY: `base` is a fresh PAGE_SIZE mapping owned by the result.
        Ok(unsafe { TableMapping::mapped(base, entries, PAGE_SIZE) })
    }

    fn update(
        &self,
        vaddr: usize,
        entry: &TranslationEntry,
    ) -> std::result::Result<(), TranslateError> {
        let mut request = *entry;
        request.pid = 0;
        request.vaddr = vaddr;
        if request.valid == EntryValid::default() {
            request.valid = EntryValid::PTE;
        }
        let rc = self.ioctl(CMD_VM_UPDATE, &mut request as *mut TranslationEntry as usize);
        if rc != 0 {
            return Err(TranslateError::Update {
                address: vaddr,
                errno: last_errno(),
            });
        }
        Ok(())
    }

    fn invalidate(&self, vaddr: usize) -> std::result::Result<(), TranslateError> {
        if self.ioctl(CMD_INVALIDATE_TLB, vaddr) != 0 {
            return Err(TranslateError::Invalidate {
                address: vaddr,
                errno: last_errno(),
            });
        }
        Ok(())
    }
}

fn open_rw(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().read(true).write(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ioctl_request_codes() {
        // _IOR(0x3d17, 1, size_t) on a 64-bit target.
        assert_eq!(CMD_VM_RESOLVE, 0x8008_0000 | (0x3d17 << 8) | 1);
        assert_eq!(CMD_VM_UPDATE & 0xff, 2);
        assert_eq!(CMD_INVALIDATE_TLB & 0xff, 10);
    }

    #[test]
    fn open_reports_missing_device() {
        let paths = PteditorPaths {
            device: PathBuf::from("/nonexistent/pteditor"),
            physical_memory: PathBuf::from("/nonexistent/umem"),
        };
        assert!(!Pteditor::is_available(&paths));
        let err = Pteditor::open(paths).err().unwrap();
        assert_eq!(err.code(), "E201");
    }
}
