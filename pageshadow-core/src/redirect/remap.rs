//! Userspace rebinding with `mremap`.

use super::{PageRebinder, RedirectFault};
use crate::paging::PAGE_SIZE;
use crate::translator::last_errno;

/// Moves the shadow page over the faulting address.
///
/// `mremap` with `MREMAP_FIXED` atomically replaces whatever was mapped at the
/// target with the shadow page's frame, and the kernel flushes the stale TLB
/// entry as part of the move. The file-backed frame is simply no longer
/// referenced by this address.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemapRebinder;

impl RemapRebinder {
    /// Create a remap rebinder.
    pub fn new() -> Self {
        Self
    }
}

impl PageRebinder for RemapRebinder {
    fn name(&self) -> &'static str {
        "remap"
    }

    unsafe fn rebind(
        &self,
        fault_page: usize,
        shadow_page: usize,
    ) -> std::result::Result<bool, RedirectFault> {
        // SAFETY: the caller guarantees both pages are aligned and owned.
        let moved = unsafe {
            libc::mremap(
                shadow_page as *mut libc::c_void,
                PAGE_SIZE,
                PAGE_SIZE,
                libc::MREMAP_MAYMOVE | libc::MREMAP_FIXED,
                fault_page as *mut libc::c_void,
            )
        };
        if moved == libc::MAP_FAILED {
            return Err(RedirectFault::Remap {
                page: fault_page,
                errno: last_errno(),
            });
        }
        Ok(true)
    }
}
