//! Page redirection: give a faulting read-only page a private writable twin.
//!
//! [`PageRedirector::redirect`] runs the whole sequence for one page:
//!
//! 1. allocate an anonymous read-write page,
//! 2. copy the faulting page into it (before any translation changes),
//! 3. ensure the copy is read-write,
//! 4. rebind the faulting address onto the copy through a [`PageRebinder`].
//!
//! Two rebinders exist. [`PageTableRebinder`] edits the leaf page-table entry
//! through an [`AddressTranslator`](crate::translator::AddressTranslator).
//! [`RemapRebinder`] moves the copy over the faulting address with `mremap`,
//! which needs no kernel module.
//!
//! Everything here may run inside the write-fault handler. Nothing allocates,
//! logs or takes a lock, and failures are reported as the `Copy` type
//! [`RedirectFault`].

mod page_table;
mod remap;

pub use page_table::PageTableRebinder;
pub use remap::RemapRebinder;

use crate::error::{Result, ShadowError};
use crate::paging::PagingLayout;
use crate::translator::{Pteditor, PteditorPaths, TranslateError, last_errno};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failure while redirecting a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RedirectFault {
    /// The shadow page could not be allocated.
    #[error("shadow page allocation failed (errno {errno})")]
    Allocate {
        /// OS error number.
        errno: i32,
    },

    /// The shadow page could not be made read-write.
    #[error("shadow page permission change failed (errno {errno})")]
    Protect {
        /// OS error number.
        errno: i32,
    },

    /// A page-table operation failed.
    #[error("page-table edit failed: {0}")]
    Translate(#[from] TranslateError),

    /// The leaf index fell outside the mapped page table.
    #[error("leaf index {index} outside page table")]
    TableIndex {
        /// The computed index.
        index: usize,
    },

    /// Moving the shadow page over the faulting address failed.
    #[error("remap of shadow page onto {page:#x} failed (errno {errno})")]
    Remap {
        /// The faulting page.
        page: usize,
        /// OS error number.
        errno: i32,
    },
}

impl RedirectFault {
    /// Fixed diagnostic for the signal-handler fatal path.
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Allocate { .. } => "pageshadow: fatal: shadow page allocation failed\n",
            Self::Protect { .. } => "pageshadow: fatal: shadow page permission change failed\n",
            Self::Translate(_) => "pageshadow: fatal: page-table edit failed\n",
            Self::TableIndex { .. } => "pageshadow: fatal: leaf index outside page table\n",
            Self::Remap { .. } => "pageshadow: fatal: shadow page remap failed\n",
        }
    }
}

/// Retargets a faulting virtual page onto a shadow page.
pub trait PageRebinder: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Make `fault_page` translate to the frame backing `shadow_page`.
    ///
    /// Returns `true` if the shadow mapping was consumed (moved onto
    /// `fault_page`) and must not be unmapped by the caller.
    ///
    /// # Safety
    ///
    /// Both addresses must be page aligned. `fault_page` must belong to a
    /// mapping owned by the caller and `shadow_page` must be a private
    /// anonymous page holding the copied content.
    unsafe fn rebind(
        &self,
        fault_page: usize,
        shadow_page: usize,
    ) -> std::result::Result<bool, RedirectFault>;
}

/// Drives the allocate, copy and rebind sequence for one faulting page.
pub struct PageRedirector {
    layout: PagingLayout,
    rebinder: Box<dyn PageRebinder>,
}

impl PageRedirector {
    /// Create a redirector using the x86-64 4 KiB layout.
    pub fn new(rebinder: Box<dyn PageRebinder>) -> Self {
        Self {
            layout: PagingLayout::X86_64_4K,
            rebinder,
        }
    }

    /// The paging layout in use.
    pub fn layout(&self) -> PagingLayout {
        self.layout
    }

    /// Name of the rebinder in use.
    pub fn rebinder_name(&self) -> &'static str {
        self.rebinder.name()
    }

    /// Redirect the page at `fault_page` onto a fresh private copy.
    ///
    /// On failure the shadow page is released and the original translation is
    /// left as it was.
    ///
    /// # Safety
    ///
    /// `fault_page` must be page aligned and readable for a full page, and
    /// must belong to a mapping the caller owns.
    pub unsafe fn redirect(&self, fault_page: usize) -> std::result::Result<(), RedirectFault> {
        let page_size = self.layout.page_size();

        // SAFETY: anonymous private mapping; the result is checked.
        let shadow = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                page_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if shadow == libc::MAP_FAILED {
            return Err(RedirectFault::Allocate {
                errno: last_errno(),
            });
        }

        // The old translation still backs reads of `fault_page` here.
        // SAFETY: both ranges are a full page and do not overlap.
        unsafe {
            std::ptr::copy_nonoverlapping(fault_page as *const u8, shadow.cast::<u8>(), page_size);
        }

        // SAFETY: `shadow` is the page mapped above.
        if unsafe { libc::mprotect(shadow, page_size, libc::PROT_READ | libc::PROT_WRITE) } != 0 {
            let errno = last_errno();
            // SAFETY: releasing the page we mapped.
            unsafe { libc::munmap(shadow, page_size) };
            return Err(RedirectFault::Protect { errno });
        }

        // SAFETY: forwarded from the caller; `shadow` satisfies the rebinder
        // contract.
        match unsafe { self.rebinder.rebind(fault_page, shadow as usize) } {
            Ok(_) => Ok(()),
            Err(fault) => {
                // SAFETY: the rebinder rolled back, so nothing refers to it.
                unsafe { libc::munmap(shadow, page_size) };
                Err(fault)
            }
        }
    }
}

impl fmt::Debug for PageRedirector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageRedirector")
            .field("layout", &self.layout)
            .field("rebinder", &self.rebinder.name())
            .finish()
    }
}

/// How faulting pages are rebound onto their shadow copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebindStrategy {
    /// Use PTEditor when its device exists, otherwise `mremap`.
    #[default]
    Auto,
    /// Edit page-table entries through PTEditor.
    Pteditor,
    /// Move the shadow page with `mremap`.
    Remap,
}

impl FromStr for RebindStrategy {
    type Err = ShadowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "pteditor" => Ok(Self::Pteditor),
            "remap" => Ok(Self::Remap),
            other => Err(ShadowError::ConfigValue {
                field: "rebind".to_string(),
                cause: format!("unknown strategy '{}', expected auto, pteditor or remap", other),
            }),
        }
    }
}

impl fmt::Display for RebindStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Pteditor => write!(f, "pteditor"),
            Self::Remap => write!(f, "remap"),
        }
    }
}

impl RebindStrategy {
    /// Build the rebinder this strategy selects.
    pub fn build(self, paths: &PteditorPaths) -> Result<Box<dyn PageRebinder>> {
        let use_pteditor = match self {
            Self::Pteditor => true,
            Self::Remap => false,
            Self::Auto => Pteditor::is_available(paths),
        };

        if use_pteditor {
            let translator = Pteditor::open(paths.clone())?;
            Ok(Box::new(PageTableRebinder::new(translator)))
        } else {
            Ok(Box::new(RemapRebinder::new()))
        }
    }
}
