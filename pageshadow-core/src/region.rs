//! Read-only file mappings whose writes are redirected.

use crate::error::{Result, ShadowError};
use crate::interceptor::FaultInterceptor;
use crate::paging::PagingLayout;
use memmap2::{MmapOptions, MmapRaw};
use std::fs::File;
use std::path::{Path, PathBuf};

/// A file mapped read-only into the process.
///
/// Writes made through [`MappedRegion::write_at`] land on the read-only
/// mapping. The first write to each page raises a permission fault that the
/// [`FaultInterceptor`] turns into a private writable copy, so the backing
/// file never changes.
pub struct MappedRegion {
    map: MmapRaw,
    path: PathBuf,
    name: String,
    interceptor: Option<&'static FaultInterceptor>,
}

impl MappedRegion {
    /// Map `path` read-only without watching it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ShadowError::RegionMap {
                path: path.to_path_buf(),
                cause: "path has no UTF-8 file name".to_string(),
            })?
            .to_string();

        let file = File::open(path).map_err(|e| ShadowError::RegionMap {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;
        let size = file
            .metadata()
            .map_err(|e| ShadowError::RegionMap {
                path: path.to_path_buf(),
                cause: e.to_string(),
            })?
            .len();
        if size == 0 {
            return Err(ShadowError::EmptyRegion {
                path: path.to_path_buf(),
            });
        }

        let map = MmapOptions::new()
            .map_raw_read_only(&file)
            .map_err(|e| ShadowError::RegionMap {
                path: path.to_path_buf(),
                cause: e.to_string(),
            })?;

        tracing::debug!(
            path = %path.display(),
            base = format_args!("{:#x}", map.as_ptr() as usize),
            len = map.len(),
            "Mapped region read-only"
        );

        Ok(Self {
            map,
            path: path.to_path_buf(),
            name,
            interceptor: None,
        })
    }

    /// Map `path` read-only and watch it with `interceptor`.
    pub fn open_watched(
        path: impl AsRef<Path>,
        interceptor: &'static FaultInterceptor,
    ) -> Result<Self> {
        let mut region = Self::open(path)?;
        region.watch(interceptor)?;
        Ok(region)
    }

    /// Register this region with `interceptor` so writes are redirected.
    pub fn watch(&mut self, interceptor: &'static FaultInterceptor) -> Result<()> {
        if self.interceptor.is_some() {
            return Ok(());
        }
        interceptor.watch(self.base(), self.mapped_len())?;
        self.interceptor = Some(interceptor);
        Ok(())
    }

    /// Whether writes to this region are intercepted.
    pub fn is_watched(&self) -> bool {
        self.interceptor.is_some()
    }

    /// Base address of the mapping.
    pub fn base(&self) -> usize {
        self.map.as_ptr() as usize
    }

    /// Length of the region in bytes (the file size at mapping time).
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Always false; empty files are rejected at open.
    pub fn is_empty(&self) -> bool {
        self.map.len() == 0
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name of the backing file.
    pub fn file_name(&self) -> &str {
        &self.name
    }

    /// Number of pages the mapping spans.
    pub fn pages(&self) -> usize {
        PagingLayout::X86_64_4K.pages_spanned(0, self.len())
    }

    fn mapped_len(&self) -> usize {
        self.pages() * PagingLayout::X86_64_4K.page_size()
    }

    /// Current content as seen by this process, redirected pages included.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: the mapping is live for `self`'s lifetime and only mutated
        // through `&mut self`.
        unsafe { std::slice::from_raw_parts(self.map.as_ptr(), self.map.len()) }
    }

    /// Check that `[offset, offset + length)` lies inside the region.
    pub fn check_bounds(&self, offset: u64, length: usize) -> Result<()> {
        let region_size = self.len() as u64;
        let fits = offset
            .checked_add(length as u64)
            .is_some_and(|end| end <= region_size);
        if !fits {
            return Err(ShadowError::OutOfBounds {
                offset,
                length: length as u64,
                region_size,
            });
        }
        Ok(())
    }

    /// Copy `payload` into the region at `offset`.
    ///
    /// The region must be watched; otherwise the write would kill the process
    /// with an unhandled fault.
    pub fn write_at(&mut self, offset: u64, payload: &[u8]) -> Result<()> {
        self.check_bounds(offset, payload.len())?;
        if self.interceptor.is_none() {
            return Err(ShadowError::RegionNotWatched {
                path: self.path.clone(),
            });
        }
        // SAFETY: bounds were checked above and the mapping is live. Pages
        // that are still read-only fault and are redirected before the store
        // retries.
        unsafe {
            std::ptr::copy_nonoverlapping(
                payload.as_ptr(),
                self.map.as_mut_ptr().add(offset as usize),
                payload.len(),
            );
        }
        Ok(())
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        if let Some(interceptor) = self.interceptor.take() {
            interceptor.unwatch(self.base(), self.mapped_len());
        }
    }
}

impl std::fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("path", &self.path)
            .field("base", &format_args!("{:#x}", self.base()))
            .field("len", &self.len())
            .field("watched", &self.is_watched())
            .finish()
    }
}
