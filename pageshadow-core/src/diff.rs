//! Byte-wise file comparison.

use crate::error::{Result, ShadowError};
use std::fmt;
use std::path::Path;

/// A maximal run of differing bytes at the same offset in both files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRange {
    /// Offset of the first differing byte.
    pub offset: u64,
    /// Bytes of the left file in the run.
    pub left: Vec<u8>,
    /// Bytes of the right file in the run.
    pub right: Vec<u8>,
}

impl DiffRange {
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

/// Differences between two files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub left_len: u64,
    pub right_len: u64,
    /// Differing runs within the common length.
    pub ranges: Vec<DiffRange>,
}

impl FileDiff {
    /// True when both files have the same length and bytes.
    pub fn is_identical(&self) -> bool {
        self.ranges.is_empty() && self.left_len == self.right_len
    }

    /// Total differing bytes within the common length.
    pub fn differing_bytes(&self) -> usize {
        self.ranges.iter().map(DiffRange::len).sum()
    }
}

/// Compare two byte slices.
pub fn diff_bytes(left: &[u8], right: &[u8]) -> FileDiff {
    let mut ranges: Vec<DiffRange> = Vec::new();
    let mut open: Option<usize> = None;

    let common = left.len().min(right.len());
    for i in 0..=common {
        let differs = i < common && left[i] != right[i];
        match (differs, open) {
            (true, None) => open = Some(i),
            (false, Some(start)) => {
                ranges.push(DiffRange {
                    offset: start as u64,
                    left: left[start..i].to_vec(),
                    right: right[start..i].to_vec(),
                });
                open = None;
            }
            _ => {}
        }
    }

    FileDiff {
        left_len: left.len() as u64,
        right_len: right.len() as u64,
        ranges,
    }
}

/// Compare the files at `left` and `right`.
pub fn diff_files(left: impl AsRef<Path>, right: impl AsRef<Path>) -> Result<FileDiff> {
    let left = left.as_ref();
    let right = right.as_ref();
    let a = std::fs::read(left).map_err(|e| ShadowError::io(left, e))?;
    let b = std::fs::read(right).map_err(|e| ShadowError::io(right, e))?;
    Ok(diff_bytes(&a, &b))
}

impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identical() {
            return writeln!(f, "files are identical ({} bytes)", self.left_len);
        }
        for range in &self.ranges {
            writeln!(
                f,
                "@{} ({} bytes): < {:?} > {:?}",
                range.offset,
                range.len(),
                String::from_utf8_lossy(&range.left),
                String::from_utf8_lossy(&range.right)
            )?;
        }
        if self.left_len != self.right_len {
            writeln!(f, "length: < {} > {}", self.left_len, self.right_len)?;
        }
        Ok(())
    }
}
