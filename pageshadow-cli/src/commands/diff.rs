//! Diff command - byte-wise comparison of two files.
//!
//! Exit status follows `diff(1)`: 0 identical, 1 different, 2 trouble.

use pageshadow_core::diff::diff_files;
use std::path::Path;
use std::process::ExitCode;

const IDENTICAL: u8 = 0;
const DIFFERENT: u8 = 1;
const TROUBLE: u8 = 2;

/// Run the diff command.
pub fn run(left: &Path, right: &Path) -> ExitCode {
    ExitCode::from(compare(left, right))
}

fn compare(left: &Path, right: &Path) -> u8 {
    let diff = match diff_files(left, right) {
        Ok(diff) => diff,
        Err(e) => {
            tracing::error!(left = %left.display(), right = %right.display(), "Diff failed: {}", e);
            return TROUBLE;
        }
    };

    println!("--- {}", left.display());
    println!("+++ {}", right.display());
    print!("{}", diff);

    if diff.is_identical() {
        IDENTICAL
    } else {
        tracing::debug!(bytes = diff.differing_bytes(), ranges = diff.ranges.len(), "Files differ");
        DIFFERENT
    }
}
