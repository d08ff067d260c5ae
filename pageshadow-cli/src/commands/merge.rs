//! Merge command - replay one write log onto a copy of its source.

use anyhow::Result;
use pageshadow_core::ShadowConfig;
use std::path::Path;

/// Run the merge command.
pub fn run(config: &ShadowConfig, source: &Path, log: &Path) -> Result<()> {
    tracing::info!(source = %source.display(), log = %log.display(), "Merging log");

    let report = config.workspace().merge_engine().merge(source, log)?;

    println!(
        "Merged {} entries into {}",
        report.applied,
        report.output.display()
    );
    if report.skipped > 0 {
        println!("Skipped {} unreadable entries", report.skipped);
    }
    Ok(())
}
