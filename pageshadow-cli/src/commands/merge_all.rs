//! Merge-all command - replay every write log of a source file.

use anyhow::Result;
use pageshadow_core::ShadowConfig;
use std::path::Path;

/// Run the merge_all command.
pub fn run(config: &ShadowConfig, source: &Path) -> Result<()> {
    let engine = config.workspace().merge_engine();
    tracing::info!(
        source = %source.display(),
        logs = %engine.log_root().display(),
        "Merging all logs"
    );

    let report = engine.merge_all(source)?;

    println!(
        "Merged {} entries from {} logs into {}",
        report.applied,
        report.logs.len(),
        report.output.display()
    );
    for log in &report.logs {
        println!("  {}", log.display());
    }
    if report.skipped > 0 {
        println!("Skipped {} unreadable entries", report.skipped);
    }
    Ok(())
}
