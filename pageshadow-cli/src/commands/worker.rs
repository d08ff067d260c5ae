//! Worker command - one process's redirected, logged writes.

use anyhow::{Context, Result};
use pageshadow_core::redirect::PageRedirector;
use pageshadow_core::{FaultInterceptor, MappedRegion, ShadowConfig, WriteLogger};

/// Run the worker command.
///
/// Installs the fault interceptor, maps every demo file read-only and writes
/// the configured payload to each through the write logger.
pub fn run(config: &ShadowConfig, index: usize) -> Result<()> {
    let workspace = config.workspace();
    let _lock = if config.serialize_workers {
        Some(workspace.lock_workers()?)
    } else {
        None
    };

    let rebinder = config
        .rebind
        .build(&config.pteditor_paths())
        .context("Failed to set up page rebinding")?;
    let interceptor = FaultInterceptor::install(PageRedirector::new(rebinder))?;
    let logger = WriteLogger::new(config.journal_config());
    tracing::info!(
        worker = index,
        pid = std::process::id(),
        rebinder = interceptor.rebinder_name(),
        "Worker started"
    );

    let mut regions = Vec::with_capacity(config.files);
    for file in 0..config.files {
        let path = workspace.file_path(file);
        let mut region = MappedRegion::open_watched(&path, interceptor)
            .with_context(|| format!("Failed to map {}", path.display()))?;

        let receipt = logger.record_and_apply(
            &mut region,
            config.write_offset,
            config.write_payload.as_bytes(),
        )?;
        tracing::info!(
            worker = index,
            path = %path.display(),
            offset = receipt.entry.offset,
            length = receipt.entry.length(),
            log = %receipt.log_path.display(),
            "Redirected write logged"
        );
        regions.push(region);
    }

    let stats = interceptor.stats();
    tracing::debug!(
        worker = index,
        faults = stats.faults,
        redirects = stats.redirects,
        forwarded = stats.forwarded,
        regions = interceptor.watched_regions(),
        writes = logger.record_count(),
        "Redirect statistics"
    );
    Ok(())
}
