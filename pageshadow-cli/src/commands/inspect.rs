//! Inspect command - page-table entries behind a mapped file.

use anyhow::{Context, Result};
use pageshadow_core::paging::PAGE_SIZE;
use pageshadow_core::{AddressTranslator, MappedRegion, Pteditor, ShadowConfig};
use std::path::Path;

/// Run the inspect command.
///
/// Maps `source` read-only, touches every page and prints the virtual
/// address, leaf entry and frame number the kernel reports for each.
pub fn run(config: &ShadowConfig, source: &Path) -> Result<()> {
    let translator = Pteditor::open(config.pteditor_paths())
        .context("inspect needs the PTEditor kernel module")?;
    let region = MappedRegion::open(source)?;
    let bytes = region.as_bytes();

    println!("{} ({} bytes, {} pages)", source.display(), region.len(), region.pages());
    println!("{:<18} {:<18} {:<12}", "VADDR", "PTE", "PFN");

    for page in 0..region.pages() {
        let offset = page * PAGE_SIZE;
        // Fault the page in so the walk reaches a leaf.
        std::hint::black_box(bytes[offset]);

        let vaddr = region.base() + offset;
        let entry = translator
            .resolve(vaddr)
            .with_context(|| format!("Failed to resolve {:#x}", vaddr))?;
        let pte = entry.pte();
        println!(
            "{:<#18x} {:<#18x} {:<#12x}",
            vaddr,
            pte.as_raw(),
            pte.pfn()
        );
    }
    Ok(())
}
