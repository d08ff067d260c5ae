//! Init command - create the working directory layout and demo files.

use anyhow::Result;
use pageshadow_core::ShadowConfig;

/// Run the init command.
pub fn run(config: &ShadowConfig) -> Result<()> {
    config.validate()?;

    let workspace = config.workspace();
    let created = workspace.initialize(config.files, config.demo_data.as_bytes())?;

    println!("Initialized {}", workspace.root().display());
    for path in &created {
        println!("  {}", path.display());
    }
    Ok(())
}
