//! CLI command implementations.

pub mod bench;
pub mod diff;
pub mod init;
pub mod inspect;
pub mod merge;
pub mod merge_all;
pub mod test;
pub mod worker;

use pageshadow_core::ShadowConfig;
use pageshadow_core::redirect::RebindStrategy;

/// Apply the flags shared by `test` and `worker`.
pub fn apply_overrides(
    config: ShadowConfig,
    files: Option<usize>,
    rebind: Option<RebindStrategy>,
    serialize: bool,
) -> ShadowConfig {
    let config = match files {
        Some(files) => config.with_files(files),
        None => config,
    };
    let config = match rebind {
        Some(rebind) => config.with_rebind(rebind),
        None => config,
    };
    if serialize {
        config.with_serialize_workers(true)
    } else {
        config
    }
}
