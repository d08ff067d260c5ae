//! Structured logging setup.
//!
//! Everything outside the fault handler reports through `tracing`. The binary
//! builds a [`TracingConfig`] from its `-v` count and the environment, then
//! calls [`init_tracing`] once and keeps the returned guard alive.
//!
//! ```ignore
//! use pageshadow_core::observability::{TracingConfig, init_tracing};
//!
//! let _guard = init_tracing(TracingConfig::from_env(1))?;
//! ```

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig, TracingConfigBuilder, level_for};
pub use tracing_setup::{TracingGuard, init_tracing};
