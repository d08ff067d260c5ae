//! Logging configuration.

use std::env;
use std::io::IsTerminal;
use std::str::FromStr;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line output.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// How diagnostics are rendered. Events always go to stderr so command output
/// on stdout stays clean.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    log_format: LogFormat,
    /// Filter directives, e.g. `warn` or `info,pageshadow_core=debug`.
    log_filter: String,
    include_location: bool,
    include_target: bool,
    include_thread_names: bool,
    include_thread_ids: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: "warn".to_string(),
            include_location: false,
            include_target: false,
            include_thread_names: false,
            include_thread_ids: false,
        }
    }
}

impl TracingConfig {
    /// Create a new builder.
    pub fn builder() -> TracingConfigBuilder {
        TracingConfigBuilder::default()
    }

    /// Configuration from the environment and a `-v` count.
    ///
    /// - `PAGESHADOW_LOG_FORMAT`: `json`, `pretty` or `compact`; otherwise
    ///   pretty on a terminal and compact elsewhere.
    /// - `RUST_LOG`: filter, overriding the verbosity level.
    /// - `PAGESHADOW_LOG_LOCATION`, `PAGESHADOW_LOG_THREAD_IDS`: `1` or `true`
    ///   to add source locations or thread ids.
    pub fn from_env(verbosity: u8) -> Self {
        let log_format = env::var("PAGESHADOW_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| {
                if std::io::stderr().is_terminal() {
                    LogFormat::Pretty
                } else {
                    LogFormat::Compact
                }
            });

        let log_filter = env::var("RUST_LOG")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| level_for(verbosity).to_string());

        Self {
            log_format,
            log_filter,
            include_location: env_flag("PAGESHADOW_LOG_LOCATION"),
            include_target: verbosity >= 2,
            include_thread_names: false,
            include_thread_ids: env_flag("PAGESHADOW_LOG_THREAD_IDS"),
        }
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    pub fn include_location(&self) -> bool {
        self.include_location
    }

    pub fn include_target(&self) -> bool {
        self.include_target
    }

    pub fn include_thread_names(&self) -> bool {
        self.include_thread_names
    }

    pub fn include_thread_ids(&self) -> bool {
        self.include_thread_ids
    }
}

/// Level directive for a `-v` count.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Builder for [`TracingConfig`].
#[derive(Debug, Clone, Default)]
pub struct TracingConfigBuilder {
    log_format: Option<LogFormat>,
    log_filter: Option<String>,
    include_location: Option<bool>,
    include_target: Option<bool>,
    include_thread_names: Option<bool>,
    include_thread_ids: Option<bool>,
}

impl TracingConfigBuilder {
    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.log_format = Some(format);
        self
    }

    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Set the filter from a `-v` count.
    pub fn verbosity(self, verbosity: u8) -> Self {
        self.log_filter(level_for(verbosity))
    }

    pub fn include_location(mut self, include: bool) -> Self {
        self.include_location = Some(include);
        self
    }

    pub fn include_target(mut self, include: bool) -> Self {
        self.include_target = Some(include);
        self
    }

    pub fn include_thread_names(mut self, include: bool) -> Self {
        self.include_thread_names = Some(include);
        self
    }

    pub fn include_thread_ids(mut self, include: bool) -> Self {
        self.include_thread_ids = Some(include);
        self
    }

    pub fn build(self) -> TracingConfig {
        let defaults = TracingConfig::default();
        TracingConfig {
            log_format: self.log_format.unwrap_or(defaults.log_format),
            log_filter: self.log_filter.unwrap_or(defaults.log_filter),
            include_location: self.include_location.unwrap_or(defaults.include_location),
            include_target: self.include_target.unwrap_or(defaults.include_target),
            include_thread_names: self
                .include_thread_names
                .unwrap_or(defaults.include_thread_names),
            include_thread_ids: self
                .include_thread_ids
                .unwrap_or(defaults.include_thread_ids),
        }
    }
}
