//! Logging configuration for validation runs.
//!
//! All instrumentation goes through `tracing`. [`LogConfig`] travels with
//! [`ValidateOptions`](crate::config::ValidateOptions) and decides how much
//! a single run logs; [`setup::init_logging`] installs a subscriber for
//! applications that do not bring their own.

use tracing::Level;

/// Per-run logging knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Level below which the `log_*` macros stay silent
    pub base_level: Level,
    /// Whether to log each field's check and outcome
    pub log_check_details: bool,
    /// Whether to log casts and dataset conversions
    pub log_data_operations: bool,
    /// Maximum length of a logged check or value
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_check_details: false,
            log_data_operations: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Logs everything, with long values kept.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_check_details: true,
            log_data_operations: true,
            max_field_length: 1024,
        }
    }

    /// Logs failures only.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_check_details: false,
            log_data_operations: false,
            max_field_length: 128,
        }
    }

    /// Same as [`LogConfig::default`].
    pub fn balanced() -> Self {
        Self::default()
    }

    /// Renders `value` cut to `max_field_length`.
    pub fn truncate(&self, value: &impl std::fmt::Display) -> String {
        truncate_field(&value.to_string(), self.max_field_length)
    }
}

/// Logs per-check detail at debug level when `log_check_details` is set.
#[macro_export]
macro_rules! log_check {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_check_details && $config.base_level >= tracing::Level::DEBUG {
            tracing::debug!($($arg)*);
        }
    };
}

/// Logs a cast or conversion at info level when `log_data_operations` is set.
#[macro_export]
macro_rules! log_data_op {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_data_operations && $config.base_level >= tracing::Level::INFO {
            tracing::info!($($arg)*);
        }
    };
}

/// Truncates `value` to at most `max_length` bytes, on a char boundary.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Subscriber installation for binaries and tests.
pub mod setup {
    use crate::prelude::*;
    use tracing::Level;

    /// Settings for [`init_logging`].
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Level for everything outside this crate
        pub level: Level,
        /// Level for `iudex` targets
        pub iudex_level: Level,
        /// Emit JSON lines instead of human-readable text
        pub json_format: bool,
        /// Explicit filter, used instead of the levels above
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                iudex_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// JSON output, warnings from dependencies, info from this crate.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                iudex_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Debug everywhere, human-readable.
        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                iudex_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        /// Sets the level for other crates.
        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        /// Sets the level for this crate.
        pub fn with_iudex_level(mut self, level: Level) -> Self {
            self.iudex_level = level;
            self
        }

        /// Sets whether to emit JSON lines.
        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom filter directive.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// The filter directive, e.g. `info,iudex=debug`.
        pub fn env_filter(&self) -> String {
            match &self.env_filter {
                Some(filter) => filter.clone(),
                None => format!(
                    "{},iudex={}",
                    self.level.as_str().to_lowercase(),
                    self.iudex_level.as_str().to_lowercase()
                ),
            }
        }
    }

    /// Installs a global `tracing` subscriber. `RUST_LOG` takes precedence
    /// over the configured filter.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use iudex::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(config.env_filter()))
            .map_err(|e| IudexError::Configuration(format!("invalid log filter: {e}")))?;

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| IudexError::Configuration(format!("logging already initialized: {e}")))
    }
}
