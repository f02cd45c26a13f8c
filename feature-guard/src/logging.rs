//! Logging configuration for feature-guard.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the application. [`setup::init_logging`] is a convenience for binaries and
//! tests that want sensible defaults.
//!
//! Per-feature and per-merge events are emitted at `DEBUG` under their module
//! targets, so [`LogConfig`] controls them through filter directives rather
//! than runtime checks on the hot path.

use tracing::Level;

const CRATE_TARGET: &str = "feature_guard";
const FEATURE_DETAIL_TARGETS: &[&str] = &[
    "feature_guard::statistics::accumulator",
    "feature_guard::schema::inference",
    "feature_guard::validation::validator",
];
const MERGE_TARGETS: &[&str] = &[
    "feature_guard::statistics::dataset",
    "feature_guard::statistics::substrate",
];

/// Logging configuration for feature-guard components.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for feature-guard components
    pub base_level: Level,
    /// Whether to log per-feature events (type conflicts, skipped domains, findings)
    pub log_feature_details: bool,
    /// Whether to log shard processing and merges
    pub log_merges: bool,
    /// Maximum length for logged field values such as sample values
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_feature_details: false,
            log_merges: false,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Creates a verbose configuration suitable for debugging.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_feature_details: true,
            log_merges: true,
            max_field_length: 1024,
        }
    }

    /// Creates a minimal configuration for production.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_feature_details: false,
            log_merges: false,
            max_field_length: 128,
        }
    }

    /// Creates a balanced configuration suitable for most use cases.
    pub fn balanced() -> Self {
        Self::default()
    }

    /// Filter directives enabling exactly the configured events.
    pub fn directives(&self) -> Vec<String> {
        let mut directives = vec![format!("{CRATE_TARGET}={}", level_name(self.base_level))];
        if self.base_level < Level::DEBUG {
            if self.log_feature_details {
                directives.extend(FEATURE_DETAIL_TARGETS.iter().map(|t| format!("{t}=debug")));
            }
            if self.log_merges {
                directives.extend(MERGE_TARGETS.iter().map(|t| format!("{t}=debug")));
            }
        } else {
            if !self.log_feature_details {
                directives.extend(FEATURE_DETAIL_TARGETS.iter().map(|t| format!("{t}=info")));
            }
            if !self.log_merges {
                directives.extend(MERGE_TARGETS.iter().map(|t| format!("{t}=info")));
            }
        }
        directives
    }

    /// Truncates a logged value to `max_field_length`.
    pub fn truncate<'a>(&self, value: &'a str) -> std::borrow::Cow<'a, str> {
        truncate_field(value, self.max_field_length)
    }
}

fn level_name(level: Level) -> String {
    level.as_str().to_lowercase()
}

/// Truncates a string to at most `max_length` bytes on a character boundary.
pub fn truncate_field(value: &str, max_length: usize) -> std::borrow::Cow<'_, str> {
    if value.len() <= max_length {
        return std::borrow::Cow::Borrowed(value);
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    std::borrow::Cow::Owned(format!("{}...(truncated)", &value[..end]))
}

/// Subscriber setup for applications and tests.
pub mod setup {
    use tracing::Level;

    use super::{level_name, LogConfig};

    /// Configuration for the global subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for everything outside feature-guard
        pub level: Level,
        /// Event selection for feature-guard itself
        pub log_config: LogConfig,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                log_config: LogConfig::default(),
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Creates a configuration for production use.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                log_config: LogConfig::production(),
                json_format: true,
                env_filter: None,
            }
        }

        /// Creates a configuration for development use.
        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                log_config: LogConfig::verbose(),
                json_format: false,
                env_filter: None,
            }
        }

        /// Sets the log level outside feature-guard.
        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        /// Sets the feature-guard event selection.
        pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
            self.log_config = log_config;
            self
        }

        /// Sets whether to use JSON output format.
        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom environment filter.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                return filter.clone();
            }
            let mut directives = vec![level_name(self.level)];
            directives.extend(self.log_config.directives());
            directives.join(",")
        }
    }

    /// Installs a global `fmt` subscriber.
    ///
    /// `RUST_LOG` takes precedence over the configured filter. Fails if a
    /// global subscriber is already installed.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use feature_guard::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(config.env_filter()))?;

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}
