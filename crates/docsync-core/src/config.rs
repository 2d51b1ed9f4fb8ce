//! Configuration
//!
//! Loaded from TOML. Every section and field has a default, so an empty file
//! is a valid configuration.
//!
//! ```toml
//! [document]
//! title = "Dashboard"
//! event_capacity = 512
//!
//! [scheduler]
//! tick_interval_ms = 20
//! max_callbacks_per_tick = 64
//!
//! [logging]
//! filter = "docsync=debug"
//! json = false
//! ```

use crate::document::DEFAULT_TITLE;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocsyncConfig {
    /// New-document settings
    pub document: DocumentConfig,
    /// Tick scheduler settings
    pub scheduler: SchedulerConfig,
    /// Tracing subscriber settings
    pub logging: LoggingConfig,
}

impl DocsyncConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// - `ConfigError::Parse` for malformed TOML or unknown fields
    /// - `ConfigError::Invalid` for out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`DocsyncConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.tick_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.scheduler.max_callbacks_per_tick == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.max_callbacks_per_tick must be greater than zero".to_string(),
            ));
        }
        if self.document.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "document.event_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// With scheduler settings
    #[inline]
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// With logging settings
    #[inline]
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }
}

/// Settings for new documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentConfig {
    /// Initial title
    pub title: String,
    /// Change-event broadcast buffer; slow subscribers lag past this
    pub event_capacity: usize,
}

impl DocumentConfig {
    /// With initial title
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// With event buffer size
    #[inline]
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            event_capacity: 256,
        }
    }
}

/// Tick scheduler settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Time between ticks in milliseconds
    pub tick_interval_ms: u64,
    /// Upper bound on callbacks fired in a single tick
    pub max_callbacks_per_tick: usize,
}

impl SchedulerConfig {
    /// Tick interval as a duration
    #[inline]
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// With tick interval, in whole milliseconds of at least 1
    #[inline]
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = u64::try_from(interval.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        self
    }

    /// With per-tick callback limit
    #[inline]
    #[must_use]
    pub fn with_max_callbacks_per_tick(mut self, max: usize) -> Self {
        self.max_callbacks_per_tick = max;
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10,
            max_callbacks_per_tick: 1024,
        }
    }
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `info,docsync_core=debug`
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl LoggingConfig {
    /// With filter directives
    #[inline]
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// With JSON output
    #[inline]
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}
