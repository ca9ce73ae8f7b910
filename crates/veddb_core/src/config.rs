//! Core configuration.
//!
//! Defaults can be overridden through the environment:
//! - `VEDDB_DATA_DIR` - directory holding `veddb.db` and logs
//! - `VEDDB_HISTORY_CAPACITY` - number of history records kept
//! - `VEDDB_LOG` - tracing filter directives

use crate::error::VeddbError;
use crate::services::history::DEFAULT_HISTORY_CAPACITY;
use crate::services::storage::default_data_dir;

use std::path::PathBuf;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "VEDDB_DATA_DIR";

/// Environment variable overriding the history capacity.
pub const HISTORY_CAPACITY_ENV: &str = "VEDDB_HISTORY_CAPACITY";

/// Environment variable holding the log filter.
pub const LOG_FILTER_ENV: &str = "VEDDB_LOG";

/// Configuration for [`crate::VeddbState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Application data directory
    pub data_dir: PathBuf,
    /// Maximum number of history records retained
    pub history_capacity: usize,
    /// Tracing filter directives; the build-type default when `None`
    pub log_filter: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            log_filter: None,
        }
    }
}

impl CoreConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, VeddbError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides read through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, VeddbError> {
        let mut config = Self::default();

        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(raw) = lookup(HISTORY_CAPACITY_ENV) {
            let capacity = raw.trim().parse::<usize>().map_err(|_| {
                VeddbError::config(format!("{HISTORY_CAPACITY_ENV} must be a number, got '{raw}'"))
            })?;
            config.history_capacity = capacity;
        }

        config.log_filter = lookup(LOG_FILTER_ENV).filter(|f| !f.trim().is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Set the data directory.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Set the history capacity.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Set the log filter directives.
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), VeddbError> {
        if self.history_capacity == 0 {
            return Err(VeddbError::config("History capacity must be at least 1"));
        }
        if let Some(filter) = &self.log_filter {
            tracing_subscriber::EnvFilter::try_new(filter).map_err(|e| {
                VeddbError::config(format!("{LOG_FILTER_ENV} is not a valid filter: {e}"))
            })?;
        }
        Ok(())
    }

    /// Directory for log files.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
