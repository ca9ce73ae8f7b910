//! Structured logging setup.
//!
//! Records go to stdout and, unless stdout is a terminal, to a daily rotating
//! `veddb.<date>.log` under the data directory's `logs` folder. Filter
//! directives come from [`CoreConfig::log_filter`] (`VEDDB_LOG`), then
//! `RUST_LOG`, then a build-type default.

use crate::config::CoreConfig;
use crate::error::VeddbError;
use crate::services::storage::init_data_dir;

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// File name prefix of rotated log files.
pub const LOG_FILE_PREFIX: &str = "veddb";

/// Where log records are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    /// Colored stdout only
    Terminal,
    /// Stdout at INFO and above, plus every record in daily files under the directory
    Files(PathBuf),
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Destination of log records
    pub output: LogOutput,
    /// Filter directives overriding `RUST_LOG`
    pub filter: Option<String>,
}

impl LogConfig {
    /// Derive logging from the core configuration.
    pub fn from_core(config: &CoreConfig) -> Self {
        Self::for_stdout(config, atty::is(atty::Stream::Stdout))
    }

    fn for_stdout(config: &CoreConfig, stdout_is_terminal: bool) -> Self {
        let output = if stdout_is_terminal {
            LogOutput::Terminal
        } else {
            LogOutput::Files(config.log_dir())
        };
        Self { output, filter: config.log_filter.clone() }
    }
}

/// Guard that must be held for the lifetime of the application.
///
/// Dropping this guard flushes pending log entries.
pub struct LoggingGuard {
    _worker_guard: Option<WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Directory receiving log files, if file logging is active.
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Install the global subscriber.
///
/// When the log directory cannot be used, logging continues on stdout only.
pub fn init_logging(config: LogConfig) -> LoggingGuard {
    let filter = config.filter.as_deref();
    let log_dir = match config.output {
        LogOutput::Terminal => return init_terminal_logging(filter),
        LogOutput::Files(log_dir) => log_dir,
    };

    match init_file_logging(&log_dir, filter) {
        Ok(guard) => {
            tracing::info!(log_dir = %log_dir.display(), "File logging initialized");
            LoggingGuard { _worker_guard: Some(guard), log_dir: Some(log_dir) }
        }
        Err(e) => {
            eprintln!("Warning: {e}. Logging to the console only.");
            init_terminal_logging(filter)
        }
    }
}

/// Initialize logging from `VEDDB_*` environment configuration.
pub fn init_logging_default() -> LoggingGuard {
    let config = CoreConfig::from_env().unwrap_or_default();
    init_logging(LogConfig::from_core(&config))
}

fn init_terminal_logging(filter: Option<&str>) -> LoggingGuard {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(filter))
        .with_ansi(true)
        .with_target(false)
        .try_init();

    LoggingGuard { _worker_guard: None, log_dir: None }
}

fn init_file_logging(log_dir: &Path, filter: Option<&str>) -> Result<WorkerGuard, VeddbError> {
    let (non_blocking, guard) = tracing_appender::non_blocking(open_log_file(log_dir)?);
    let stdout = std::io::stdout.with_max_level(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_writer(stdout.and(non_blocking))
        .with_env_filter(build_env_filter(filter))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| VeddbError::internal(format!("Failed to install log subscriber: {e}")))?;

    Ok(guard)
}

/// Open the daily rolling log file in `log_dir`, creating the directory.
fn open_log_file(log_dir: &Path) -> Result<RollingFileAppender, VeddbError> {
    init_data_dir(log_dir)?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(log_dir)
        .map_err(|e| {
            VeddbError::storage(
                format!("Failed to open log file in '{}': {e}", log_dir.display()),
                Some("Check that the log directory is writable"),
            )
        })
}

fn build_env_filter(custom_filter: Option<&str>) -> EnvFilter {
    if let Some(filter) = custom_filter {
        return EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(default_log_filter()));
    }

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_log_filter()))
}

/// Get the default log filter based on build type.
pub fn default_log_filter() -> &'static str {
    #[cfg(debug_assertions)]
    {
        "debug,veddb_core=trace,rusqlite=warn"
    }
    #[cfg(not(debug_assertions))]
    {
        "info,veddb_core=info,rusqlite=warn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(default_log_filter()).is_ok());
    }

    #[test]
    fn test_custom_filter_wins() {
        let filter = build_env_filter(Some("warn"));
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn test_output_follows_terminal() {
        let core = CoreConfig::default()
            .with_data_dir("/var/lib/veddb")
            .with_log_filter("veddb_core=debug");

        let piped = LogConfig::for_stdout(&core, false);
        assert_eq!(piped.output, LogOutput::Files(PathBuf::from("/var/lib/veddb/logs")));
        assert_eq!(piped.filter.as_deref(), Some("veddb_core=debug"));

        let terminal = LogConfig::for_stdout(&core, true);
        assert_eq!(terminal.output, LogOutput::Terminal);
    }

    #[test]
    fn test_log_file_lands_in_log_dir() {
        let dir = tempdir().unwrap();
        let log_dir = CoreConfig::default().with_data_dir(dir.path()).log_dir();

        let mut appender = open_log_file(&log_dir).unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = std::fs::read_dir(&log_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with(LOG_FILE_PREFIX));
        assert!(names[0].ends_with(".log"));
    }

    #[test]
    fn test_unusable_log_dir_is_reported() {
        let dir = tempdir().unwrap();
        let occupied = dir.path().join("logs");
        std::fs::write(&occupied, b"not a directory").unwrap();

        let err = open_log_file(&occupied).unwrap_err();
        assert_eq!(err.category(), "Storage");
        assert!(init_file_logging(&occupied, None).is_err());
    }
}
