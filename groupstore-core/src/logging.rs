//! Logging infrastructure for groupstore
//!
//! Logs are written to `<base_dir>/var/log/groupstore.log.<date>` by default.

use crate::config::LoggingConfig;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// File name prefix for log files
pub const LOG_FILE_PREFIX: &str = "groupstore";

/// Initialize the logging system
///
/// Sets up tracing with:
/// - File output under the configured log directory
/// - Daily rotation, keeping at most `max_files` files
/// - Log level from config
pub fn init(config: &LoggingConfig, base_dir: &Path) -> crate::error::Result<LoggingGuard> {
    let log_dir = config.log_dir(base_dir);

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| crate::error::Error::Logging(e.to_string()))?;

    // Non-blocking writer for better performance
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| crate::error::Error::Logging(format!("invalid log level: {}", e)))?;

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::error::Error::Logging(e.to_string()))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Initialize logging for tests (logs to stdout)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any pending log writes.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_under_base() {
        let dir = LoggingConfig::default().log_dir(Path::new("/tmp/app"));
        assert_eq!(dir, std::path::PathBuf::from("/tmp/app/var/log"));
    }

    #[test]
    fn test_rejects_bad_level() {
        let base = tempfile::TempDir::new().unwrap();
        let config = LoggingConfig {
            level: "app=verbose".to_string(),
            ..Default::default()
        };
        assert!(init(&config, base.path()).is_err());
    }
}
