//! Tracing subscriber setup with a runtime-switchable verbosity.

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, reload};

/// Local timestamps in the form `YYYY-MM-DD-T HH:MM:SS`.
struct TranswatchTimer;

impl tracing_subscriber::fmt::time::FormatTime for TranswatchTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let now = chrono::Local::now();
        w.write_str(&now.format("%Y-%m-%d-T %H:%M:%S").to_string())
    }
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// What: Filter directive for the requested verbosity.
///
/// Details:
/// - Verbose mode always logs at debug level; otherwise `RUST_LOG` wins,
///   falling back to `info`.
fn filter_for(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// What: Handle for changing the log level after initialisation.
#[derive(Debug, Clone)]
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    /// What: Switch between debug-level and normal logging.
    pub fn set_verbose(&self, verbose: bool) {
        match self.filter.modify(|f| *f = filter_for(verbose)) {
            Ok(()) => tracing::info!(verbose, "log verbosity changed"),
            Err(e) => tracing::warn!(error = %e, "failed to change log verbosity"),
        }
    }
}

/// What: Install the global subscriber writing to `<logs_dir>/transwatch.log`.
///
/// Inputs:
/// - `logs_dir`: Directory for the log file
/// - `verbose`: Start at debug level
///
/// Output:
/// - Handle for later verbosity changes.
///
/// Details:
/// - Falls back to stderr when the log file cannot be opened.
/// - Must be called at most once per process.
pub fn init(logs_dir: &Path, verbose: bool) -> LogHandle {
    let (filter, handle) = reload::Layer::new(filter_for(verbose));
    let log_path = logs_dir.join("transwatch.log");
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(non_blocking)
                        .with_timer(TranswatchTimer),
                )
                .init();
            let _ = LOG_GUARD.set(guard);
            tracing::info!(path = %log_path.display(), "logging initialized");
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_ansi(true)
                        .with_writer(std::io::stderr)
                        .with_timer(TranswatchTimer),
                )
                .init();
            tracing::warn!(error = %e, "failed to open log file; using stderr");
        }
    }
    LogHandle { filter: handle }
}

#[cfg(test)]
mod tests {
    #[test]
    /// What: The timer writes a date-time stamp without panicking.
    fn timer_formats_local_time() {
        use tracing_subscriber::fmt::time::FormatTime;
        let mut buf = String::new();
        let mut writer = tracing_subscriber::fmt::format::Writer::new(&mut buf);
        super::TranswatchTimer
            .format_time(&mut writer)
            .expect("format");
        assert_eq!(buf.len(), "2026-01-01-T 00:00:00".len());
        assert!(buf.contains("-T "));
    }
}
