//! Tracing subscriber setup.
//!
//! The filter comes from `BOOKISH_LOG`, then `RUST_LOG`, then the configured
//! level (scoped to this crate). Logs go to stderr so they never interleave
//! with conversation output on stdout.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const LOG_ENV: &str = "BOOKISH_LOG";

/// How logs should be emitted.
#[derive(Debug, Clone, Default)]
pub struct LogOptions<'a> {
    /// Level used when no filter env var is set, e.g. `"info"` or `"debug"`
    pub level: &'a str,
    pub json: bool,
    /// Directory for daily-rotated log files, if file logging is on
    pub file_dir: Option<&'a Path>,
}

/// Directive applied when no env var is set: our crate at `level`, deps at warn.
pub fn default_directive(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("warn,bookish={}", level)
    }
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)))
}

/// Install the global subscriber. Returns the file writer guard, which must
/// be held until exit for buffered file logs to flush. Calling this more than
/// once is a no-op.
pub fn init_subscriber(options: &LogOptions<'_>) -> Option<WorkerGuard> {
    let filter = build_filter(options.level);

    let stderr_layer = if options.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .boxed()
    };

    let (file_layer, guard) = match options.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "bookish.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // try_init fails only when a subscriber is already installed
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    guard
}
