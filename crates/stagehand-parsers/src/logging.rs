//! Logging and tracing utilities for stagehand
//!
//! Structured logging goes through `tracing`; binaries pick a subscriber
//! once at startup through [`init_default`] or [`init_with_config`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

pub const DEFAULT_FILTER: &str = "warn,stagehand=info";

/// Initialize the default subscriber; later calls are ignored
pub fn init_default() {
    init_with_config(TracingConfig::default());
}

/// Initialize with a custom configuration; `RUST_LOG` still wins when set
pub fn init_with_config(config: TracingConfig) {
    if TRACING_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
        .is_err()
    {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.show_target)
        .with_thread_ids(config.show_thread_ids)
        .with_file(config.show_file)
        .with_line_number(config.show_line_number);

    // A test harness or host application may already own the global subscriber.
    let _ = tracing_subscriber::registry().with(fmt_layer).with(filter).try_init();
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Filter directive, e.g. "info" or "warn,stagehand_scene=debug"
    pub default_level: String,
    pub show_target: bool,
    pub show_thread_ids: bool,
    pub show_file: bool,
    pub show_line_number: bool,
}

impl TracingConfig {
    /// Map a `-v` count onto a filter: 0 warn, 1 info, 2 debug, 3+ trace
    pub fn from_verbosity(verbosity: u8) -> Self {
        let default_level = match verbosity {
            0 => DEFAULT_FILTER.to_string(),
            1 => "info".to_string(),
            2 => "debug".to_string(),
            _ => "trace".to_string(),
        };
        Self {
            default_level,
            show_file: verbosity >= 3,
            show_line_number: verbosity >= 3,
            ..Self::default()
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: DEFAULT_FILTER.to_string(),
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
        }
    }
}

#[macro_export]
macro_rules! log_parse_start {
    ($parser:expr, $path:expr) => {
        tracing::info!(
            parser = %$parser,
            path = %$path.display(),
            "Starting parse"
        );
    };
}

#[macro_export]
macro_rules! log_parse_complete {
    ($parser:expr, $duration:expr, $items:expr) => {
        tracing::info!(
            parser = %$parser,
            duration_ms = %$duration.as_millis(),
            items = %$items,
            "Parse complete"
        );
    };
}

#[macro_export]
macro_rules! log_parse_error {
    ($parser:expr, $error:expr) => {
        tracing::error!(
            parser = %$parser,
            error = %$error,
            "Parse failed"
        );
    };
}

/// Run `f` inside a `parse` span and log how long it took
pub fn instrument_parse<T, F>(name: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let span = tracing::info_span!("parse", parser = %name);
    let _guard = span.enter();

    let start = Instant::now();
    let result = f();
    tracing::debug!(duration_ms = %start.elapsed().as_millis(), "Parse operation complete");

    result
}
