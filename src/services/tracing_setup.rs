//! Tracing subscriber setup
//!
//! Shared tracing configuration used by the `parthistory` binary and tests.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Build the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize the global tracing subscriber.
///
/// With a log file, events go to that file; otherwise they go to stderr so
/// they never mix with the snapshots printed on stdout.
pub fn init_global(log_file_path: Option<&Path>) -> io::Result<()> {
    match log_file_path {
        Some(path) => {
            let log_file = File::create(path)?;
            build_subscriber(log_file, env_filter()).init();
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(env_filter())
                .init();
        }
    }
    Ok(())
}

/// Build a subscriber that writes to `log_file`.
///
/// This is the core subscriber configuration shared between production and tests.
pub fn build_subscriber(
    log_file: File,
    filter: EnvFilter,
) -> impl tracing::Subscriber + Send + Sync {
    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry().with(fmt_layer).with(filter)
}
