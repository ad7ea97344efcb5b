//! `tracing` subscriber setup.
//!
//! Two layers on one registry:
//!
//! - stderr, no timestamps or targets, `RUST_LOG` or `warn`;
//! - `--log-file`, appended to, no ANSI, `RUST_LOG` or `info`.
//!
//! Both fmt layers render an event into a buffer and write it in one call,
//! and the file writer sits behind a mutex, so lines from the main path and
//! the notification task never interleave mid-line.

use std::{
    fs::{File, OpenOptions},
    io,
    path::Path,
    sync::Mutex,
};

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Open `path` for appending, creating it if missing.
pub fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file '{}'", path.display()))
}

/// Install the global subscriber.
///
/// If the log file cannot be opened, terminal logging is still installed
/// and the open error is returned.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let terminal = fmt::layer()
        .with_writer(io::stderr)
        .without_time()
        .with_target(false)
        .with_filter(filter("warn"));

    let file = log_file.map(open_log_file).transpose();
    let (file, open_error) = match file {
        Ok(file) => (file, None),
        Err(err) => (None, Some(err)),
    };

    let file_layer = file.map(|f| {
        fmt::layer()
            .with_writer(Mutex::new(f))
            .with_ansi(false)
            .with_target(false)
            .with_filter(filter("info"))
    });

    tracing_subscriber::registry()
        .with(terminal)
        .with(file_layer)
        .try_init()
        .context("cannot install log subscriber")?;

    open_error.map_or(Ok(()), Err)
}
