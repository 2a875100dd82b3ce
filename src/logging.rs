//! Log output for feedrelay.
//!
//! The relay logs to stdout and, when `logging.file` is set, to a file as
//! well. `RUST_LOG` replaces the configured filter entirely; otherwise the
//! configured level applies to feedrelay and the database and HTTP stacks
//! are held at `warn`, since sqlx logs every statement of every tick.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::Result;

/// Dependencies kept at `warn` unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: &[&str] = &["sqlx", "hyper", "hyper_util", "reqwest", "h2", "rustls"];

fn parse_level(level: &str) -> Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Filter directives for a configured level.
fn default_directives(level: Level) -> String {
    let mut directives = level.as_str().to_lowercase();
    for target in QUIET_TARGETS {
        directives.push_str(&format!(",{}=warn", target));
    }
    directives
}

fn build_filter(level: &str) -> EnvFilter {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(spec) if !spec.trim().is_empty() => EnvFilter::new(spec),
        _ => EnvFilter::new(default_directives(parse_level(level))),
    }
}

/// Log file path, or `None` for console-only output.
fn log_file(config: &LoggingConfig) -> Option<&Path> {
    let file = config.file.trim();
    (!file.is_empty()).then(|| Path::new(file))
}

/// Install the global subscriber.
///
/// Fails if the log file cannot be created; the caller may then fall back
/// to [`init_console_only`].
pub fn init(config: &LoggingConfig) -> Result<()> {
    let Some(path) = log_file(config) else {
        init_console_only(&config.level);
        return Ok(());
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let log_file = Arc::new(File::create(path)?);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout.and(log_file))
                .with_ansi(false)
                .with_target(true),
        )
        .with(build_filter(&config.level))
        .init();

    Ok(())
}

/// Install a stdout-only subscriber.
pub fn init_console_only(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(true),
        )
        .with(build_filter(level))
        .init();
}
