//! Tracing subscriber setup.
//!
//! `RUST_LOG` always wins. Without it the level comes from `-v` / `-q`.
//! Set `TRAQ_LOG_FORMAT=json` for JSON lines.

use anyhow::{Context, anyhow};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Environment variable selecting the log line format.
pub const LOG_FORMAT_ENV: &str = "TRAQ_LOG_FORMAT";

/// Install the global subscriber.
///
/// Logs go to stderr, or are appended to `log_file` when given.
///
/// # Errors
///
/// Returns an error if `RUST_LOG` is invalid, the log file cannot be
/// opened, or a subscriber is already installed.
pub fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = build_filter(verbose, quiet)?;
    let json = json_requested();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose > 1);

    let result = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            if json {
                builder.json().try_init()
            } else {
                builder.try_init()
            }
        }
        None => {
            let builder = builder.with_writer(io::stderr);
            if json {
                builder.json().try_init()
            } else {
                builder.try_init()
            }
        }
    };

    result.map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

/// Subscriber for tests: captured output, debug level unless `RUST_LOG` says otherwise.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn build_filter(verbose: u8, quiet: bool) -> anyhow::Result<EnvFilter> {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return EnvFilter::try_from_default_env().context("invalid RUST_LOG");
    }
    Ok(EnvFilter::new(default_directives(verbose, quiet)))
}

fn default_directives(verbose: u8, quiet: bool) -> String {
    if quiet {
        return "error".to_string();
    }
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!("warn,traq_rust={level},tq={level}")
}

fn json_requested() -> bool {
    std::env::var(LOG_FORMAT_ENV).is_ok_and(|value| value.eq_ignore_ascii_case("json"))
}
