// src/logging.rs

//! Logging setup for `sshscript` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `SSHSCRIPT_LOG` environment variable (e.g. "info", "debug")
//! 2. `RUST_LOG` directives
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout carries only remote command output.

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

/// Name of the environment variable selecting the log level.
pub const LOG_ENV_VAR: &str = "SSHSCRIPT_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging() -> Result<()> {
    let level = std::env::var(LOG_ENV_VAR)
        .ok()
        .and_then(|s| parse_level_str(&s));

    fmt()
        .with_env_filter(build_filter(level)?)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

/// Build the filter: an explicit level wins, then `RUST_LOG`, then `info`.
///
/// Transport internals are capped at `warn` unless `RUST_LOG` is used.
fn build_filter(level: Option<tracing::Level>) -> Result<EnvFilter> {
    let filter = match level {
        Some(lvl) => EnvFilter::new(lvl.as_str().to_lowercase()),
        None => match EnvFilter::try_from_default_env() {
            Ok(filter) => return Ok(filter),
            Err(_) => EnvFilter::new("info"),
        },
    };

    Ok(filter.add_directive("russh=warn".parse()?))
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_names_case_insensitively() {
        assert_eq!(parse_level_str("DEBUG"), Some(tracing::Level::DEBUG));
        assert_eq!(parse_level_str(" warning "), Some(tracing::Level::WARN));
        assert_eq!(parse_level_str("verbose"), None);
    }

    #[test]
    fn explicit_level_builds_a_filter() {
        let filter = build_filter(Some(tracing::Level::TRACE)).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("trace"));
        assert!(rendered.contains("russh=warn"));
    }
}
