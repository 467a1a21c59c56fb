//! Telemetry initialisation for the backfill tool.
//!
//! Unlike a long-running service, the tool owns stdout for the record
//! stream, so JSON logs go to stderr. No record values or key material are
//! ever logged.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Initialise the JSON subscriber on stderr.
///
/// `RUST_LOG`, when set, takes precedence over the configured `LOG_LEVEL`.
///
/// # Errors
///
/// Returns an error if the effective filter does not parse or the subscriber
/// has already been set.
pub fn init(log_level: &str) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(rust_log.as_deref(), log_level)?;

    tracing_subscriber::fmt()
        .json()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing subscriber already set: {e}"))
}

/// Pick the filter directives: a non-blank `RUST_LOG` wins, else `log_level`.
fn build_filter(rust_log: Option<&str>, log_level: &str) -> Result<EnvFilter> {
    let (source, directives) = match rust_log {
        Some(env) if !env.trim().is_empty() => (EnvFilter::DEFAULT_ENV, env),
        _ => ("LOG_LEVEL", log_level),
    };
    EnvFilter::try_new(directives)
        .with_context(|| format!("invalid {source} filter `{directives}`"))
}
