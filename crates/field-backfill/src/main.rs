//! `field-backfill`: operator tool entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`config::Config`] and the engine configuration from
//!    environment variables.
//! 2. Initialise structured JSON logging on stderr.
//! 3. Check the master secret, then stream stdin → stdout through the engine.

mod backfill;
mod config;
mod telemetry;

use std::io::{self, BufWriter};

use anyhow::Result;
use field_crypt::config::EngineConfig;
use tracing::error;

fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = config::Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: field-backfill configuration invalid: {e}");
        e
    })?;
    let engine = EngineConfig::from_env()?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level)?;

    // -----------------------------------------------------------------------
    // 3. Backfill
    // -----------------------------------------------------------------------
    let cipher = engine.into_cipher();
    if !cipher.is_configured() {
        // Surface the exact configuration problem before reading any input.
        if let Err(e) = cipher.derive_key(cfg.tenant_id.trim()) {
            error!(code = e.code(), "master secret unusable");
            return Err(e.into());
        }
    }

    let stdin = io::stdin().lock();
    let stdout = BufWriter::new(io::stdout().lock());
    backfill::run(&cfg, &cipher, stdin, stdout)?;
    Ok(())
}
