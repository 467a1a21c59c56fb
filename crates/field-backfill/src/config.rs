//! Configuration loading and validation for the backfill tool.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Direction of a backfill run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Seal plaintext fields; already-sealed fields are left alone.
    Encrypt,
    /// Open sealed fields; plaintext passes through.
    Decrypt,
}

/// Validated backfill configuration.
///
/// The master secret is read separately through
/// [`field_crypt::config::EngineConfig`].
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Tenant whose key seals or opens the records. **Required.**
    pub tenant_id: String,

    /// `encrypt` or `decrypt`.
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Comma-separated field names. Required for `encrypt`; for `decrypt`
    /// an empty list means "read the marker field on each record".
    #[serde(default)]
    pub fields: String,

    /// Whether encrypted output carries the `_encrypted` marker field.
    #[serde(default = "default_embed_marker")]
    pub embed_marker: bool,

    /// Tracing log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_mode() -> String {
    "encrypt".into()
}
fn default_embed_marker() -> bool {
    true
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build field-backfill configuration")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise field-backfill configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Parsed [`Mode`].
    pub fn mode(&self) -> Result<Mode> {
        match self.mode.trim().to_ascii_lowercase().as_str() {
            "encrypt" => Ok(Mode::Encrypt),
            "decrypt" => Ok(Mode::Decrypt),
            other => anyhow::bail!("MODE must be `encrypt` or `decrypt`, got `{other}`"),
        }
    }

    /// Trimmed, non-empty field names in configuration order.
    pub fn field_list(&self) -> Vec<&str> {
        self.fields
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.tenant_id.trim().is_empty() {
            anyhow::bail!("TENANT_ID is required and must not be empty");
        }
        if self.mode()? == Mode::Encrypt && self.field_list().is_empty() {
            anyhow::bail!("FIELDS is required in encrypt mode");
        }
        Ok(())
    }
}
