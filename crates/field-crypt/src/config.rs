//! Engine configuration loaded from environment variables.
//!
//! Loading only captures the raw master secret. Whether it is present and
//! well-formed is checked on first cryptographic use, so processes that never
//! encrypt can start without it.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::crypto::FieldCipher;
use crate::secret::MasterSecret;

/// Engine configuration.
#[derive(Clone, Deserialize, Default)]
pub struct EngineConfig {
    /// Hex-encoded 32-byte master secret (`ENCRYPTION_MASTER_KEY`).
    #[serde(default)]
    pub encryption_master_key: Option<String>,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error only if the environment cannot be read into the
    /// configuration structure. A missing secret is not an error here.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build engine configuration from environment")?;

        cfg.try_deserialize()
            .context("failed to deserialise engine configuration")
    }

    /// Build a [`FieldCipher`] over the configured secret.
    pub fn into_cipher(self) -> FieldCipher {
        FieldCipher::new(MasterSecret::new(self.encryption_master_key))
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field(
                "encryption_master_key",
                &self.encryption_master_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}
