//! [`MasterSecret`]: the process-wide input key material for tenant key derivation.
//!
//! The raw value is captured once at startup and never mutated. It is decoded
//! and validated lazily, on the first cryptographic call, so components that
//! never encrypt can run without it configured.

use std::sync::OnceLock;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use common::FieldCryptError;

/// Byte length of the decoded master secret.
pub const MASTER_SECRET_LEN: usize = 32;

/// Environment variable the master secret is read from.
pub const MASTER_SECRET_ENV: &str = "ENCRYPTION_MASTER_KEY";

/// Decoded master secret bytes. Zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct SecretBytes([u8; MASTER_SECRET_LEN]);

impl SecretBytes {
    pub(crate) fn as_bytes(&self) -> &[u8; MASTER_SECRET_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretBytes([REDACTED])")
    }
}

/// Why the configured secret cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SecretProblem {
    Missing,
    NotHex,
    WrongLength(usize),
}

impl SecretProblem {
    fn into_error(self) -> FieldCryptError {
        let reason = match self {
            SecretProblem::Missing => format!("{MASTER_SECRET_ENV} is not set"),
            SecretProblem::NotHex => format!("{MASTER_SECRET_ENV} is not valid hex"),
            SecretProblem::WrongLength(n) => format!(
                "{MASTER_SECRET_ENV} must decode to {MASTER_SECRET_LEN} bytes \
                 ({} hex characters), got {n} bytes",
                MASTER_SECRET_LEN * 2
            ),
        };
        FieldCryptError::Configuration(reason)
    }
}

/// Immutable master secret, shared read-only by every cipher call.
///
/// Construct it once from configuration and hand it to
/// [`FieldCipher::new`](crate::FieldCipher::new). Several instances with
/// different secrets may coexist, which keeps tests independent.
pub struct MasterSecret {
    raw: Option<Zeroizing<String>>,
    decoded: OnceLock<Result<SecretBytes, SecretProblem>>,
}

impl MasterSecret {
    /// Wrap a raw hex-encoded secret without validating it. The value is
    /// decoded exactly as given; surrounding whitespace makes it malformed.
    pub fn new(raw: Option<String>) -> Self {
        Self {
            raw: raw.map(Zeroizing::new),
            decoded: OnceLock::new(),
        }
    }

    /// Wrap raw key bytes directly. Mostly useful in tests.
    pub fn from_bytes(bytes: [u8; MASTER_SECRET_LEN]) -> Self {
        let bytes = Zeroizing::new(bytes);
        Self::new(Some(hex::encode(&bytes[..])))
    }

    /// Returns `true` iff a secret is configured and decodes as hex to
    /// exactly [`MASTER_SECRET_LEN`] bytes.
    pub fn is_valid(&self) -> bool {
        self.key_material().is_ok()
    }

    /// Borrow the decoded secret, validating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`FieldCryptError::Configuration`] naming the problem if the
    /// secret is absent or malformed. There is no fallback key.
    pub(crate) fn key_material(&self) -> Result<&SecretBytes, FieldCryptError> {
        self.decoded
            .get_or_init(|| decode(self.raw.as_deref().map(String::as_str)))
            .as_ref()
            .map_err(|problem| problem.into_error())
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSecret")
            .field("configured", &self.raw.is_some())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

fn decode(raw: Option<&str>) -> Result<SecretBytes, SecretProblem> {
    let raw = match raw {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Err(SecretProblem::Missing),
    };
    let bytes = Zeroizing::new(hex::decode(raw).map_err(|_| SecretProblem::NotHex)?);
    if bytes.len() != MASTER_SECRET_LEN {
        return Err(SecretProblem::WrongLength(bytes.len()));
    }
    let mut buf = [0u8; MASTER_SECRET_LEN];
    buf.copy_from_slice(&bytes);
    Ok(SecretBytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn valid_secret_decodes() {
        let secret = MasterSecret::new(Some(VALID.into()));
        assert!(secret.is_valid());
        assert_eq!(secret.key_material().unwrap().as_bytes()[31], 0x1f);
    }

    #[test]
    fn uppercase_hex_accepted() {
        let secret = MasterSecret::new(Some(VALID.to_uppercase()));
        assert!(secret.is_valid());
    }

    #[test]
    fn missing_secret_is_configuration_error() {
        let secret = MasterSecret::new(None);
        assert!(!secret.is_valid());
        let err = secret.key_material().unwrap_err();
        assert!(matches!(err, FieldCryptError::Configuration(_)));
        assert!(err.to_string().contains(MASTER_SECRET_ENV));
    }

    #[test]
    fn blank_secret_is_missing() {
        let secret = MasterSecret::new(Some("   ".into()));
        assert!(secret.key_material().unwrap_err().to_string().contains("not set"));
    }

    #[test]
    fn short_secret_rejected() {
        let secret = MasterSecret::new(Some("abcd".into()));
        let err = secret.key_material().unwrap_err();
        assert!(err.to_string().contains("got 2 bytes"), "{err}");
    }

    #[test]
    fn padded_secret_is_malformed() {
        for padded in [format!(" {VALID}"), format!("{VALID}\n")] {
            let secret = MasterSecret::new(Some(padded));
            assert!(!secret.is_valid());
            assert!(matches!(
                secret.key_material().unwrap_err(),
                FieldCryptError::Configuration(_)
            ));
        }
    }

    #[test]
    fn non_hex_secret_rejected() {
        let secret = MasterSecret::new(Some("zz".repeat(32)));
        let err = secret.key_material().unwrap_err();
        assert!(err.to_string().contains("not valid hex"));
    }

    #[test]
    fn from_bytes_round_trips() {
        let secret = MasterSecret::from_bytes([7u8; MASTER_SECRET_LEN]);
        assert_eq!(secret.key_material().unwrap().as_bytes(), &[7u8; MASTER_SECRET_LEN]);
    }

    #[test]
    fn debug_is_redacted() {
        let secret = MasterSecret::new(Some(VALID.into()));
        let dbg = format!("{secret:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains(VALID));
        let bytes = secret.key_material().unwrap();
        assert!(format!("{bytes:?}").contains("REDACTED"));
    }
}
