//! HKDF-SHA256 derivation of per-tenant keys from the master secret.
//!
//! Keys are never stored. The same (secret, scope) pair always yields the same
//! key, which lets any stateless process recover a tenant's key on demand.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use common::FieldCryptError;

use crate::crypto::KEY_LEN;
use crate::secret::MasterSecret;

/// Fixed application salt for every derivation.
pub const DERIVATION_SALT: &[u8] = b"tenant-field-encryption/v1";

const TENANT_INFO_PREFIX: &[u8] = b"tenant:";
const GLOBAL_INFO: &[u8] = b"global";

/// Whose key a cipher call runs under.
///
/// Tenant and global keys come from distinct HKDF info strings, so ciphertext
/// produced in one scope never decrypts in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope<'a> {
    /// One organization's key. The id must be non-empty.
    Tenant(&'a str),
    /// The non-tenant key used for system-wide values.
    Global,
}

impl KeyScope<'_> {
    fn info(&self) -> Result<Vec<u8>, FieldCryptError> {
        match self {
            KeyScope::Tenant(id) => {
                if id.is_empty() {
                    return Err(FieldCryptError::InvalidArgument(
                        "tenant id must not be empty".into(),
                    ));
                }
                let mut info = Vec::with_capacity(TENANT_INFO_PREFIX.len() + id.len());
                info.extend_from_slice(TENANT_INFO_PREFIX);
                info.extend_from_slice(id.as_bytes());
                Ok(info)
            }
            KeyScope::Global => Ok(GLOBAL_INFO.to_vec()),
        }
    }
}

/// A derived 256-bit key. Zeroed on drop and deliberately not `Clone`.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TenantKey([u8; KEY_LEN]);

impl TenantKey {
    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl PartialEq for TenantKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for TenantKey {}

impl std::fmt::Debug for TenantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TenantKey([REDACTED])")
    }
}

/// Derive the key for `scope` from `secret`.
///
/// # Errors
///
/// - [`FieldCryptError::InvalidArgument`] if the tenant id is empty.
/// - [`FieldCryptError::Configuration`] if the master secret is missing or malformed.
pub fn derive_key(secret: &MasterSecret, scope: KeyScope<'_>) -> Result<TenantKey, FieldCryptError> {
    let info = scope.info()?;
    let ikm = secret.key_material()?;

    let hk = Hkdf::<Sha256>::new(Some(DERIVATION_SALT), ikm.as_bytes());
    let mut okm = [0u8; KEY_LEN];
    hk.expand(&info, &mut okm)
        .map_err(|e| FieldCryptError::Configuration(format!("HKDF expand failed: {e}")))?;
    Ok(TenantKey(okm))
}
