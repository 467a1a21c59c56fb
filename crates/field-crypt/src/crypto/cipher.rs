//! AES-256-GCM-SIV encryption and decryption of individual field values.
//!
//! Each call derives the scope's key, uses it once, and drops it (zeroing the
//! bytes). A fresh random 96-bit nonce is drawn per encryption, so sealing the
//! same plaintext twice yields two different tokens.

use std::sync::Arc;

use aes_gcm_siv::{
    aead::{rand_core::RngCore, AeadInPlace, KeyInit, OsRng},
    Aes256GcmSiv, Nonce, Tag,
};
use zeroize::Zeroizing;

use common::FieldCryptError;

use super::envelope::Envelope;
use crate::kdf::{derive_key, KeyScope, TenantKey};
use crate::secret::MasterSecret;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of the AES-GCM-SIV authentication tag (16 bytes = 128 bits).
pub const TAG_LEN: usize = 16;

/// Encrypts and decrypts scalar values under scope-derived keys.
///
/// Cheap to clone; every clone shares the same read-only [`MasterSecret`].
#[derive(Clone, Debug)]
pub struct FieldCipher {
    secret: Arc<MasterSecret>,
}

impl FieldCipher {
    /// Build a cipher over `secret`.
    pub fn new(secret: MasterSecret) -> Self {
        Self {
            secret: Arc::new(secret),
        }
    }

    /// Returns `true` if the master secret is usable.
    pub fn is_configured(&self) -> bool {
        self.secret.is_valid()
    }

    /// Derive the key for `tenant_id`.
    ///
    /// # Errors
    ///
    /// See [`derive_key`].
    pub fn derive_key(&self, tenant_id: &str) -> Result<TenantKey, FieldCryptError> {
        derive_key(&self.secret, KeyScope::Tenant(tenant_id))
    }

    /// Encrypt `plaintext` for `tenant_id`.
    ///
    /// Returns `Ok(None)` for `None`, empty or whitespace-only input: there is
    /// nothing to store.
    ///
    /// # Errors
    ///
    /// [`FieldCryptError::InvalidArgument`] for an empty tenant id,
    /// [`FieldCryptError::Configuration`] for a missing or malformed secret.
    pub fn encrypt_value(
        &self,
        plaintext: Option<&str>,
        tenant_id: &str,
    ) -> Result<Option<String>, FieldCryptError> {
        self.encrypt_scoped(plaintext, KeyScope::Tenant(tenant_id))
    }

    /// Decrypt `token` for `tenant_id`.
    ///
    /// Returns `Ok(None)` for `None` or an empty token.
    ///
    /// # Errors
    ///
    /// - [`FieldCryptError::MalformedEnvelope`] if the token does not parse.
    /// - [`FieldCryptError::Decryption`] if authentication fails, which covers
    ///   tampering and tokens sealed for another tenant.
    /// - [`FieldCryptError::InvalidArgument`] / [`FieldCryptError::Configuration`]
    ///   as for encryption.
    pub fn decrypt_value(
        &self,
        token: Option<&str>,
        tenant_id: &str,
    ) -> Result<Option<String>, FieldCryptError> {
        self.decrypt_scoped(token, KeyScope::Tenant(tenant_id))
    }

    /// Encrypt under an explicit [`KeyScope`].
    ///
    /// # Errors
    ///
    /// See [`FieldCipher::encrypt_value`].
    pub fn encrypt_scoped(
        &self,
        plaintext: Option<&str>,
        scope: KeyScope<'_>,
    ) -> Result<Option<String>, FieldCryptError> {
        let plaintext = match plaintext {
            Some(p) if !p.trim().is_empty() => p,
            _ => return Ok(None),
        };

        let key = derive_key(&self.secret, scope)?;
        let envelope = seal(&key, plaintext.as_bytes())?;
        Ok(Some(envelope.encode()))
    }

    /// Decrypt under an explicit [`KeyScope`].
    ///
    /// # Errors
    ///
    /// See [`FieldCipher::decrypt_value`].
    pub fn decrypt_scoped(
        &self,
        token: Option<&str>,
        scope: KeyScope<'_>,
    ) -> Result<Option<String>, FieldCryptError> {
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => return Ok(None),
        };

        let envelope = Envelope::decode(token)?;
        let key = derive_key(&self.secret, scope)?;
        let plaintext = open(&key, &envelope)?;
        String::from_utf8(plaintext.to_vec())
            .map(Some)
            .map_err(|_| FieldCryptError::Decryption("plaintext is not valid UTF-8".into()))
    }
}

/// Authenticated encryption of `plaintext` under `key` with a fresh nonce.
fn seal(key: &TenantKey, plaintext: &[u8]) -> Result<Envelope, FieldCryptError> {
    let cipher = build_cipher(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(nonce, b"", &mut buffer)
        .map_err(|_| FieldCryptError::InvalidArgument("plaintext too large to encrypt".into()))?;

    Ok(Envelope {
        nonce: nonce_bytes.to_vec(),
        tag: tag.to_vec(),
        ciphertext: buffer,
    })
}

/// Authenticated decryption. All-or-nothing: no plaintext on failure.
fn open(key: &TenantKey, envelope: &Envelope) -> Result<Zeroizing<Vec<u8>>, FieldCryptError> {
    if envelope.nonce.len() != NONCE_LEN {
        return Err(FieldCryptError::Decryption(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            envelope.nonce.len()
        )));
    }
    if envelope.tag.len() != TAG_LEN {
        return Err(FieldCryptError::Decryption(format!(
            "tag must be {TAG_LEN} bytes, got {}",
            envelope.tag.len()
        )));
    }

    let cipher = build_cipher(key)?;
    let nonce = Nonce::from_slice(&envelope.nonce);
    let tag = Tag::from_slice(&envelope.tag);

    let mut buffer = Zeroizing::new(envelope.ciphertext.clone());
    cipher
        .decrypt_in_place_detached(nonce, b"", &mut buffer, tag)
        .map_err(|_| FieldCryptError::Decryption("authentication tag mismatch".into()))?;
    Ok(buffer)
}

fn build_cipher(key: &TenantKey) -> Result<Aes256GcmSiv, FieldCryptError> {
    Aes256GcmSiv::new_from_slice(key.as_bytes())
        .map_err(|_| FieldCryptError::Configuration("invalid derived key length".into()))
}
