//! Tenant-isolated field encryption engine.
//!
//! Several tenants share one physical database. Sensitive fields are sealed
//! under a key derived per tenant from a single process-wide master secret,
//! so a raw database dump is unreadable without the tenant context and any
//! tampering is detected on read.
//!
//! # Layers
//!
//! ```text
//! batch (encrypt_fields / decrypt_fields / decrypt_object_array)
//!   └── classify (looks_encrypted)
//!   └── crypto::cipher (encrypt_value / decrypt_value)
//!         └── kdf (derive_key) ── secret (MasterSecret)
//!         └── crypto::envelope (hex(nonce):hex(tag):hex(ciphertext))
//! ```
//!
//! # Invariants
//!
//! - Derived keys are recomputed on every call and zeroed when the call returns.
//! - Every encryption uses a fresh random nonce.
//! - Plaintext, tokens and key material never appear in log fields.

pub mod batch;
pub mod classify;
pub mod config;
pub mod crypto;
pub mod fields;
pub mod kdf;
pub mod repository;
pub mod secret;

pub use classify::looks_encrypted;
pub use common::{EncryptedRecord, FieldCryptError, FieldFailure, Record, MARKER_FIELD};
pub use crypto::{Envelope, FieldCipher};
pub use fields::SensitiveFields;
pub use kdf::{KeyScope, TenantKey};
pub use secret::MasterSecret;
