//! AES-256-GCM-SIV field encryption primitives.
//!
//! This module knows nothing about records or persistence. It turns one
//! scalar value into one storable token and back.
//!
//! # Token format
//!
//! ```text
//! <hex(nonce)>:<hex(tag)>:<hex(ciphertext)>
//! ```
//!
//! The format carries no version prefix: it is shared bit-for-bit with
//! existing database columns and export tooling.

pub mod cipher;
pub mod envelope;

pub use cipher::{FieldCipher, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use envelope::{Envelope, DELIMITER};
