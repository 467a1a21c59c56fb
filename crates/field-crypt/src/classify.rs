//! Heuristic detection of values that are already envelope tokens.
//!
//! Used only to make batch encryption idempotent and to let batch decryption
//! pass legacy plaintext through. It is not a security boundary: a plaintext
//! that happens to read as `hex:hex:hex` with the right segment lengths is
//! indistinguishable from a real token here.

use serde_json::Value;

use crate::crypto::{DELIMITER, NONCE_LEN, TAG_LEN};

/// Returns `true` if `value` is a string shaped like an envelope token.
pub fn looks_encrypted(value: &Value) -> bool {
    value.as_str().is_some_and(looks_encrypted_str)
}

/// String form of [`looks_encrypted`].
///
/// True iff the string splits into exactly three segments on the delimiter,
/// the nonce and tag segments have their fixed hex lengths, and the
/// ciphertext segment is non-empty hex of even length.
pub fn looks_encrypted_str(s: &str) -> bool {
    let mut parts = s.split(DELIMITER);
    let (Some(nonce), Some(tag), Some(ciphertext), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    nonce.len() == NONCE_LEN * 2
        && tag.len() == TAG_LEN * 2
        && !ciphertext.is_empty()
        && ciphertext.len() % 2 == 0
        && [nonce, tag, ciphertext]
            .iter()
            .all(|seg| seg.bytes().all(|b| b.is_ascii_hexdigit()))
}
