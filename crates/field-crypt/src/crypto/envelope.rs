//! The storable text form of one encrypted value.
//!
//! ```text
//! hex(nonce) ":" hex(tag) ":" hex(ciphertext)
//! ```
//!
//! Hex never produces `:`, so the three segments need no length prefixes.

use std::fmt;
use std::str::FromStr;

use common::FieldCryptError;

/// Separator between the three hex segments.
pub const DELIMITER: char = ':';

/// A parsed (nonce, tag, ciphertext) triple.
///
/// Decoding only checks the text structure; segment lengths are enforced by
/// the cipher, which reports a wrong-length nonce or tag as an authentication
/// failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Raw nonce bytes.
    pub nonce: Vec<u8>,
    /// Raw authentication tag bytes.
    pub tag: Vec<u8>,
    /// Raw ciphertext bytes (tag not included).
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encode this envelope to its token string.
    pub fn encode(&self) -> String {
        format!(
            "{}{DELIMITER}{}{DELIMITER}{}",
            hex::encode(&self.nonce),
            hex::encode(&self.tag),
            hex::encode(&self.ciphertext),
        )
    }

    /// Parse a token back into an [`Envelope`].
    ///
    /// # Errors
    ///
    /// Returns [`FieldCryptError::MalformedEnvelope`] unless the token splits
    /// into exactly three non-empty segments that are all valid hex.
    pub fn decode(token: &str) -> Result<Self, FieldCryptError> {
        let parts: Vec<&str> = token.split(DELIMITER).collect();
        let [nonce, tag, ciphertext] = parts.as_slice() else {
            return Err(FieldCryptError::MalformedEnvelope(format!(
                "expected 3 segments, found {}",
                parts.len()
            )));
        };
        Ok(Self {
            nonce: decode_segment(nonce, "nonce")?,
            tag: decode_segment(tag, "tag")?,
            ciphertext: decode_segment(ciphertext, "ciphertext")?,
        })
    }
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>, FieldCryptError> {
    if segment.is_empty() {
        return Err(FieldCryptError::MalformedEnvelope(format!("{name} segment is empty")));
    }
    hex::decode(segment)
        .map_err(|e| FieldCryptError::MalformedEnvelope(format!("{name} segment: {e}")))
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Envelope {
    type Err = FieldCryptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}
