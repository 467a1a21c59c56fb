//! Record and marker types exchanged between the engine and its callers.
//!
//! Records travel as JSON objects, both through the persistence layer and
//! through the backfill tool's newline-delimited streams.

use serde::{Deserialize, Serialize};

/// A structured record: field name → JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Reserved field holding a JSON-encoded array of the names of encrypted fields.
///
/// Always stripped from decryption output.
pub const MARKER_FIELD: &str = "_encrypted";

/// Result of encrypting a subset of a record's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    /// Copy of the input record with the targeted fields replaced by tokens.
    pub data: Record,
    /// Fields that hold a token after the call, whether newly encrypted or
    /// already encrypted on input.
    pub encrypted_fields: Vec<String>,
}

impl EncryptedRecord {
    /// Embed the encrypted field list into the record under [`MARKER_FIELD`],
    /// so a later decryption can recover it without the caller re-supplying it.
    pub fn with_marker(mut self) -> Record {
        // Serialising a Vec<String> cannot fail.
        let marker = serde_json::to_string(&self.encrypted_fields).unwrap_or_default();
        self.data
            .insert(MARKER_FIELD.to_owned(), serde_json::Value::String(marker));
        self.data
    }
}
