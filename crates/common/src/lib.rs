//! Common types and errors shared across the field encryption crates.

pub mod error;
pub mod protocol;

pub use error::{FieldCryptError, FieldFailure};
pub use protocol::{EncryptedRecord, Record, MARKER_FIELD};
