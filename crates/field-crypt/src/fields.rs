//! Compile-time declarations of which fields an entity keeps encrypted.
//!
//! Callers own the policy. Each entity names its sensitive fields once, in a
//! marker type, and every batch call for that entity goes through it:
//!
//! ```
//! use field_crypt::SensitiveFields;
//!
//! struct PatientProfile;
//!
//! impl SensitiveFields for PatientProfile {
//!     const ENTITY: &'static str = "patient_profile";
//!     const FIELDS: &'static [&'static str] = &["medicalHistory", "allergies", "notes"];
//! }
//! ```

use common::{EncryptedRecord, FieldCryptError, FieldFailure, Record};

use crate::crypto::FieldCipher;

/// An entity shape with a fixed set of encrypted field names.
///
/// Names missing from a given record are skipped, not rejected.
pub trait SensitiveFields {
    /// Name used in logs and as the default table name.
    const ENTITY: &'static str;

    /// Field names sealed at rest.
    const FIELDS: &'static [&'static str];
}

impl FieldCipher {
    /// Encrypt the fields `E` declares.
    ///
    /// # Errors
    ///
    /// See [`FieldCipher::encrypt_fields`].
    pub fn encrypt_entity<E: SensitiveFields>(
        &self,
        record: &Record,
        tenant_id: &str,
    ) -> Result<EncryptedRecord, FieldCryptError> {
        self.encrypt_fields(record, E::FIELDS, tenant_id)
    }

    /// Decrypt the fields `E` declares.
    ///
    /// # Errors
    ///
    /// See [`FieldCipher::decrypt_fields`].
    pub fn decrypt_entity<E: SensitiveFields>(
        &self,
        record: &Record,
        tenant_id: &str,
    ) -> Result<Record, FieldFailure> {
        self.decrypt_fields(record, Some(E::FIELDS), tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::MasterSecret;
    use serde_json::json;

    struct PatientProfile;

    impl SensitiveFields for PatientProfile {
        const ENTITY: &'static str = "patient_profile";
        const FIELDS: &'static [&'static str] = &["medicalHistory", "allergies", "notes"];
    }

    #[test]
    fn entity_round_trip() {
        let cipher = FieldCipher::new(MasterSecret::from_bytes([9; 32]));
        let rec = match json!({"name": "A", "medicalHistory": "高血壓", "allergies": null}) {
            serde_json::Value::Object(m) => m,
            _ => unreachable!(),
        };

        let enc = cipher.encrypt_entity::<PatientProfile>(&rec, "org_a").unwrap();
        assert_eq!(enc.encrypted_fields, vec!["medicalHistory"]);

        let dec = cipher.decrypt_entity::<PatientProfile>(&enc.data, "org_a").unwrap();
        assert_eq!(dec, rec);
    }
}
