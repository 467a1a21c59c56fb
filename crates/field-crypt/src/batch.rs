//! Batch encryption and decryption over named fields of JSON records.
//!
//! Operators never touch the caller's record. They work on a shallow copy and
//! return it; the copy is authoritative.
//!
//! # Field handling
//!
//! - Names absent from the record are ignored.
//! - On encrypt, a value that already looks like a token is left alone and
//!   still reported as encrypted, so re-running a pass is a no-op.
//! - On decrypt, a value that does not look like a token passes through
//!   unchanged (legacy plaintext during migrations). A value that does look
//!   like a token and fails to decrypt stops the call with a [`FieldFailure`].

use serde_json::Value;
use tracing::{debug, warn};

use common::{EncryptedRecord, FieldCryptError, FieldFailure, Record, MARKER_FIELD};

use crate::classify::{looks_encrypted, looks_encrypted_str};
use crate::crypto::FieldCipher;

impl FieldCipher {
    /// Encrypt `field_names` of `record` for `tenant_id`.
    ///
    /// Null, empty and whitespace-only values stay as they are and are not
    /// reported. Numbers, booleans, arrays and objects are sealed as their JSON
    /// text and decrypt back to a string.
    ///
    /// # Errors
    ///
    /// [`FieldCryptError::InvalidArgument`] for an empty tenant id and
    /// [`FieldCryptError::Configuration`] for an unusable master secret.
    /// Both fail the whole call.
    pub fn encrypt_fields(
        &self,
        record: &Record,
        field_names: &[&str],
        tenant_id: &str,
    ) -> Result<EncryptedRecord, FieldCryptError> {
        if tenant_id.is_empty() {
            return Err(FieldCryptError::InvalidArgument(
                "tenant id must not be empty".into(),
            ));
        }

        let mut data = record.clone();
        let mut encrypted_fields: Vec<String> = Vec::new();

        for &name in field_names {
            let Some(value) = data.get(name) else {
                continue;
            };
            if encrypted_fields.iter().any(|f| f == name) {
                continue;
            }

            if looks_encrypted(value) {
                encrypted_fields.push(name.to_owned());
                continue;
            }

            let plaintext = match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            };
            if let Some(token) = self.encrypt_value(plaintext.as_deref(), tenant_id)? {
                data.insert(name.to_owned(), Value::String(token));
                encrypted_fields.push(name.to_owned());
            }
        }

        debug!(
            tenant = tenant_id,
            requested = field_names.len(),
            encrypted = encrypted_fields.len(),
            "record fields encrypted"
        );
        Ok(EncryptedRecord {
            data,
            encrypted_fields,
        })
    }

    /// Decrypt the named fields of `record` for `tenant_id`.
    ///
    /// With `field_names == None` the list is read from the [`MARKER_FIELD`]
    /// on the record. The marker is stripped from the output either way.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldFailure`] for the first token-shaped field that fails
    /// to decrypt. Its `partial` record keeps every field decrypted before it.
    /// An empty tenant id fails the call up front with an empty `field` and
    /// the record unchanged.
    ///
    /// Values that were sealed from numbers, booleans, arrays or objects come
    /// back as their JSON text in a string (`72` decrypts to `"72"`); callers
    /// that need the original type parse it themselves.
    pub fn decrypt_fields(
        &self,
        record: &Record,
        field_names: Option<&[&str]>,
        tenant_id: &str,
    ) -> Result<Record, FieldFailure> {
        reject_empty_tenant(record, tenant_id)?;

        let mut data = record.clone();
        let marker = data.remove(MARKER_FIELD);

        let recovered: Vec<String>;
        let names: Vec<&str> = match field_names {
            Some(names) => names.to_vec(),
            None => {
                recovered = marker.as_ref().map(parse_marker).unwrap_or_default();
                recovered.iter().map(String::as_str).collect()
            }
        };

        let mut decrypted = 0usize;
        for name in names {
            let token = match data.get(name) {
                Some(Value::String(s)) if looks_encrypted_str(s) => s.clone(),
                _ => continue,
            };

            match self.decrypt_value(Some(&token), tenant_id) {
                Ok(plaintext) => {
                    let value = plaintext.map(Value::String).unwrap_or(Value::Null);
                    data.insert(name.to_owned(), value);
                    decrypted += 1;
                }
                Err(source) => {
                    warn!(
                        tenant = tenant_id,
                        field = name,
                        code = source.code(),
                        "field decryption failed"
                    );
                    return Err(FieldFailure {
                        field: name.to_owned(),
                        source,
                        partial: data,
                    });
                }
            }
        }

        debug!(tenant = tenant_id, decrypted, "record fields decrypted");
        Ok(data)
    }

    /// Decrypt every record in `records`.
    ///
    /// # Errors
    ///
    /// Stops at the first record whose decryption fails; see
    /// [`FieldCipher::decrypt_fields`].
    pub fn decrypt_records(
        &self,
        records: &[Record],
        field_names: Option<&[&str]>,
        tenant_id: &str,
    ) -> Result<Vec<Record>, FieldFailure> {
        records
            .iter()
            .map(|r| self.decrypt_fields(r, field_names, tenant_id))
            .collect()
    }

    /// Decrypt every object in a JSON array.
    ///
    /// Anything that is not an array comes back unchanged, as do array
    /// elements that are not objects.
    ///
    /// # Errors
    ///
    /// An empty tenant id fails the call before any element is read.
    /// Otherwise see [`FieldCipher::decrypt_fields`].
    pub fn decrypt_object_array(
        &self,
        records: &Value,
        field_names: Option<&[&str]>,
        tenant_id: &str,
    ) -> Result<Value, FieldFailure> {
        reject_empty_tenant(&Record::new(), tenant_id)?;

        let Value::Array(items) = records else {
            return Ok(records.clone());
        };

        items
            .iter()
            .map(|item| match item {
                Value::Object(record) => self
                    .decrypt_fields(record, field_names, tenant_id)
                    .map(Value::Object),
                other => Ok(other.clone()),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }
}

fn reject_empty_tenant(record: &Record, tenant_id: &str) -> Result<(), FieldFailure> {
    if tenant_id.is_empty() {
        return Err(FieldFailure {
            field: String::new(),
            source: FieldCryptError::InvalidArgument("tenant id must not be empty".into()),
            partial: record.clone(),
        });
    }
    Ok(())
}

/// Read a marker value: a JSON-encoded string array, or a native array.
fn parse_marker(marker: &Value) -> Vec<String> {
    let parsed = match marker {
        Value::Null => return Vec::new(),
        Value::String(s) => serde_json::from_str::<Vec<String>>(s).ok(),
        Value::Array(_) => serde_json::from_value::<Vec<String>>(marker.clone()).ok(),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        warn!(field = MARKER_FIELD, "ignoring malformed encrypted-field marker");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::MasterSecret;
    use serde_json::json;

    fn cipher() -> FieldCipher {
        FieldCipher::new(MasterSecret::from_bytes([0x42; 32]))
    }

    fn record(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn encrypts_named_fields_only() {
        let c = cipher();
        let rec = record(json!({"name": "A", "medicalHistory": "高血壓"}));
        let out = c.encrypt_fields(&rec, &["medicalHistory"], "org_a").unwrap();
        assert_eq!(out.encrypted_fields, vec!["medicalHistory"]);
        assert_eq!(out.data["name"], json!("A"));
        assert!(looks_encrypted(&out.data["medicalHistory"]));
        // The caller's record is untouched.
        assert_eq!(rec["medicalHistory"], json!("高血壓"));
    }

    #[test]
    fn org_a_round_trip_and_org_b_rejection() {
        let c = cipher();
        let rec = record(json!({"medicalHistory": "高血壓"}));
        let out = c.encrypt_fields(&rec, &["medicalHistory"], "org_a").unwrap();
        let token = out.data["medicalHistory"].as_str().unwrap();
        assert_eq!(token.split(':').count(), 3);

        assert_eq!(
            c.decrypt_value(Some(token), "org_a").unwrap().as_deref(),
            Some("高血壓")
        );
        assert!(matches!(
            c.decrypt_value(Some(token), "org_b"),
            Err(FieldCryptError::Decryption(_))
        ));
    }

    #[test]
    fn null_field_stays_null_and_is_not_reported() {
        let c = cipher();
        let rec = record(json!({"name": "A", "medicalHistory": null}));
        let out = c.encrypt_fields(&rec, &["medicalHistory"], "org_a").unwrap();
        assert_eq!(out.data["medicalHistory"], Value::Null);
        assert!(out.encrypted_fields.is_empty());
    }

    #[test]
    fn blank_string_left_as_is() {
        let c = cipher();
        let rec = record(json!({"notes": "  "}));
        let out = c.encrypt_fields(&rec, &["notes"], "org_a").unwrap();
        assert_eq!(out.data["notes"], json!("  "));
        assert!(out.encrypted_fields.is_empty());
    }

    #[test]
    fn unknown_field_names_ignored() {
        let c = cipher();
        let rec = record(json!({"name": "A"}));
        let out = c.encrypt_fields(&rec, &["ssn", "allergies"], "org_a").unwrap();
        assert_eq!(out.data, rec);
        assert!(out.encrypted_fields.is_empty());
    }

    #[test]
    fn re_encryption_is_idempotent() {
        let c = cipher();
        let rec = record(json!({"allergies": "penicillin", "notes": "n"}));
        let fields = ["allergies", "notes"];
        let first = c.encrypt_fields(&rec, &fields, "org_a").unwrap();
        let second = c.encrypt_fields(&first.data, &fields, "org_a").unwrap();
        assert_eq!(second.encrypted_fields, first.encrypted_fields);
        assert_eq!(second.data, first.data);
    }

    #[test]
    fn duplicate_names_reported_once() {
        let c = cipher();
        let rec = record(json!({"notes": "n"}));
        let out = c.encrypt_fields(&rec, &["notes", "notes"], "org_a").unwrap();
        assert_eq!(out.encrypted_fields, vec!["notes"]);
    }

    #[test]
    fn numeric_values_sealed_as_text() {
        let c = cipher();
        let rec = record(json!({"weight": 72}));
        let out = c.encrypt_fields(&rec, &["weight"], "org_a").unwrap();
        let back = c.decrypt_fields(&out.data, Some(&["weight"][..]), "org_a").unwrap();
        assert_eq!(back["weight"], json!("72"));
        assert_eq!(serde_json::from_str::<Value>(back["weight"].as_str().unwrap()).unwrap(), json!(72));
    }

    #[test]
    fn empty_tenant_fails_whole_call() {
        let c = cipher();
        let rec = record(json!({"notes": "n"}));
        let err = c.encrypt_fields(&rec, &["notes"], "").unwrap_err();
        assert!(matches!(err, FieldCryptError::InvalidArgument(_)));
    }

    #[test]
    fn empty_tenant_fails_decrypt_even_without_tokens() {
        let c = cipher();
        let rec = record(json!({"notes": "legacy plaintext", "other": null}));
        let failure = c.decrypt_fields(&rec, Some(&["notes"][..]), "").unwrap_err();
        assert!(failure.field.is_empty());
        assert!(matches!(failure.source, FieldCryptError::InvalidArgument(_)));
        assert_eq!(failure.partial, rec);

        let arr = json!([{"notes": "x"}]);
        let failure = c.decrypt_object_array(&arr, Some(&["notes"][..]), "").unwrap_err();
        assert!(matches!(failure.source, FieldCryptError::InvalidArgument(_)));

        let failure = c.decrypt_records(&[rec], None, "").unwrap_err();
        assert!(matches!(failure.source, FieldCryptError::InvalidArgument(_)));
    }

    #[test]
    fn decrypt_with_explicit_fields() {
        let c = cipher();
        let rec = record(json!({"name": "A", "allergies": "nuts"}));
        let enc = c.encrypt_fields(&rec, &["allergies"], "org_a").unwrap();
        let dec = c.decrypt_fields(&enc.data, Some(&["allergies"][..]), "org_a").unwrap();
        assert_eq!(dec, rec);
    }

    #[test]
    fn decrypt_recovers_fields_from_marker_and_strips_it() {
        let c = cipher();
        let rec = record(json!({"name": "A", "allergies": "nuts", "notes": "x"}));
        let stored = c
            .encrypt_fields(&rec, &["allergies", "notes"], "org_a")
            .unwrap()
            .with_marker();
        assert!(stored.contains_key(MARKER_FIELD));

        let dec = c.decrypt_fields(&stored, None, "org_a").unwrap();
        assert_eq!(dec, rec);
        assert!(!dec.contains_key(MARKER_FIELD));
    }

    #[test]
    fn marker_stripped_even_when_fields_given() {
        let c = cipher();
        let mut rec = record(json!({"name": "A"}));
        rec.insert(MARKER_FIELD.into(), json!(r#"["name"]"#));
        let dec = c.decrypt_fields(&rec, Some(&["name"][..]), "org_a").unwrap();
        assert!(!dec.contains_key(MARKER_FIELD));
        assert_eq!(dec["name"], json!("A"));
    }

    #[test]
    fn native_array_marker_accepted() {
        let c = cipher();
        let mut stored = c
            .encrypt_fields(&record(json!({"notes": "n"})), &["notes"], "org_a")
            .unwrap()
            .data;
        stored.insert(MARKER_FIELD.into(), json!(["notes"]));
        let dec = c.decrypt_fields(&stored, None, "org_a").unwrap();
        assert_eq!(dec["notes"], json!("n"));
    }

    #[test]
    fn malformed_marker_decrypts_nothing() {
        let c = cipher();
        let mut stored = c
            .encrypt_fields(&record(json!({"notes": "n"})), &["notes"], "org_a")
            .unwrap()
            .data;
        let token = stored["notes"].clone();
        stored.insert(MARKER_FIELD.into(), json!("{not json"));
        let dec = c.decrypt_fields(&stored, None, "org_a").unwrap();
        assert_eq!(dec["notes"], token);
        assert!(!dec.contains_key(MARKER_FIELD));
    }

    #[test]
    fn legacy_plaintext_passes_through() {
        let c = cipher();
        let rec = record(json!({"allergies": "nuts", "notes": null}));
        let dec = c
            .decrypt_fields(&rec, Some(&["allergies", "notes"][..]), "org_a")
            .unwrap();
        assert_eq!(dec, rec);
    }

    #[test]
    fn failure_reports_field_and_keeps_earlier_fields() {
        let c = cipher();
        let rec = record(json!({"a": "first", "b": "second", "c": "third"}));
        let mut enc = c.encrypt_fields(&rec, &["a", "b", "c"], "org_a").unwrap().data;
        let foreign = c.encrypt_value(Some("other"), "org_b").unwrap().unwrap();
        enc.insert("b".into(), Value::String(foreign.clone()));

        let failure = c
            .decrypt_fields(&enc, Some(&["a", "b", "c"][..]), "org_a")
            .unwrap_err();
        assert_eq!(failure.field, "b");
        assert!(matches!(failure.source, FieldCryptError::Decryption(_)));
        assert_eq!(failure.partial["a"], json!("first"));
        assert_eq!(failure.partial["b"], json!(foreign));
        assert!(looks_encrypted(&failure.partial["c"]));
    }

    #[test]
    fn object_array_decrypted_elementwise() {
        let c = cipher();
        let a = c
            .encrypt_fields(&record(json!({"notes": "one"})), &["notes"], "org_a")
            .unwrap()
            .data;
        let b = c
            .encrypt_fields(&record(json!({"notes": "two"})), &["notes"], "org_a")
            .unwrap()
            .data;
        let arr = json!([a, b, 7]);
        let out = c.decrypt_object_array(&arr, Some(&["notes"][..]), "org_a").unwrap();
        assert_eq!(out, json!([{"notes": "one"}, {"notes": "two"}, 7]));
    }

    #[test]
    fn non_array_returned_unchanged() {
        let c = cipher();
        for v in [json!(null), json!({"notes": "x"}), json!("str")] {
            assert_eq!(c.decrypt_object_array(&v, Some(&["notes"][..]), "org_a").unwrap(), v);
        }
    }

    #[test]
    fn decrypt_records_handles_slices() {
        let c = cipher();
        let enc = c
            .encrypt_fields(&record(json!({"notes": "n"})), &["notes"], "org_a")
            .unwrap()
            .with_marker();
        let out = c.decrypt_records(&[enc.clone(), enc], None, "org_a").unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r["notes"] == json!("n")));
    }
}
