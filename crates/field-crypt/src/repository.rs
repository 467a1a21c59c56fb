//! Caller-side persistence helper over a generic query/execute/transaction seam.
//!
//! The engine itself issues no queries. This module shows the shape callers
//! use: encrypt before writing, decrypt after reading, and backfill legacy
//! plaintext rows in one transaction. Every statement is scoped to a tenant.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use common::{FieldCryptError, FieldFailure, Record, MARKER_FIELD};

use crate::crypto::FieldCipher;
use crate::fields::SensitiveFields;

/// Column holding the owning tenant id on every tenant-scoped table.
pub const TENANT_COLUMN: &str = "tenant_id";

/// Primary key column used by backfill updates.
pub const KEY_COLUMN: &str = "id";

/// Failure reported by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

/// One parameterised SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with `?` placeholders.
    pub sql: String,
    /// Positional parameters.
    pub params: Vec<Value>,
}

/// The generic persistence interface callers already have.
#[cfg_attr(test, mockall::automock)]
pub trait Database {
    /// Run a query and return its rows as records.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, StoreError>;

    /// Run a statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, StoreError>;

    /// Run all statements atomically, returning the total affected rows.
    fn transaction(&self, statements: &[Statement]) -> Result<u64, StoreError>;
}

/// Errors from [`TenantRepository`].
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Encryption failed, or an identifier or argument was unusable.
    #[error(transparent)]
    Crypt(#[from] FieldCryptError),

    /// A stored field failed to decrypt.
    #[error(transparent)]
    Field(#[from] FieldFailure),

    /// The persistence collaborator failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tenant-scoped reads and writes of entities with encrypted fields.
pub struct TenantRepository<D> {
    db: D,
    cipher: FieldCipher,
}

impl<D: Database> TenantRepository<D> {
    /// Wrap `db`, sealing fields with `cipher`.
    pub fn new(db: D, cipher: FieldCipher) -> Self {
        Self { db, cipher }
    }

    /// Encrypt `E`'s fields, embed the marker, and insert one row.
    ///
    /// The tenant column is always set to `tenant_id`, overriding any value
    /// on the record.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Crypt`] for invalid identifiers or encryption
    /// failures, [`RepositoryError::Store`] if the insert fails.
    pub fn insert<E: SensitiveFields>(
        &self,
        tenant_id: &str,
        table: &str,
        record: &Record,
    ) -> Result<u64, RepositoryError> {
        ensure_identifier(table)?;
        let mut row = self.cipher.encrypt_entity::<E>(record, tenant_id)?.with_marker();
        row.insert(TENANT_COLUMN.to_owned(), Value::String(tenant_id.to_owned()));

        let mut columns = Vec::with_capacity(row.len());
        let mut params = Vec::with_capacity(row.len());
        for (column, value) in row {
            ensure_identifier(&column)?;
            columns.push(column);
            params.push(value);
        }
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            columns.join(", ")
        );

        let affected = self.db.execute(&sql, &params)?;
        debug!(tenant = tenant_id, entity = E::ENTITY, table, "row inserted");
        Ok(affected)
    }

    /// Load and decrypt every row of `table` owned by `tenant_id`.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Field`] if a stored token fails to decrypt.
    pub fn find_all<E: SensitiveFields>(
        &self,
        tenant_id: &str,
        table: &str,
    ) -> Result<Vec<Record>, RepositoryError> {
        let rows = self.select_tenant_rows(tenant_id, table)?;
        let records = self.cipher.decrypt_records(&rows, Some(E::FIELDS), tenant_id)?;
        Ok(records)
    }

    /// Encrypt any still-plaintext `E` fields across the tenant's rows.
    ///
    /// Rows whose fields are all already tokens are skipped, so running the
    /// backfill twice writes nothing the second time. All updates commit in
    /// one transaction. Returns the number of rows the store reports as
    /// affected, which may be lower than the number of planned updates if rows
    /// were deleted or moved to another tenant since they were read.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Crypt`] if a row has no [`KEY_COLUMN`] or
    /// encryption fails; [`RepositoryError::Store`] if the transaction fails.
    pub fn backfill<E: SensitiveFields>(
        &self,
        tenant_id: &str,
        table: &str,
    ) -> Result<u64, RepositoryError> {
        let rows = self.select_tenant_rows(tenant_id, table)?;

        let mut statements = Vec::new();
        for row in &rows {
            let key = row.get(KEY_COLUMN).cloned().ok_or_else(|| {
                FieldCryptError::InvalidArgument(format!(
                    "row in {table} has no {KEY_COLUMN} column"
                ))
            })?;

            let enc = self.cipher.encrypt_entity::<E>(row, tenant_id)?;
            let changed: Vec<&str> = enc
                .encrypted_fields
                .iter()
                .map(String::as_str)
                .filter(|f| row.get(*f) != enc.data.get(*f))
                .collect();
            if changed.is_empty() {
                continue;
            }

            let mut assignments = Vec::with_capacity(changed.len() + 1);
            let mut params = Vec::with_capacity(changed.len() + 3);
            for field in &changed {
                ensure_identifier(field)?;
                assignments.push(format!("{field} = ?"));
                params.push(enc.data[*field].clone());
            }
            assignments.push(format!("{MARKER_FIELD} = ?"));
            params.push(Value::String(
                serde_json::to_string(&enc.encrypted_fields).unwrap_or_default(),
            ));
            params.push(key);
            params.push(Value::String(tenant_id.to_owned()));

            statements.push(Statement {
                sql: format!(
                    "UPDATE {table} SET {} WHERE {KEY_COLUMN} = ? AND {TENANT_COLUMN} = ?",
                    assignments.join(", ")
                ),
                params,
            });
        }

        if statements.is_empty() {
            info!(tenant = tenant_id, entity = E::ENTITY, table, "backfill: nothing to do");
            return Ok(0);
        }

        let planned = statements.len() as u64;
        let rewritten = self.db.transaction(&statements)?;
        if rewritten != planned {
            warn!(
                tenant = tenant_id,
                entity = E::ENTITY,
                table,
                planned,
                rows = rewritten,
                "backfill affected a different number of rows than planned"
            );
        }
        info!(
            tenant = tenant_id,
            entity = E::ENTITY,
            table,
            rows = rewritten,
            "backfill committed"
        );
        Ok(rewritten)
    }

    fn select_tenant_rows(&self, tenant_id: &str, table: &str) -> Result<Vec<Record>, RepositoryError> {
        ensure_identifier(table)?;
        if tenant_id.is_empty() {
            return Err(FieldCryptError::InvalidArgument("tenant id must not be empty".into()).into());
        }
        let sql = format!("SELECT * FROM {table} WHERE {TENANT_COLUMN} = ?");
        Ok(self
            .db
            .query(&sql, &[Value::String(tenant_id.to_owned())])?)
    }
}

/// Accept only `[A-Za-z_][A-Za-z0-9_]*` as a table or column name.
fn ensure_identifier(name: &str) -> Result<(), FieldCryptError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(FieldCryptError::InvalidArgument(format!(
            "invalid SQL identifier: {name:?}"
        )))
    }
}
