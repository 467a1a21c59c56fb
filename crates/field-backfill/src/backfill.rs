//! Line-by-line NDJSON processing.
//!
//! Each non-blank input line must be one JSON object. Encrypt mode seals the
//! configured fields (skipping ones already sealed); decrypt mode opens them,
//! or the fields named by each record's marker when none are configured.
//! The first failing line aborts the run.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use field_crypt::{FieldCipher, Record};
use tracing::{debug, info};

use crate::config::{Config, Mode};

/// Stream records from `input` to `output`. Returns the number processed.
///
/// # Errors
///
/// Returns an error naming the 1-based line number if a line is not a JSON
/// object, if a field fails to encrypt or decrypt, or on I/O failure.
pub fn run<R: BufRead, W: Write>(
    cfg: &Config,
    cipher: &FieldCipher,
    input: R,
    mut output: W,
) -> Result<usize> {
    let mode = cfg.mode()?;
    let fields = cfg.field_list();
    let tenant = cfg.tenant_id.trim();
    info!(tenant, ?mode, fields = fields.len(), "backfill starting");

    let mut processed = 0usize;
    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("failed to read line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }

        let record: Record = serde_json::from_str(&line)
            .with_context(|| format!("line {line_no}: expected a JSON object"))?;

        let out = match mode {
            Mode::Encrypt => {
                let enc = cipher
                    .encrypt_fields(&record, &fields, tenant)
                    .with_context(|| format!("line {line_no}: encryption failed"))?;
                debug!(line = line_no, encrypted = enc.encrypted_fields.len(), "record sealed");
                if cfg.embed_marker {
                    enc.with_marker()
                } else {
                    enc.data
                }
            }
            Mode::Decrypt => {
                let names = (!fields.is_empty()).then_some(fields.as_slice());
                cipher
                    .decrypt_fields(&record, names, tenant)
                    .with_context(|| format!("line {line_no}: decryption failed"))?
            }
        };

        serde_json::to_writer(&mut output, &out)
            .with_context(|| format!("line {line_no}: failed to write output"))?;
        output.write_all(b"\n")?;
        processed += 1;
    }

    output.flush().context("failed to flush output")?;
    info!(tenant, processed, "backfill finished");
    Ok(processed)
}
