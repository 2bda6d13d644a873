//! # Export Module
//!
//! Delimited-text output for searchgraph results.
//!
//! - Failure-pair file: header `A,B,pair_count`, rows by descending count
//! - Identifier-list file: header `user_pcid,doc_count`, one row per bucket
//!
//! Rendering is pure; the `write_*` functions create missing parent
//! directories and overwrite whatever is at the target path. Fields that
//! contain a delimiter, quote or line break are quoted, with inner quotes
//! doubled. Lines end with `\n`.

use crate::failure_pairs::FailurePairTable;
use crate::primitives::{FAIL_PAIR_HEADER, IDENTIFIER_COLUMN, IDENTIFIER_HEADER};
use crate::{Identifier, IdentifierBucket, SearchGraphError};
use std::borrow::Cow;
use std::fs;
use std::path::Path;

const DELIMITER: char = ',';
const QUOTE: char = '"';

// =============================================================================
// FIELD ENCODING
// =============================================================================

fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains([DELIMITER, QUOTE, '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Split a document into records of fields, honouring double-quoted fields.
///
/// Records end at an unquoted `\n` or `\r`; line breaks inside quotes
/// belong to the field. Blank lines yield no record.
fn split_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            (QUOTE, true) if chars.peek() == Some(&QUOTE) => {
                current.push(QUOTE);
                chars.next();
            }
            (QUOTE, true) => in_quotes = false,
            (QUOTE, false) if current.is_empty() => in_quotes = true,
            (DELIMITER, false) => fields.push(std::mem::take(&mut current)),
            ('\n' | '\r', false) => {
                fields.push(std::mem::take(&mut current));
                push_record(&mut records, std::mem::take(&mut fields));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    push_record(&mut records, fields);
    records
}

fn push_record(records: &mut Vec<Vec<String>>, fields: Vec<String>) {
    let blank = matches!(fields.as_slice(), [only] if only.trim().is_empty());
    if !blank {
        records.push(fields);
    }
}

fn write_text(path: &Path, text: &str) -> Result<(), SearchGraphError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| SearchGraphError::IoError(e.to_string()))?;
    }
    fs::write(path, text).map_err(|e| SearchGraphError::IoError(e.to_string()))
}

// =============================================================================
// FAILURE PAIRS
// =============================================================================

/// Render the failure-pair table, most frequent pair first.
///
/// Equal counts keep the table's insertion order, so the same table always
/// renders to the same bytes.
#[must_use]
pub fn render_failure_pairs(table: &FailurePairTable) -> String {
    let mut out = String::with_capacity(FAIL_PAIR_HEADER.len() + 1);
    out.push_str(FAIL_PAIR_HEADER);
    out.push('\n');
    for (pair, count) in table.ranked() {
        out.push_str(&quote_field(pair.failed.as_str()));
        out.push(DELIMITER);
        out.push_str(&quote_field(pair.next.as_str()));
        out.push(DELIMITER);
        out.push_str(&count.to_string());
        out.push('\n');
    }
    out
}

/// Write the failure-pair CSV to `path`, replacing any existing file.
pub fn write_failure_pairs(
    path: impl AsRef<Path>,
    table: &FailurePairTable,
) -> Result<(), SearchGraphError> {
    write_text(path.as_ref(), &render_failure_pairs(table))
}

// =============================================================================
// IDENTIFIER LIST
// =============================================================================

/// Render aggregation buckets as the identifier-list CSV, in bucket order.
#[must_use]
pub fn render_identifiers(buckets: &[IdentifierBucket]) -> String {
    let mut out = String::new();
    out.push_str(IDENTIFIER_HEADER);
    out.push('\n');
    for bucket in buckets {
        out.push_str(&quote_field(bucket.key.as_str()));
        out.push(DELIMITER);
        out.push_str(&bucket.doc_count.to_string());
        out.push('\n');
    }
    out
}

/// Write the identifier-list CSV to `path`, replacing any existing file.
pub fn write_identifiers(
    path: impl AsRef<Path>,
    buckets: &[IdentifierBucket],
) -> Result<(), SearchGraphError> {
    write_text(path.as_ref(), &render_identifiers(buckets))
}

/// Parse the identifier column out of an identifier-list CSV.
///
/// The column is located by header name, so extra columns are tolerated.
/// Blank lines and empty identifiers are skipped. An empty document yields
/// an empty list.
pub fn parse_identifiers(text: &str) -> Result<Vec<Identifier>, SearchGraphError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = split_records(text).into_iter();

    let Some(header) = records.next() else {
        return Ok(Vec::new());
    };
    let column = header
        .iter()
        .position(|name| name.trim() == IDENTIFIER_COLUMN)
        .ok_or_else(|| {
            SearchGraphError::DeserializationError(format!(
                "identifier list has no '{}' column",
                IDENTIFIER_COLUMN
            ))
        })?;

    Ok(records
        .filter_map(|record| {
            record
                .into_iter()
                .nth(column)
                .map(|field| field.trim().to_string())
                .filter(|field| !field.is_empty())
                .map(Identifier::new)
        })
        .collect())
}

/// Read identifiers from an identifier-list CSV file.
pub fn read_identifiers(path: impl AsRef<Path>) -> Result<Vec<Identifier>, SearchGraphError> {
    let text =
        fs::read_to_string(path.as_ref()).map_err(|e| SearchGraphError::IoError(e.to_string()))?;
    parse_identifiers(&text)
}

// =============================================================================
// TESTS
// =============================================================================
