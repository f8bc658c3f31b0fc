// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Export and import codecs: env, JSON, YAML and CSV.
//!
//! Values are stored as text. JSON and YAML exports reinterpret them by
//! type (boolean, integer, decimal, json); env and CSV write the raw text.
//! Imports infer a type from JSON/YAML values and read it from the CSV
//! `type` column; env entries are always `text`.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::storage::repository::{Secret, SecretType};
use crate::storage::{StoreError, StoreResult};

/// Message for any import that cannot be parsed.
pub const PARSE_FAILURE: &str = "Failed to parse file";

/// Supported transfer formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferFormat {
    #[default]
    Env,
    Json,
    Yaml,
    Csv,
}

impl TransferFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TransferFormat::Env => "env",
            TransferFormat::Json => "json",
            TransferFormat::Yaml => "yaml",
            TransferFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            TransferFormat::Env => "text/plain",
            TransferFormat::Json => "application/json",
            TransferFormat::Yaml => "text/yaml",
            TransferFormat::Csv => "text/csv",
        }
    }
}

impl fmt::Display for TransferFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TransferFormat {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "env" => Ok(TransferFormat::Env),
            "json" => Ok(TransferFormat::Json),
            "yaml" => Ok(TransferFormat::Yaml),
            "csv" => Ok(TransferFormat::Csv),
            _ => Err(StoreError::Validation("Unsupported format".to_string())),
        }
    }
}

/// One `{key, value, type}` entry read from an import file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub key: String,
    pub value: String,
    pub secret_type: SecretType,
}

impl ParsedEntry {
    fn new(key: impl Into<String>, value: impl Into<String>, secret_type: SecretType) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            secret_type,
        }
    }
}

// =============================================================================
// Export
// =============================================================================

/// Reinterpret a stored value by its type. Unparseable numbers and JSON
/// fall back to the raw string.
pub fn typed_value(secret: &Secret) -> Value {
    let raw = secret.value.as_str();
    match secret.secret_type {
        SecretType::Boolean => Value::Bool(raw.to_lowercase() == "true"),
        SecretType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        SecretType::Decimal => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        SecretType::Json => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        }
        _ => Value::String(raw.to_string()),
    }
}

/// Key to typed value, in secret order.
pub fn typed_map(secrets: &[Secret]) -> Map<String, Value> {
    secrets
        .iter()
        .map(|secret| (secret.key.clone(), typed_value(secret)))
        .collect()
}

/// `KEY=value` lines joined by `\n`, raw values.
pub fn to_env(secrets: &[Secret]) -> String {
    secrets
        .iter()
        .map(|secret| format!("{}={}", secret.key, secret.value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Serialize secrets (already ordered) in the given format.
pub fn export(format: TransferFormat, secrets: &[Secret]) -> StoreResult<String> {
    match format {
        TransferFormat::Env => Ok(to_env(secrets)),
        TransferFormat::Json => Ok(serde_json::to_string_pretty(&typed_map(secrets))?),
        TransferFormat::Yaml => serde_yaml::to_string(&typed_map(secrets))
            .map_err(|e| StoreError::Validation(format!("YAML export failed: {e}"))),
        TransferFormat::Csv => {
            let rows = secrets
                .iter()
                .map(|secret| {
                    format!(
                        "{},{},{}",
                        csv_field(&secret.key),
                        csv_field(&secret.value),
                        csv_field(secret.secret_type.as_str())
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            Ok(format!("key,value,type\n{rows}"))
        }
    }
}

// =============================================================================
// Import
// =============================================================================

fn parse_failure() -> StoreError {
    StoreError::Validation(PARSE_FAILURE.to_string())
}

/// Parse an import file. Any syntax error fails the whole file.
pub fn parse(format: TransferFormat, content: &str) -> StoreResult<Vec<ParsedEntry>> {
    match format {
        TransferFormat::Env => Ok(parse_env(content)),
        TransferFormat::Json => {
            let value: Value = serde_json::from_str(content).map_err(|_| parse_failure())?;
            entries_from_value(value)
        }
        TransferFormat::Yaml => {
            let value: Value = serde_yaml::from_str(content).map_err(|_| parse_failure())?;
            entries_from_value(value)
        }
        TransferFormat::Csv => parse_csv(content),
    }
}

/// Strip one leading and one trailing quote character.
fn strip_quotes(value: &str) -> &str {
    let value = value
        .strip_prefix('"')
        .or_else(|| value.strip_prefix('\''))
        .unwrap_or(value);
    value
        .strip_suffix('"')
        .or_else(|| value.strip_suffix('\''))
        .unwrap_or(value)
}

/// Parse `KEY=value` lines. Blank lines and lines starting with `#` are
/// skipped; a line without `=` yields an empty value.
pub fn parse_env(content: &str) -> Vec<ParsedEntry> {
    content
        .split('\n')
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(|line| {
            let (key, value) = line.split_once('=').unwrap_or((line, ""));
            ParsedEntry::new(key.trim(), strip_quotes(value.trim()), SecretType::Text)
        })
        .collect()
}

/// Infer the stored text and type of a JSON/YAML value.
fn entry_from_json(key: String, value: Value) -> StoreResult<ParsedEntry> {
    let entry = match value {
        Value::String(s) => ParsedEntry::new(key, s, SecretType::Text),
        Value::Bool(b) => ParsedEntry::new(key, b.to_string(), SecretType::Boolean),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                ParsedEntry::new(key, n.to_string(), SecretType::Integer)
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                        ParsedEntry::new(key, (f as i64).to_string(), SecretType::Integer)
                    }
                    _ => ParsedEntry::new(key, n.to_string(), SecretType::Decimal),
                }
            }
        }
        other @ (Value::Null | Value::Array(_) | Value::Object(_)) => {
            ParsedEntry::new(key, serde_json::to_string(&other)?, SecretType::Json)
        }
    };
    Ok(entry)
}

fn entries_from_value(value: Value) -> StoreResult<Vec<ParsedEntry>> {
    let Value::Object(map) = value else {
        return Err(parse_failure());
    };
    map.into_iter()
        .map(|(key, value)| entry_from_json(key, value))
        .collect()
}

/// Split CSV text into records, honouring quoted fields (which may span
/// lines and escape quotes by doubling them).
fn csv_records(content: &str) -> StoreResult<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(ch);
            }
            continue;
        }
        match ch {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(ch),
        }
    }
    if in_quotes {
        return Err(parse_failure());
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    // Drop blank lines
    records.retain(|r| !(r.len() == 1 && r[0].trim().is_empty()));
    Ok(records)
}

/// Parse a CSV file with a `key,value,type` header (column order free,
/// `type` optional and defaulting to `text`).
pub fn parse_csv(content: &str) -> StoreResult<Vec<ParsedEntry>> {
    let mut records = csv_records(content)?.into_iter();
    let Some(header) = records.next() else {
        return Ok(Vec::new());
    };
    let column = |name: &str| header.iter().position(|h| h.trim() == name);
    let key_col = column("key").ok_or_else(parse_failure)?;
    let value_col = column("value").ok_or_else(parse_failure)?;
    let type_col = column("type");

    records
        .map(|row| {
            let cell = |idx: usize| row.get(idx).map(String::as_str).unwrap_or("");
            let secret_type = match type_col.map(cell).filter(|t| !t.is_empty()) {
                Some(t) => t.parse::<SecretType>().map_err(|_| parse_failure())?,
                None => SecretType::Text,
            };
            Ok(ParsedEntry::new(cell(key_col), cell(value_col), secret_type))
        })
        .collect()
}
