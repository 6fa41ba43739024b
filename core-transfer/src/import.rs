//! Import parsing with format auto-detection.

use crate::dotenv;
use crate::error::{Result, TransferError};
use crate::format::TransferFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

/// Keys of the full export envelope; skipped when key-value content is auto-detected.
const ENVELOPE_KEYS: &[&str] = &["vaultName", "vaultUri", "exportedAt", "secrets"];

/// A name/value pair parsed from import content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportEntry {
    pub name: String,
    pub value: String,
}

impl ImportEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Parsed import content together with the format it was read as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedImport {
    pub format: TransferFormat,
    pub entries: Vec<ImportEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    vault_name: Option<String>,
    #[serde(default)]
    vault_uri: Option<String>,
    #[serde(default)]
    exported_at: Option<String>,
    secrets: Vec<EnvelopeItem>,
}

impl Envelope {
    fn has_metadata(&self) -> bool {
        self.vault_name.is_some() || self.vault_uri.is_some() || self.exported_at.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct EnvelopeItem {
    name: String,
    #[serde(default)]
    value: Option<String>,
}

/// Parse import content.
///
/// With `format == None` the format is auto-detected in this order: dotenv
/// (when most lines are assignments), full, simple, key-value, then dotenv as a
/// last resort. With an explicit format only that parser runs.
///
/// # Errors
///
/// - [`TransferError::EmptyContent`] for blank input
/// - [`TransferError::Malformed`] when an explicit format does not match
/// - [`TransferError::UnrecognizedFormat`] when auto-detection finds nothing
#[instrument(skip(content), fields(bytes = content.len()))]
pub fn parse_import(content: &str, format: Option<TransferFormat>) -> Result<ParsedImport> {
    let content = content.trim();
    if content.is_empty() {
        return Err(TransferError::EmptyContent);
    }

    let parsed = match format {
        Some(format) => ParsedImport {
            format,
            entries: parse_as(content, format)?,
        },
        None => detect_and_parse(content)?,
    };

    info!(
        format = %parsed.format,
        count = parsed.entries.len(),
        "Parsed import content"
    );
    Ok(parsed)
}

fn parse_as(content: &str, format: TransferFormat) -> Result<Vec<ImportEntry>> {
    match format {
        TransferFormat::Full => parse_envelope(content, TransferFormat::Full).map(|(e, _)| e),
        TransferFormat::Simple => parse_simple(content),
        TransferFormat::KeyValue => parse_key_value(content, false),
        TransferFormat::Dotenv => parse_dotenv(content),
    }
}

fn detect_and_parse(content: &str) -> Result<ParsedImport> {
    if dotenv::looks_like_dotenv(content) {
        if let Ok(entries) = parse_dotenv(content) {
            debug!("Detected dotenv format");
            return Ok(ParsedImport {
                format: TransferFormat::Dotenv,
                entries,
            });
        }
    }

    if content.starts_with('{') || content.starts_with('[') {
        if let Ok((entries, has_metadata)) = parse_envelope(content, TransferFormat::Full) {
            // An envelope without store metadata is the legacy simple shape
            let format = if has_metadata {
                TransferFormat::Full
            } else {
                TransferFormat::Simple
            };
            debug!(format = %format, "Detected secrets envelope");
            return Ok(ParsedImport { format, entries });
        }

        if let Ok(entries) = parse_simple(content) {
            debug!("Detected simple format");
            return Ok(ParsedImport {
                format: TransferFormat::Simple,
                entries,
            });
        }

        if let Ok(entries) = parse_key_value(content, true) {
            debug!("Detected key-value format");
            return Ok(ParsedImport {
                format: TransferFormat::KeyValue,
                entries,
            });
        }
    }

    if let Ok(entries) = parse_dotenv(content) {
        debug!("Parsed as dotenv after other formats failed");
        return Ok(ParsedImport {
            format: TransferFormat::Dotenv,
            entries,
        });
    }

    Err(TransferError::UnrecognizedFormat)
}

fn malformed(format: TransferFormat, message: impl Into<String>) -> TransferError {
    TransferError::Malformed {
        format,
        message: message.into(),
    }
}

fn require_entries(format: TransferFormat, entries: Vec<ImportEntry>) -> Result<Vec<ImportEntry>> {
    if entries.is_empty() {
        return Err(malformed(format, "no entries found"));
    }
    if let Some(index) = entries.iter().position(|e| e.name.trim().is_empty()) {
        return Err(malformed(
            format,
            format!("entry at position {} has an empty name", index),
        ));
    }
    Ok(entries)
}

/// Parses `{ vaultName?, vaultUri?, exportedAt?, secrets: [...] }`.
/// Returns the entries and whether any store metadata was present.
fn parse_envelope(content: &str, format: TransferFormat) -> Result<(Vec<ImportEntry>, bool)> {
    let envelope: Envelope =
        serde_json::from_str(content).map_err(|e| malformed(format, e.to_string()))?;
    let has_metadata = envelope.has_metadata();
    let entries = envelope
        .secrets
        .into_iter()
        .map(|item| ImportEntry::new(item.name, item.value.unwrap_or_default()))
        .collect();
    Ok((require_entries(format, entries)?, has_metadata))
}

/// Parses a JSON array of `{name, value}`; the legacy `{secrets: [...]}`
/// envelope is accepted as well.
fn parse_simple(content: &str) -> Result<Vec<ImportEntry>> {
    let format = TransferFormat::Simple;
    if content.starts_with('{') {
        return parse_envelope(content, format).map(|(entries, _)| entries);
    }

    let items: Vec<EnvelopeItem> =
        serde_json::from_str(content).map_err(|e| malformed(format, e.to_string()))?;
    let entries = items
        .into_iter()
        .map(|item| ImportEntry::new(item.name, item.value.unwrap_or_default()))
        .collect();
    require_entries(format, entries)
}

/// Parses a flat JSON object. `skip_envelope_keys` drops the full-export
/// envelope keys so a malformed envelope is not read as entries.
fn parse_key_value(content: &str, skip_envelope_keys: bool) -> Result<Vec<ImportEntry>> {
    let format = TransferFormat::KeyValue;
    let object: Map<String, Value> =
        serde_json::from_str(content).map_err(|e| malformed(format, e.to_string()))?;

    let entries = object
        .into_iter()
        .filter(|(key, _)| !(skip_envelope_keys && ENVELOPE_KEYS.contains(&key.as_str())))
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some(ImportEntry::new(key, s)),
            Value::Number(n) => Some(ImportEntry::new(key, n.to_string())),
            Value::Bool(b) => Some(ImportEntry::new(key, b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        })
        .collect();
    require_entries(format, entries)
}

fn parse_dotenv(content: &str) -> Result<Vec<ImportEntry>> {
    let entries = content
        .lines()
        .filter_map(dotenv::parse_line)
        .map(|(name, value)| ImportEntry::new(name, value))
        .collect();
    require_entries(TransferFormat::Dotenv, entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(parsed: &ParsedImport) -> Vec<&str> {
        parsed.entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_empty_content_is_rejected() {
        assert_eq!(parse_import("   \n ", None), Err(TransferError::EmptyContent));
    }

    #[test]
    fn test_detects_full_format() {
        let content = r#"{
            "vaultName": "kv-a",
            "vaultUri": "https://kv-a.vault.azure.net",
            "exportedAt": "2024-01-01T00:00:00Z",
            "secrets": [
                {"name": "db-password", "value": "p1", "attributes": {"enabled": true}},
                {"name": "api-key", "value": null}
            ]
        }"#;
        let parsed = parse_import(content, None).unwrap();
        assert_eq!(parsed.format, TransferFormat::Full);
        assert_eq!(parsed.entries[0], ImportEntry::new("db-password", "p1"));
        assert_eq!(parsed.entries[1], ImportEntry::new("api-key", ""));
    }

    #[test]
    fn test_detects_simple_array() {
        let parsed =
            parse_import(r#"[{"name":"a","value":"1"},{"name":"b","value":"2"}]"#, None).unwrap();
        assert_eq!(parsed.format, TransferFormat::Simple);
        assert_eq!(names(&parsed), vec!["a", "b"]);
    }

    #[test]
    fn test_detects_legacy_simple_envelope() {
        let parsed = parse_import(r#"{"secrets":[{"name":"a","value":"1"}]}"#, None).unwrap();
        assert_eq!(parsed.format, TransferFormat::Simple);
        assert_eq!(parsed.entries, vec![ImportEntry::new("a", "1")]);
    }

    #[test]
    fn test_detects_key_value_and_stringifies_scalars() {
        let parsed = parse_import(
            r#"{"a":"1","port":5432,"debug":true,"skip":null,"nested":{"x":1},"vaultName":"kv"}"#,
            None,
        )
        .unwrap();
        assert_eq!(parsed.format, TransferFormat::KeyValue);

        let mut entries = parsed.entries.clone();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            entries,
            vec![
                ImportEntry::new("a", "1"),
                ImportEntry::new("debug", "true"),
                ImportEntry::new("port", "5432"),
            ]
        );
    }

    #[test]
    fn test_explicit_key_value_keeps_envelope_named_entries() {
        let parsed = parse_import(
            r#"{"secrets":"s1","vaultName":"kv","db-password":"p"}"#,
            Some(TransferFormat::KeyValue),
        )
        .unwrap();
        assert_eq!(names(&parsed), vec!["db-password", "secrets", "vaultName"]);
    }

    #[test]
    fn test_detects_dotenv() {
        let content = "# exported\nDB_PASSWORD=\"p1\"\nAPI_KEY=k2\n";
        let parsed = parse_import(content, None).unwrap();
        assert_eq!(parsed.format, TransferFormat::Dotenv);
        assert_eq!(
            parsed.entries,
            vec![
                ImportEntry::new("db-password", "p1"),
                ImportEntry::new("api-key", "k2")
            ]
        );
    }

    #[test]
    fn test_unrecognized_content() {
        assert_eq!(
            parse_import("just some prose", None),
            Err(TransferError::UnrecognizedFormat)
        );
        assert_eq!(
            parse_import("[1, 2, 3]", None),
            Err(TransferError::UnrecognizedFormat)
        );
    }

    #[test]
    fn test_explicit_format_mismatch_is_malformed() {
        let err = parse_import("A=1", Some(TransferFormat::Simple)).unwrap_err();
        assert!(matches!(
            err,
            TransferError::Malformed {
                format: TransferFormat::Simple,
                ..
            }
        ));

        let err = parse_import("{}", Some(TransferFormat::KeyValue)).unwrap_err();
        assert!(matches!(err, TransferError::Malformed { message, .. } if message.contains("no entries")));
    }

    #[test]
    fn test_empty_names_are_rejected() {
        let err = parse_import(r#"[{"name":"","value":"1"}]"#, Some(TransferFormat::Simple))
            .unwrap_err();
        assert!(matches!(err, TransferError::Malformed { message, .. } if message.contains("empty name")));
    }
}
