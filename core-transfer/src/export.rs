//! Export rendering for every [`TransferFormat`].

use crate::dotenv;
use crate::error::{Result, TransferError};
use crate::format::TransferFormat;
use bridge_traits::{EntryAttributes, StoreRef};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// What to export and which metadata to include.
///
/// `name` and `value` are always present; the `include_*` flags only affect
/// the attributes block of the full format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub format: TransferFormat,
    /// When false, values are left out (empty in flat formats, absent in full)
    pub include_values: bool,
    pub include_enabled: bool,
    pub include_created: bool,
    pub include_updated: bool,
    pub include_recovery_level: bool,
}

impl ExportOptions {
    pub fn new(format: TransferFormat) -> Self {
        Self {
            format,
            include_values: true,
            include_enabled: false,
            include_created: false,
            include_updated: false,
            include_recovery_level: false,
        }
    }

    pub fn with_values(mut self, include: bool) -> Self {
        self.include_values = include;
        self
    }

    pub fn with_enabled(mut self, include: bool) -> Self {
        self.include_enabled = include;
        self
    }

    pub fn with_created(mut self, include: bool) -> Self {
        self.include_created = include;
        self
    }

    pub fn with_updated(mut self, include: bool) -> Self {
        self.include_updated = include;
        self
    }

    pub fn with_recovery_level(mut self, include: bool) -> Self {
        self.include_recovery_level = include;
        self
    }

    /// Include every metadata field.
    pub fn with_all_metadata(self) -> Self {
        self.with_enabled(true)
            .with_created(true)
            .with_updated(true)
            .with_recovery_level(true)
    }

    fn includes_metadata(&self) -> bool {
        self.include_enabled
            || self.include_created
            || self.include_updated
            || self.include_recovery_level
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::new(TransferFormat::Full)
    }
}

/// One entry to export. `value` is `None` when it could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRecord {
    pub name: String,
    pub value: Option<String>,
    pub attributes: EntryAttributes,
}

impl ExportRecord {
    pub fn new(name: impl Into<String>, value: Option<String>, attributes: EntryAttributes) -> Self {
        Self {
            name: name.into(),
            value,
            attributes,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FullExport<'a> {
    vault_name: &'a str,
    vault_uri: &'a str,
    exported_at: String,
    secrets: Vec<FullExportItem<'a>>,
}

#[derive(Serialize)]
struct FullExportItem<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes: Option<ExportedAttributes>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recovery_level: Option<String>,
}

impl ExportedAttributes {
    fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.created.is_none()
            && self.updated.is_none()
            && self.recovery_level.is_none()
    }
}

#[derive(Serialize)]
struct SimpleItem<'a> {
    name: &'a str,
    value: &'a str,
}

fn format_timestamp(secs: u64) -> Option<String> {
    let secs = i64::try_from(secs).ok()?;
    Utc.timestamp_opt(secs, 0).single().map(|dt| dt.to_rfc3339())
}

/// Render `records` from `store` in the requested format.
///
/// Records are written in name order. A record whose value failed to load is
/// exported with an empty value.
#[instrument(skip(records, options), fields(format = %options.format, count = records.len()))]
pub fn render_export(
    store: &StoreRef,
    records: &[ExportRecord],
    options: &ExportOptions,
    exported_at: DateTime<Utc>,
) -> Result<String> {
    let mut sorted: Vec<&ExportRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let value_of = |record: &ExportRecord| -> String {
        if options.include_values {
            record.value.clone().unwrap_or_default()
        } else {
            String::new()
        }
    };

    let output = match options.format {
        TransferFormat::Full => render_full(store, &sorted, options, exported_at)?,
        TransferFormat::Simple => {
            let values: Vec<String> = sorted.iter().copied().map(value_of).collect();
            let items: Vec<SimpleItem<'_>> = sorted
                .iter()
                .zip(values.iter())
                .map(|(record, value)| SimpleItem {
                    name: &record.name,
                    value,
                })
                .collect();
            to_pretty_json(options.format, &items)?
        }
        TransferFormat::KeyValue => {
            let map: BTreeMap<&str, String> = sorted
                .iter()
                .copied()
                .map(|record| (record.name.as_str(), value_of(record)))
                .collect();
            to_pretty_json(options.format, &map)?
        }
        TransferFormat::Dotenv => {
            let mut lines = vec![
                format!("# Exported from {}", store),
                format!("# Exported at {}", exported_at.to_rfc3339()),
            ];
            lines.extend(sorted.iter().copied().map(|record| {
                format!(
                    "{}={}",
                    dotenv::env_var_name(&record.name),
                    dotenv::quote(&value_of(record))
                )
            }));
            let mut text = lines.join("\n");
            text.push('\n');
            text
        }
    };

    info!(bytes = output.len(), "Rendered export");
    Ok(output)
}

fn render_full(
    store: &StoreRef,
    records: &[&ExportRecord],
    options: &ExportOptions,
    exported_at: DateTime<Utc>,
) -> Result<String> {
    let secrets = records
        .iter()
        .map(|record| {
            let attributes = if options.includes_metadata() {
                let attrs = ExportedAttributes {
                    enabled: record.attributes.enabled.filter(|_| options.include_enabled),
                    created: record
                        .attributes
                        .created
                        .filter(|_| options.include_created)
                        .and_then(format_timestamp),
                    updated: record
                        .attributes
                        .updated
                        .filter(|_| options.include_updated)
                        .and_then(format_timestamp),
                    recovery_level: record
                        .attributes
                        .recovery_level
                        .clone()
                        .filter(|_| options.include_recovery_level),
                };
                Some(attrs).filter(|a| !a.is_empty())
            } else {
                None
            };

            FullExportItem {
                name: &record.name,
                value: if options.include_values {
                    Some(record.value.as_deref().unwrap_or(""))
                } else {
                    None
                },
                attributes,
            }
        })
        .collect();

    let export = FullExport {
        vault_name: store.display_name(),
        vault_uri: store.as_str(),
        exported_at: exported_at.to_rfc3339(),
        secrets,
    };
    to_pretty_json(TransferFormat::Full, &export)
}

fn to_pretty_json<T: Serialize + ?Sized>(format: TransferFormat, value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| TransferError::Serialization {
        format,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn store() -> StoreRef {
        StoreRef::new("https://kv-a.vault.azure.net")
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()
    }

    fn records() -> Vec<ExportRecord> {
        let attrs = EntryAttributes {
            enabled: Some(true),
            created: Some(1_700_000_000),
            updated: Some(1_700_000_600),
            recovery_level: Some("Recoverable".to_string()),
            recoverable_days: Some(90),
        };
        vec![
            ExportRecord::new("zeta", Some("z".to_string()), attrs.clone()),
            ExportRecord::new("alpha", None, attrs),
        ]
    }

    #[test]
    fn test_full_export_without_metadata() {
        let out = render_export(&store(), &records(), &ExportOptions::default(), at()).unwrap();
        let json: Value = serde_json::from_str(&out).unwrap();

        assert_eq!(json["vaultName"], "kv-a");
        assert_eq!(json["vaultUri"], "https://kv-a.vault.azure.net");
        assert_eq!(json["exportedAt"], "2024-03-01T08:30:00+00:00");
        assert_eq!(json["secrets"][0]["name"], "alpha");
        assert_eq!(json["secrets"][0]["value"], "");
        assert!(json["secrets"][0].get("attributes").is_none());
    }

    #[test]
    fn test_full_export_with_selected_metadata() {
        let options = ExportOptions::default()
            .with_enabled(true)
            .with_created(true);
        let out = render_export(&store(), &records(), &options, at()).unwrap();
        let json: Value = serde_json::from_str(&out).unwrap();
        let attrs = &json["secrets"][1]["attributes"];

        assert_eq!(attrs["enabled"], true);
        assert_eq!(attrs["created"], "2023-11-14T22:13:20+00:00");
        assert!(attrs.get("updated").is_none());
        assert!(attrs.get("recoveryLevel").is_none());
    }

    #[test]
    fn test_full_export_all_metadata() {
        let options = ExportOptions::default().with_all_metadata();
        let out = render_export(&store(), &records(), &options, at()).unwrap();
        let json: Value = serde_json::from_str(&out).unwrap();
        let attrs = &json["secrets"][0]["attributes"];
        assert_eq!(attrs["recoveryLevel"], "Recoverable");
        assert!(attrs["updated"].is_string());
    }

    #[test]
    fn test_full_export_without_values() {
        let options = ExportOptions::default().with_values(false);
        let out = render_export(&store(), &records(), &options, at()).unwrap();
        let json: Value = serde_json::from_str(&out).unwrap();
        assert!(json["secrets"][1].get("value").is_none());
    }

    #[test]
    fn test_simple_export_is_sorted_array() {
        let options = ExportOptions::new(TransferFormat::Simple);
        let out = render_export(&store(), &records(), &options, at()).unwrap();
        let json: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"name": "alpha", "value": ""},
                {"name": "zeta", "value": "z"}
            ])
        );
    }

    #[test]
    fn test_key_value_export() {
        let options = ExportOptions::new(TransferFormat::KeyValue);
        let out = render_export(&store(), &records(), &options, at()).unwrap();
        let json: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json, serde_json::json!({"alpha": "", "zeta": "z"}));
    }

    #[test]
    fn test_dotenv_export() {
        let records = vec![ExportRecord::new(
            "db-password",
            Some("p\"w".to_string()),
            EntryAttributes::default(),
        )];
        let options = ExportOptions::new(TransferFormat::Dotenv);
        let out = render_export(&store(), &records, &options, at()).unwrap();

        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("# Exported from https://kv-a.vault.azure.net"));
        assert_eq!(lines[2], "DB_PASSWORD=\"p\\\"w\"");
    }
}
