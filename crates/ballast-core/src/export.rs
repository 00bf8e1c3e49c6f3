//! Entry export in JSON and CSV.

use std::fmt::Write as _;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::MassEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// Flat entry record used by both formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEntry {
    pub id: String,
    pub logged_at: String,
    pub mass: f64,
    pub unit: String,
    pub note: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
}

#[must_use]
pub fn entry_to_export_item(entry: &MassEntry) -> ExportEntry {
    ExportEntry {
        id: entry.id.to_string(),
        logged_at: format_timestamp(entry.logged_at),
        mass: entry.mass,
        unit: entry.unit.to_string(),
        note: entry.note.clone(),
        tags: entry.tags.clone(),
        status: entry.status.to_string(),
    }
}

/// Render entries as pretty-printed JSON.
pub fn render_json_export(entries: &[MassEntry]) -> serde_json::Result<String> {
    let items = entries
        .iter()
        .map(entry_to_export_item)
        .collect::<Vec<ExportEntry>>();
    serde_json::to_string_pretty(&items)
}

/// Render entries as CSV with a header row. Tags are joined with `;`.
#[must_use]
pub fn render_csv_export(entries: &[MassEntry]) -> String {
    let mut output = String::from("id,logged_at,mass,unit,note,tags,status\n");

    for entry in entries {
        let item = entry_to_export_item(entry);
        let _ = writeln!(
            output,
            "{},{},{},{},{},{},{}",
            csv_field(&item.id),
            csv_field(&item.logged_at),
            item.mass,
            item.unit,
            csv_field(item.note.as_deref().unwrap_or_default()),
            csv_field(&item.tags.join(";")),
            item.status
        );
    }

    output
}

pub fn render_entries_export(
    entries: &[MassEntry],
    format: ExportFormat,
) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(entries),
        ExportFormat::Csv => Ok(render_csv_export(entries)),
    }
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("ballast-export-{timestamp_ms}.{}", format.extension())
}

fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map_or_else(|| timestamp_ms.to_string(), |dt| dt.to_rfc3339())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MassUnit, NewMassEntry};
    use pretty_assertions::assert_eq;

    fn entry() -> MassEntry {
        let input = NewMassEntry::new(72.5, MassUnit::Kg)
            .with_note("after \"long\" run, tired")
            .with_tags(["am", "gym"])
            .logged_at(0);
        MassEntry::from_input(input, 1_000).unwrap()
    }

    #[test]
    fn render_csv_export_quotes_fields() {
        let entry = entry();
        let rendered = render_csv_export(&[entry.clone()]);
        let mut lines = rendered.lines();

        assert_eq!(lines.next(), Some("id,logged_at,mass,unit,note,tags,status"));
        assert_eq!(
            lines.next().unwrap(),
            format!(
                "{},1970-01-01T00:00:00+00:00,72.5,kg,\"after \"\"long\"\" run, tired\",am;gym,pending",
                entry.id
            )
        );
    }

    #[test]
    fn render_json_export_uses_readable_timestamps() {
        let rendered = render_json_export(&[entry()]).unwrap();
        let parsed: Vec<ExportEntry> = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed[0].logged_at, "1970-01-01T00:00:00+00:00");
        assert_eq!(parsed[0].tags, vec!["am", "gym"]);
    }

    #[test]
    fn suggested_export_file_name_uses_format_extension() {
        assert_eq!(
            suggested_export_file_name(ExportFormat::Csv, 123),
            "ballast-export-123.csv"
        );
    }
}
