use std::env;
use std::path::{Path, PathBuf};

use ballast_core::models::SyncMutation;
use ballast_core::util::normalize_text_option;
use ballast_core::{EntryId, LocalStore, MassEntry, StoreBackend, SyncConfig};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;

use crate::config_file::{default_config_path, CliConfig};
use crate::error::CliError;

/// Paths every command works against.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
}

impl CliContext {
    pub fn resolve(cli_data_dir: Option<PathBuf>, cli_config: Option<PathBuf>) -> Self {
        Self {
            data_dir: resolve_data_dir(cli_data_dir),
            config_path: cli_config
                .or_else(|| env::var_os("BALLAST_CONFIG").map(PathBuf::from))
                .unwrap_or_else(default_config_path),
        }
    }

    pub fn load_config(&self) -> Result<CliConfig, CliError> {
        CliConfig::load_from_path(&self.config_path).map_err(CliError::Config)
    }

    pub fn sync_config(&self) -> Result<SyncConfig, CliError> {
        self.load_config()?.sync_config().map_err(CliError::Config)
    }

    pub async fn open_store(&self) -> Result<StoreBackend, CliError> {
        let config = self.load_config()?;
        Ok(StoreBackend::open(config.storage_kind(), &self.data_dir).await?)
    }
}

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub id: String,
    pub mass: f64,
    pub unit: String,
    pub note: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub logged_at: i64,
    pub logged_at_iso: String,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct QueueItem {
    pub id: String,
    pub operation: String,
    pub entity_id: String,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: i64,
}

pub fn resolve_data_dir(cli_data_dir: Option<PathBuf>) -> PathBuf {
    cli_data_dir
        .or_else(|| env::var_os("BALLAST_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(default_data_dir)
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ballast")
}

/// `--token` first, then `BALLAST_TOKEN`.
pub fn resolve_token(explicit: Option<String>) -> Option<String> {
    normalize_text_option(explicit).or_else(|| normalize_text_option(env::var("BALLAST_TOKEN").ok()))
}

pub fn normalize_entry_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyEntryId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Find a live entry by exact id or unique id prefix.
pub async fn resolve_entry<S: LocalStore>(query: &str, store: &S) -> Result<MassEntry, CliError> {
    if let Some(entry) = store.get_entry(&EntryId::from(query)).await? {
        if !entry.is_deleted {
            return Ok(entry);
        }
    }

    let matching = store
        .list_entries(None, usize::MAX)
        .await?
        .into_iter()
        .filter(|entry| entry.id.as_str().starts_with(query))
        .take(3)
        .collect::<Vec<_>>();

    match matching.len() {
        0 => Err(CliError::EntryNotFound(query.to_string())),
        1 => matching
            .into_iter()
            .next()
            .ok_or_else(|| CliError::EntryNotFound(query.to_string())),
        _ => {
            let options = matching
                .iter()
                .map(|entry| short_id(entry.id.as_str()))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousEntryId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM`, `YYYY-MM-DD` (local time) or Unix ms.
pub fn parse_logged_at(raw: &str) -> Result<i64, CliError> {
    let value = raw.trim();
    let invalid = || CliError::InvalidTimestamp(value.to_string());

    if let Ok(millis) = value.parse::<i64>() {
        return Ok(millis);
    }
    if let Ok(date_time) = DateTime::parse_from_rfc3339(value) {
        return Ok(date_time.timestamp_millis());
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(invalid)?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|date_time| date_time.timestamp_millis())
        .ok_or_else(invalid)
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn format_entry_lines(entries: &[MassEntry]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    entries
        .iter()
        .map(|entry| {
            let id = short_id(entry.id.as_str());
            let mass = format!("{:.1} {}", entry.mass, entry.unit);
            let when = format_relative_time(entry.logged_at, now_ms);
            let status = entry.status.as_str();
            let tags = render_tags(&entry.tags);
            let note = entry.note.as_deref().unwrap_or_default();

            let mut line = format!("{id:<13}  {mass:>9}  {when:<10}  {status:<7}");
            if !tags.is_empty() {
                line.push_str("  ");
                line.push_str(&tags);
            }
            if !note.is_empty() {
                line.push_str("  ");
                line.push_str(note);
            }
            line
        })
        .collect()
}

pub fn entry_to_list_item(entry: &MassEntry) -> EntryListItem {
    let now_ms = Utc::now().timestamp_millis();
    EntryListItem {
        id: entry.id.to_string(),
        mass: entry.mass,
        unit: entry.unit.to_string(),
        note: entry.note.clone(),
        tags: entry.tags.clone(),
        status: entry.status.to_string(),
        logged_at: entry.logged_at,
        logged_at_iso: format_sync_timestamp(entry.logged_at),
        relative_time: format_relative_time(entry.logged_at, now_ms),
    }
}

pub fn mutation_to_queue_item(mutation: &SyncMutation) -> QueueItem {
    QueueItem {
        id: mutation.id.to_string(),
        operation: mutation.operation.to_string(),
        entity_id: mutation.entity_id.to_string(),
        attempts: mutation.attempts,
        last_error: mutation.last_error.clone(),
        created_at: mutation.created_at,
    }
}

pub fn format_queue_lines(mutations: &[SyncMutation]) -> Vec<String> {
    mutations
        .iter()
        .map(|mutation| {
            let mut line = format!(
                "{}  {:<6}  entry={}  attempts={}",
                format_sync_timestamp(mutation.created_at),
                mutation.operation,
                short_id(mutation.entity_id.as_str()),
                mutation.attempts
            );
            if let Some(error) = &mutation.last_error {
                line.push_str("  last_error=");
                line.push_str(error);
            }
            line
        })
        .collect()
}

pub fn render_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Write to `output_path` (printing the path) or to stdout.
pub fn write_output(rendered: &str, output_path: Option<&Path>) -> Result<(), CliError> {
    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }
    Ok(())
}
