//! Application settings model

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

/// Fixed identifier of the single settings row.
pub const APP_SETTINGS_ID: &str = "app-settings";

const DEFAULT_REMINDER_HOUR: u8 = 20;

/// Application settings. Local only, never synced remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// Whether the connectivity scheduler may arm itself
    pub auto_sync: bool,
    pub reminders_enabled: bool,
    /// Hour of day (0-23) for the daily reminder
    pub reminder_hour: u8,
    /// Last completed sync run without errors (Unix ms)
    pub last_sync: Option<i64>,
    /// Opaque handle of the scheduled reminder, owned by the host
    pub reminder_handle: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_sync: true,
            reminders_enabled: false,
            reminder_hour: DEFAULT_REMINDER_HOUR,
            last_sync: None,
            reminder_handle: None,
            created_at: 0,
            updated_at: 0,
        }
    }
}

impl AppSettings {
    /// Default settings stamped with `now`.
    #[must_use]
    pub fn new(now: i64) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            ..Self::default()
        }
    }

    /// Merge a patch, keeping `created_at`.
    pub fn merge(mut self, patch: SettingsPatch, now: i64) -> Result<Self> {
        if let Some(hour) = patch.reminder_hour {
            if hour > 23 {
                return Err(Error::InvalidInput(format!(
                    "reminder hour must be between 0 and 23, got {hour}"
                )));
            }
            self.reminder_hour = hour;
        }
        if let Some(auto_sync) = patch.auto_sync {
            self.auto_sync = auto_sync;
        }
        if let Some(enabled) = patch.reminders_enabled {
            self.reminders_enabled = enabled;
        }
        if let Some(last_sync) = patch.last_sync {
            self.last_sync = Some(last_sync);
        }
        if let Some(handle) = patch.reminder_handle {
            self.reminder_handle = normalize_text_option(handle);
        }
        self.updated_at = now;
        Ok(self)
    }
}

/// Settings fields to change; `None` keeps the stored value.
/// Stored reminder hour, or the default when outside 0-23.
#[must_use]
pub fn reminder_hour_from_stored(raw: i64) -> u8 {
    u8::try_from(raw)
        .ok()
        .filter(|hour| *hour <= 23)
        .unwrap_or(DEFAULT_REMINDER_HOUR)
}

fn deserialize_reminder_hour<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_i64()
        .map_or(DEFAULT_REMINDER_HOUR, reminder_hour_from_stored))
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub auto_sync: Option<bool>,
    pub reminders_enabled: Option<bool>,
    pub reminder_hour: Option<u8>,
    pub last_sync: Option<i64>,
    /// `Some(None)` clears the handle
    pub reminder_handle: Option<Option<String>>,
}

impl SettingsPatch {
    #[must_use]
    pub fn last_sync(timestamp_ms: i64) -> Self {
        Self {
            last_sync: Some(timestamp_ms),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_stored_hour_reads_as_default() {
        let decoded: AppSettings =
            serde_json::from_str(r#"{"autoSync":false,"reminderHour":99}"#).unwrap();
        assert_eq!(decoded.reminder_hour, 20);
        assert!(!decoded.auto_sync);

        assert_eq!(reminder_hour_from_stored(-1), 20);
        assert_eq!(reminder_hour_from_stored(23), 23);
    }

    #[test]
    fn test_settings_default() {
        let settings = AppSettings::default();
        assert!(settings.auto_sync);
        assert!(!settings.reminders_enabled);
        assert_eq!(settings.reminder_hour, 20);
        assert_eq!(settings.last_sync, None);
    }

    #[test]
    fn test_merge_is_idempotent_per_field() {
        let patch = SettingsPatch {
            auto_sync: Some(false),
            reminder_hour: Some(7),
            reminder_handle: Some(Some("rem-1".to_string())),
            ..SettingsPatch::default()
        };
        let once = AppSettings::new(1).merge(patch.clone(), 2).unwrap();
        let twice = once.clone().merge(patch, 2).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_rejects_out_of_range_hour() {
        let patch = SettingsPatch {
            reminder_hour: Some(24),
            ..SettingsPatch::default()
        };
        assert!(AppSettings::new(1).merge(patch, 2).is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: AppSettings = serde_json::from_str(r#"{"autoSync": false}"#).unwrap();
        assert!(!settings.auto_sync);
        assert_eq!(settings.reminder_hour, 20);
    }
}
