//! Mass entry model

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

use super::profile::LOCAL_PROFILE_ID;
use super::tags::{deserialize_lenient, normalize_tags};

/// An opaque, globally unique entry identifier.
///
/// Locally minted ids are UUID v7 strings, so they sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Create a new unique entry ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Unit a mass was recorded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MassUnit {
    /// Kilograms
    #[default]
    Kg,
    /// Pounds
    Lb,
}

impl MassUnit {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kg => "kg",
            Self::Lb => "lb",
        }
    }
}

impl fmt::Display for MassUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MassUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kg" | "kgs" => Ok(Self::Kg),
            "lb" | "lbs" => Ok(Self::Lb),
            other => Err(Error::InvalidInput(format!("unknown mass unit '{other}'"))),
        }
    }
}

/// Remote sync state of an entry.
///
/// `Failed` means "not yet synced, last attempt errored"; it still displays
/// as an unsynced item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Pending,
    Synced,
    Failed,
}

impl EntryStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }

    /// Decode a stored status, treating unknown values as `Pending`.
    #[must_use]
    pub fn from_stored(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "failed" => Ok(Self::Failed),
            other => Err(Error::InvalidInput(format!("unknown entry status '{other}'"))),
        }
    }
}

/// A single logged mass measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MassEntry {
    /// Unique identifier, immutable
    pub id: EntryId,
    /// Owning profile
    pub profile_id: String,
    /// Measured mass, always positive
    pub mass: f64,
    #[serde(default, deserialize_with = "deserialize_unit")]
    pub unit: MassUnit,
    pub note: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub tags: Vec<String>,
    /// When the measurement was taken (Unix ms, may be back-dated)
    pub logged_at: i64,
    #[serde(default, deserialize_with = "deserialize_status")]
    pub status: EntryStatus,
    /// Record creation timestamp (Unix ms)
    pub created_at: i64,
    /// Record update timestamp (Unix ms)
    pub updated_at: i64,
    /// Soft delete flag; deleted entries stay stored until the remote confirms
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_deleted: bool,
}

impl MassEntry {
    /// Build a fresh pending record from user input.
    pub fn from_input(input: NewMassEntry, now: i64) -> Result<Self> {
        validate_mass(input.mass)?;

        Ok(Self {
            id: EntryId::new(),
            profile_id: normalize_text_option(input.profile_id)
                .unwrap_or_else(|| LOCAL_PROFILE_ID.to_string()),
            mass: input.mass,
            unit: input.unit,
            note: normalize_text_option(input.note),
            tags: normalize_tags(input.tags),
            logged_at: input.logged_at.unwrap_or(now),
            status: EntryStatus::Pending,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        })
    }

    /// Apply a user edit, returning the entry to `Pending`.
    pub fn apply_patch(&mut self, patch: EntryPatch, now: i64) -> Result<()> {
        if let Some(mass) = patch.mass {
            validate_mass(mass)?;
            self.mass = mass;
        }
        if let Some(unit) = patch.unit {
            self.unit = unit;
        }
        if let Some(note) = patch.note {
            self.note = normalize_text_option(note);
        }
        if let Some(tags) = patch.tags {
            self.tags = normalize_tags(tags);
        }
        if let Some(logged_at) = patch.logged_at {
            self.logged_at = logged_at;
        }
        self.status = EntryStatus::Pending;
        self.updated_at = now;
        Ok(())
    }

    /// Snapshot of this entry as sent to the remote service.
    pub fn payload(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    #[must_use]
    pub const fn is_synced(&self) -> bool {
        matches!(self.status, EntryStatus::Synced)
    }
}

/// User input for a new entry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewMassEntry {
    /// Defaults to the local profile when absent
    pub profile_id: Option<String>,
    pub mass: f64,
    pub unit: MassUnit,
    pub note: Option<String>,
    pub tags: Vec<String>,
    /// Defaults to "now" when absent
    pub logged_at: Option<i64>,
}

impl NewMassEntry {
    #[must_use]
    pub fn new(mass: f64, unit: MassUnit) -> Self {
        Self {
            mass,
            unit,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn logged_at(mut self, timestamp_ms: i64) -> Self {
        self.logged_at = Some(timestamp_ms);
        self
    }

    #[must_use]
    pub fn for_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }
}

/// Partial edit of an existing entry. `None` leaves a field untouched;
/// `note: Some(None)` clears the note.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntryPatch {
    pub mass: Option<f64>,
    pub unit: Option<MassUnit>,
    pub note: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub logged_at: Option<i64>,
}

impl EntryPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.mass.is_none()
            && self.unit.is_none()
            && self.note.is_none()
            && self.tags.is_none()
            && self.logged_at.is_none()
    }
}

/// Serde adapter reading an unknown unit as kilograms.
pub(crate) fn deserialize_unit<'de, D>(deserializer: D) -> std::result::Result<MassUnit, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_str()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_else(|| {
            tracing::warn!("Reading unknown stored unit {} as kg", value);
            MassUnit::Kg
        }))
}

/// Serde adapter reading an unknown status as `Pending`.
fn deserialize_status<'de, D>(deserializer: D) -> std::result::Result<EntryStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_str()
        .map_or_else(EntryStatus::default, EntryStatus::from_stored))
}

fn validate_mass(mass: f64) -> Result<()> {
    if mass.is_finite() && mass > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "mass must be a positive number, got {mass}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entry_id_unique() {
        assert_ne!(EntryId::new(), EntryId::new());
    }

    #[test]
    fn test_from_input_defaults() {
        let entry = MassEntry::from_input(NewMassEntry::new(70.4, MassUnit::Kg), 1_000).unwrap();
        assert_eq!(entry.status, EntryStatus::Pending);
        assert_eq!(entry.profile_id, LOCAL_PROFILE_ID);
        assert_eq!(entry.logged_at, 1_000);
        assert_eq!(entry.created_at, entry.updated_at);
        assert!(entry.tags.is_empty());
    }

    #[test]
    fn test_from_input_keeps_backdated_logged_at() {
        let input = NewMassEntry::new(150.0, MassUnit::Lb)
            .logged_at(500)
            .with_note("  after breakfast ")
            .with_tags(["home", " ", "scale-a"]);
        let entry = MassEntry::from_input(input, 1_000).unwrap();
        assert_eq!(entry.logged_at, 500);
        assert_eq!(entry.note.as_deref(), Some("after breakfast"));
        assert_eq!(entry.tags, vec!["home", "scale-a"]);
    }

    #[test]
    fn test_from_input_rejects_non_positive_mass() {
        for mass in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let result = MassEntry::from_input(NewMassEntry::new(mass, MassUnit::Kg), 1);
            assert!(matches!(result, Err(Error::InvalidInput(_))));
        }
    }

    #[test]
    fn test_apply_patch_resets_status() {
        let mut entry =
            MassEntry::from_input(NewMassEntry::new(80.0, MassUnit::Kg).with_note("x"), 1).unwrap();
        entry.status = EntryStatus::Synced;

        let patch = EntryPatch {
            mass: Some(79.5),
            note: Some(None),
            ..EntryPatch::default()
        };
        entry.apply_patch(patch, 9).unwrap();

        assert_eq!(entry.mass, 79.5);
        assert_eq!(entry.note, None);
        assert_eq!(entry.status, EntryStatus::Pending);
        assert_eq!(entry.updated_at, 9);
        assert_eq!(entry.created_at, 1);
    }

    #[test]
    fn test_payload_uses_camel_case_fields() {
        let entry = MassEntry::from_input(NewMassEntry::new(70.4, MassUnit::Kg), 42).unwrap();
        let payload = entry.payload().unwrap();

        assert_eq!(payload["profileId"], LOCAL_PROFILE_ID);
        assert_eq!(payload["unit"], "kg");
        assert_eq!(payload["status"], "pending");
        assert_eq!(payload["loggedAt"], 42);
        assert!(payload.get("isDeleted").is_none());
    }

    #[test]
    fn test_status_from_stored_is_lenient() {
        assert_eq!(EntryStatus::from_stored("synced"), EntryStatus::Synced);
        assert_eq!(EntryStatus::from_stored("???"), EntryStatus::Pending);
    }

    #[test]
    fn test_unknown_stored_enums_degrade() {
        let entry = MassEntry::from_input(NewMassEntry::new(70.4, MassUnit::Lb), 42).unwrap();
        let mut stored = serde_json::to_value(&entry).unwrap();
        stored["status"] = serde_json::json!("archived");
        stored["unit"] = serde_json::json!(3);

        let decoded: MassEntry = serde_json::from_value(stored).unwrap();
        assert_eq!(decoded.status, EntryStatus::Pending);
        assert_eq!(decoded.unit, MassUnit::Kg);
        assert_eq!(decoded.id, entry.id);
    }

    #[test]
    fn test_unit_parse() {
        assert_eq!("KG".parse::<MassUnit>().unwrap(), MassUnit::Kg);
        assert_eq!("lbs".parse::<MassUnit>().unwrap(), MassUnit::Lb);
        assert!("stone".parse::<MassUnit>().is_err());
    }
}
