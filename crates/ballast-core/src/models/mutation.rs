//! Queued sync mutation (intent) model

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

use super::entry::EntryId;

/// Entity tag carried by every mass entry intent.
pub const MASS_ENTRY_ENTITY: &str = "mass_entry";

/// Identifier of a queued intent, distinct from the entity it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(String);

impl MutationId {
    /// Create a new unique mutation ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MutationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MutationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Remote operation an intent stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOperation {
    Create,
    Update,
    Delete,
}

impl MutationOperation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Whether the request for this operation carries a body.
    #[must_use]
    pub const fn has_body(self) -> bool {
        !matches!(self, Self::Delete)
    }
}

impl fmt::Display for MutationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!(
                "unknown mutation operation '{other}'"
            ))),
        }
    }
}

/// A durable record of one write still owed to the remote service.
///
/// Removed only after the remote confirms it; otherwise it stays queued and
/// accumulates `attempts` and `last_error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMutation {
    pub id: MutationId,
    pub entity_type: String,
    pub entity_id: EntryId,
    pub operation: MutationOperation,
    /// Snapshot needed to perform the remote call
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, deserialize_with = "deserialize_attempts")]
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SyncMutation {
    /// Build a fresh intent with no attempts recorded.
    #[must_use]
    pub fn new(
        entity_id: EntryId,
        operation: MutationOperation,
        payload: serde_json::Value,
        now: i64,
    ) -> Self {
        Self {
            id: MutationId::new(),
            entity_type: MASS_ENTRY_ENTITY.to_string(),
            entity_id,
            operation,
            payload,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a failed send attempt.
    pub fn record_error(&mut self, message: &str, now: i64) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(message.to_string());
        self.updated_at = now;
    }
}

/// Clamp a stored attempt count into `u32`; negatives and non-numbers read as 0.
#[must_use]
pub fn attempts_from_stored(raw: i64) -> u32 {
    u32::try_from(raw.max(0)).unwrap_or(u32::MAX)
}

fn deserialize_attempts<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_i64().map_or(0, attempts_from_stored))
}
