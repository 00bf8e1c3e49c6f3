//! Local user profile model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

use super::entry::{deserialize_unit, MassUnit};

/// Fixed identifier of the single profile row.
pub const LOCAL_PROFILE_ID: &str = "local-profile";

/// The one profile that exists per installation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    #[serde(default, deserialize_with = "deserialize_unit")]
    pub unit_preference: MassUnit,
    pub goal_mass: Option<f64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserProfile {
    /// An empty profile created at `now`.
    #[must_use]
    pub fn new(now: i64) -> Self {
        Self {
            id: LOCAL_PROFILE_ID.to_string(),
            full_name: None,
            email: None,
            bio: None,
            unit_preference: MassUnit::Kg,
            goal_mass: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge mutable fields from `input`, keeping `id` and `created_at`.
    pub fn merge(mut self, input: ProfileInput, now: i64) -> Result<Self> {
        if let Some(full_name) = input.full_name {
            self.full_name = normalize_text_option(Some(full_name));
        }
        if let Some(email) = input.email {
            self.email = normalize_text_option(Some(email));
        }
        if let Some(bio) = input.bio {
            self.bio = normalize_text_option(Some(bio));
        }
        if let Some(unit) = input.unit_preference {
            self.unit_preference = unit;
        }
        if let Some(goal) = input.goal_mass {
            if !(goal.is_finite() && goal > 0.0) {
                return Err(Error::InvalidInput(format!(
                    "goal mass must be a positive number, got {goal}"
                )));
            }
            self.goal_mass = Some(goal);
        }
        self.updated_at = now;
        Ok(self)
    }
}

/// Profile fields to change. `None` keeps the stored value; an empty string
/// clears a text field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileInput {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub unit_preference: Option<MassUnit>,
    pub goal_mass: Option<f64>,
}
