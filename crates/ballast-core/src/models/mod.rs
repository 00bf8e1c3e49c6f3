//! Data models for Ballast

mod entry;
mod mutation;
mod profile;
mod settings;
pub mod tags;

pub use entry::{EntryId, EntryPatch, EntryStatus, MassEntry, MassUnit, NewMassEntry};
pub use mutation::{
    attempts_from_stored, MutationId, MutationOperation, SyncMutation, MASS_ENTRY_ENTITY,
};
pub use profile::{ProfileInput, UserProfile, LOCAL_PROFILE_ID};
pub use settings::{reminder_hour_from_stored, AppSettings, SettingsPatch, APP_SETTINGS_ID};
