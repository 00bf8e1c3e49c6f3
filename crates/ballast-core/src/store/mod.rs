//! Local store: durable entries, the mutation queue, and the two singletons.
//!
//! Two backends satisfy the same [`LocalStore`] contract: [`SqliteStore`]
//! (libSQL tables) and [`BlobStore`] (one JSON document under a fixed path).
//! [`StoreBackend`] picks one at startup.
//!
//! The mutation queue is the `sync_queue` collection of the store. Its
//! protocol is at-least-once delivery with manual acknowledgment: an intent
//! stays visible from [`LocalStore::enqueue_mutation`] until
//! [`LocalStore::delete_mutation`] is called after the remote confirmed it.

mod blob;
mod sqlite;

use std::future::Future;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::models::{
    AppSettings, EntryId, EntryPatch, EntryStatus, MassEntry, MutationId, MutationOperation,
    NewMassEntry, ProfileInput, SettingsPatch, SyncMutation, UserProfile,
};

pub use blob::BlobStore;
pub use sqlite::SqliteStore;

/// Default page size when draining the queue.
pub const DEFAULT_QUEUE_PAGE_SIZE: usize = 25;

/// Storage operations shared by every backend.
///
/// Every write is durable before its future resolves.
pub trait LocalStore: Send + Sync {
    /// Persist a new pending entry together with its `create` intent.
    fn create_entry(&self, input: NewMassEntry) -> impl Future<Output = Result<MassEntry>> + Send;

    /// Fetch one entry, including soft-deleted ones.
    fn get_entry(&self, id: &EntryId) -> impl Future<Output = Result<Option<MassEntry>>> + Send;

    /// Entries for `profile_id` (or all profiles), newest `logged_at` first.
    fn list_entries(
        &self,
        profile_id: Option<&str>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<MassEntry>>> + Send;

    /// Apply an edit, reset the entry to pending and enqueue an `update` intent.
    fn update_entry(
        &self,
        id: &EntryId,
        patch: EntryPatch,
    ) -> impl Future<Output = Result<MassEntry>> + Send;

    /// Soft delete an entry and enqueue a `delete` intent.
    fn delete_entry(&self, id: &EntryId) -> impl Future<Output = Result<MassEntry>> + Send;

    /// Set status and `updated_at`. Unknown ids are ignored.
    fn update_entry_status(
        &self,
        id: &EntryId,
        status: EntryStatus,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Append an intent with no attempts recorded.
    fn enqueue_mutation(
        &self,
        entity_id: &EntryId,
        operation: MutationOperation,
        payload: Value,
    ) -> impl Future<Output = Result<MutationId>> + Send;

    /// Intents in queue order (oldest `created_at` first).
    fn list_pending_mutations(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<SyncMutation>>> + Send;

    fn count_pending_mutations(&self) -> impl Future<Output = Result<usize>> + Send;

    /// Remove an acknowledged intent. Idempotent.
    fn delete_mutation(&self, id: &MutationId) -> impl Future<Output = Result<()>> + Send;

    /// Count a failed attempt and remember its message. Unknown ids are ignored.
    fn record_mutation_error(
        &self,
        id: &MutationId,
        message: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn get_profile(&self) -> impl Future<Output = Result<Option<UserProfile>>> + Send;

    /// Merge into the stored profile (creating it on first save).
    fn save_profile(&self, input: ProfileInput)
        -> impl Future<Output = Result<UserProfile>> + Send;

    /// Stored settings, or defaults when none are stored or they are unreadable.
    fn get_settings(&self) -> impl Future<Output = Result<AppSettings>> + Send;

    /// Merge into the stored settings (creating them on first save).
    fn save_settings(
        &self,
        patch: SettingsPatch,
    ) -> impl Future<Output = Result<AppSettings>> + Send;
}

/// Which backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Prefer libSQL, fall back to the blob file when it cannot be opened
    #[default]
    Auto,
    Sqlite,
    Blob,
}

impl std::str::FromStr for StorageKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "sqlite" => Ok(Self::Sqlite),
            "blob" | "json" => Ok(Self::Blob),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown storage backend '{other}'"
            ))),
        }
    }
}

/// Store chosen at startup; callers only see [`LocalStore`].
#[derive(Clone)]
pub enum StoreBackend {
    Sqlite(SqliteStore),
    Blob(BlobStore),
}

impl StoreBackend {
    /// Open the requested backend under `data_dir`.
    ///
    /// `Auto` tries `ballast.db` first and falls back to `ballast.json`.
    pub async fn open(kind: StorageKind, data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let db_path = data_dir.join("ballast.db");
        let blob_path = data_dir.join("ballast.json");

        match kind {
            StorageKind::Sqlite => Ok(Self::Sqlite(SqliteStore::open(db_path).await?)),
            StorageKind::Blob => Ok(Self::Blob(BlobStore::open(blob_path).await?)),
            StorageKind::Auto => match SqliteStore::open(&db_path).await {
                Ok(store) => Ok(Self::Sqlite(store)),
                Err(error) => {
                    tracing::warn!(
                        "Native store unavailable at {} ({}); using blob store at {}",
                        db_path.display(),
                        error,
                        blob_path.display()
                    );
                    Ok(Self::Blob(BlobStore::open(blob_path).await?))
                }
            },
        }
    }

    #[must_use]
    pub const fn kind(&self) -> StorageKind {
        match self {
            Self::Sqlite(_) => StorageKind::Sqlite,
            Self::Blob(_) => StorageKind::Blob,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            Self::Sqlite($store) => $call.await,
            Self::Blob($store) => $call.await,
        }
    };
}

impl LocalStore for StoreBackend {
    async fn create_entry(&self, input: NewMassEntry) -> Result<MassEntry> {
        dispatch!(self, store => store.create_entry(input))
    }

    async fn get_entry(&self, id: &EntryId) -> Result<Option<MassEntry>> {
        dispatch!(self, store => store.get_entry(id))
    }

    async fn list_entries(&self, profile_id: Option<&str>, limit: usize) -> Result<Vec<MassEntry>> {
        dispatch!(self, store => store.list_entries(profile_id, limit))
    }

    async fn update_entry(&self, id: &EntryId, patch: EntryPatch) -> Result<MassEntry> {
        dispatch!(self, store => store.update_entry(id, patch))
    }

    async fn delete_entry(&self, id: &EntryId) -> Result<MassEntry> {
        dispatch!(self, store => store.delete_entry(id))
    }

    async fn update_entry_status(&self, id: &EntryId, status: EntryStatus) -> Result<()> {
        dispatch!(self, store => store.update_entry_status(id, status))
    }

    async fn enqueue_mutation(
        &self,
        entity_id: &EntryId,
        operation: MutationOperation,
        payload: Value,
    ) -> Result<MutationId> {
        dispatch!(self, store => store.enqueue_mutation(entity_id, operation, payload))
    }

    async fn list_pending_mutations(&self, limit: usize) -> Result<Vec<SyncMutation>> {
        dispatch!(self, store => store.list_pending_mutations(limit))
    }

    async fn count_pending_mutations(&self) -> Result<usize> {
        dispatch!(self, store => store.count_pending_mutations())
    }

    async fn delete_mutation(&self, id: &MutationId) -> Result<()> {
        dispatch!(self, store => store.delete_mutation(id))
    }

    async fn record_mutation_error(&self, id: &MutationId, message: &str) -> Result<()> {
        dispatch!(self, store => store.record_mutation_error(id, message))
    }

    async fn get_profile(&self) -> Result<Option<UserProfile>> {
        dispatch!(self, store => store.get_profile())
    }

    async fn save_profile(&self, input: ProfileInput) -> Result<UserProfile> {
        dispatch!(self, store => store.save_profile(input))
    }

    async fn get_settings(&self) -> Result<AppSettings> {
        dispatch!(self, store => store.get_settings())
    }

    async fn save_settings(&self, patch: SettingsPatch) -> Result<AppSettings> {
        dispatch!(self, store => store.save_settings(patch))
    }
}

/// Payload recorded for a `delete` intent.
pub(crate) fn delete_payload(id: &EntryId) -> Value {
    serde_json::json!({ "id": id.as_str() })
}

/// Convert a caller-facing limit to a SQL/`take` bound.
pub(crate) fn limit_to_i64(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
