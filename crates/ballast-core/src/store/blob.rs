//! Blob implementation of `LocalStore`: one JSON document holding every
//! collection, rewritten whole on each change.
//!
//! Several processes may share one blob (a `watch` loop next to an `add`),
//! so every operation takes an advisory lock on `<name>.lock` and works
//! from the file as it is on disk, never from a stale copy.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{
    AppSettings, EntryId, EntryPatch, EntryStatus, MassEntry, MutationId, MutationOperation,
    NewMassEntry, ProfileInput, SettingsPatch, SyncMutation, UserProfile,
};
use crate::util::now_millis;

use super::{delete_payload, LocalStore};

/// Serialized layout of the blob.
///
/// Collections are decoded record by record, so one unreadable record is
/// dropped instead of taking the whole blob down with it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BlobState {
    #[serde(deserialize_with = "lenient_records")]
    mass_entries: Vec<MassEntry>,
    #[serde(deserialize_with = "lenient_records")]
    sync_queue: Vec<SyncMutation>,
    #[serde(deserialize_with = "lenient_record")]
    profiles: Option<UserProfile>,
    #[serde(deserialize_with = "lenient_record")]
    app_settings: Option<AppSettings>,
}

impl BlobState {
    fn entry_mut(&mut self, id: &EntryId) -> Option<&mut MassEntry> {
        self.mass_entries.iter_mut().find(|entry| &entry.id == id)
    }

    fn live_entry_mut(&mut self, id: &EntryId) -> Result<&mut MassEntry> {
        self.entry_mut(id)
            .filter(|entry| !entry.is_deleted)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

fn lenient_records<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let records = match Value::deserialize(deserializer)? {
        Value::Array(records) => records,
        Value::Null => return Ok(Vec::new()),
        _ => {
            tracing::warn!("Ignoring stored collection that is not a list");
            return Ok(Vec::new());
        }
    };

    Ok(records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::warn!("Dropping unreadable stored record: {}", error);
                None
            }
        })
        .collect())
}

/// Unreadable singletons are treated as absent.
fn lenient_record<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(record) => Ok(Some(record)),
        Err(error) => {
            tracing::warn!("Ignoring malformed stored record: {}", error);
            Ok(None)
        }
    }
}

/// JSON-file store for hosts without a native database.
///
/// Writes apply to the state just read from disk and are persisted before
/// they are published, so a failed write leaves both file and cache
/// untouched. Without a path the cache is the whole store.
#[derive(Clone)]
pub struct BlobStore {
    path: Option<PathBuf>,
    state: Arc<Mutex<BlobState>>,
}

impl BlobStore {
    /// Load the blob at `path`, starting empty when it does not exist.
    ///
    /// A blob that cannot be parsed is moved aside to
    /// `<name>.corrupt-<millis>` and the store starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let state = with_file_lock(&path, || load(&path))?;
        Ok(Self {
            path: Some(path),
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// A store that never touches disk (primarily for tests).
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Arc::new(Mutex::new(BlobState::default())),
        }
    }

    /// Async twin of [`BlobStore::in_memory`], matching `SqliteStore`.
    #[allow(clippy::unused_async)]
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::in_memory())
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Apply `change` to the current state, persist it, then publish it.
    async fn write<T>(&self, change: impl FnOnce(&mut BlobState) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock().await;
        let Some(path) = &self.path else {
            let mut next = state.clone();
            let output = change(&mut next)?;
            *state = next;
            return Ok(output);
        };

        // No await while the file lock is held
        let (next, output) = with_file_lock(path, || {
            let mut next = load(path)?;
            let output = change(&mut next)?;
            persist(path, &next)?;
            Ok((next, output))
        })?;
        *state = next;
        Ok(output)
    }

    async fn read<T>(&self, view: impl FnOnce(&BlobState) -> T) -> Result<T> {
        let mut state = self.state.lock().await;
        if let Some(path) = &self.path {
            *state = with_file_lock(path, || load(path))?;
        }
        Ok(view(&state))
    }
}

/// Run `work` while holding the exclusive lock on the blob's lock file.
///
/// Reads take the exclusive lock too, since loading may quarantine the blob.
fn with_file_lock<T>(path: &Path, work: impl FnOnce() -> Result<T>) -> Result<T> {
    let lock_path = sibling(path, "lock");
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| Error::Storage(format!("cannot open {}: {e}", lock_path.display())))?;
    let mut lock = fd_lock::RwLock::new(file);
    let _guard = lock
        .write()
        .map_err(|e| Error::Storage(format!("cannot lock {}: {e}", lock_path.display())))?;
    work()
}

fn load(path: &Path) -> Result<BlobState> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Ok(BlobState::default())
        }
        Err(error) => return Err(error.into()),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(BlobState::default());
    }

    match serde_json::from_slice(&bytes) {
        Ok(state) => Ok(state),
        Err(error) => {
            tracing::warn!("Blob store at {} is unreadable: {}", path.display(), error);
            quarantine(path)?;
            Ok(BlobState::default())
        }
    }
}

fn persist(path: &Path, state: &BlobState) -> Result<()> {
    let bytes = serde_json::to_vec(state)?;
    let tmp_path = sibling(path, "tmp");

    let mut file = std::fs::File::create(&tmp_path)
        .map_err(|e| Error::Storage(format!("cannot write {}: {e}", tmp_path.display())))?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Storage(format!("cannot replace {}: {e}", path.display())))?;
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "ballast.json".into(), |name| name.to_string_lossy().to_string());
    path.with_file_name(format!("{name}.{suffix}"))
}

fn quarantine(path: &Path) -> Result<()> {
    let backup_path = sibling(path, &format!("corrupt-{}", now_millis()));
    std::fs::rename(path, &backup_path)?;
    tracing::warn!(
        "Moved corrupted blob store from {} to {}",
        path.display(),
        backup_path.display()
    );
    Ok(())
}

impl LocalStore for BlobStore {
    async fn create_entry(&self, input: NewMassEntry) -> Result<MassEntry> {
        let now = now_millis();
        let entry = MassEntry::from_input(input, now)?;
        let mutation = SyncMutation::new(
            entry.id.clone(),
            MutationOperation::Create,
            entry.payload()?,
            now,
        );

        self.write(|state| {
            state.mass_entries.push(entry.clone());
            state.sync_queue.push(mutation);
            Ok(())
        })
        .await?;
        Ok(entry)
    }

    async fn get_entry(&self, id: &EntryId) -> Result<Option<MassEntry>> {
        self.read(|state| state.mass_entries.iter().find(|e| &e.id == id).cloned())
            .await
    }

    async fn list_entries(&self, profile_id: Option<&str>, limit: usize) -> Result<Vec<MassEntry>> {
        self.read(|state| {
            let mut entries = state
                .mass_entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| !entry.is_deleted)
                .filter(|(_, entry)| profile_id.is_none_or(|id| entry.profile_id == id))
                .collect::<Vec<_>>();

            entries.sort_by(|(a_pos, a), (b_pos, b)| {
                b.logged_at
                    .cmp(&a.logged_at)
                    .then(b.created_at.cmp(&a.created_at))
                    .then(b_pos.cmp(a_pos))
            });

            entries
                .into_iter()
                .take(limit)
                .map(|(_, entry)| entry.clone())
                .collect()
        })
        .await
    }

    async fn update_entry(&self, id: &EntryId, patch: EntryPatch) -> Result<MassEntry> {
        let now = now_millis();
        self.write(|state| {
            let entry = state.live_entry_mut(id)?;
            entry.apply_patch(patch, now)?;
            let updated = entry.clone();
            state.sync_queue.push(SyncMutation::new(
                updated.id.clone(),
                MutationOperation::Update,
                updated.payload()?,
                now,
            ));
            Ok(updated)
        })
        .await
    }

    async fn delete_entry(&self, id: &EntryId) -> Result<MassEntry> {
        let now = now_millis();
        self.write(|state| {
            let entry = state.live_entry_mut(id)?;
            entry.is_deleted = true;
            entry.status = EntryStatus::Pending;
            entry.updated_at = now;
            let deleted = entry.clone();
            state.sync_queue.push(SyncMutation::new(
                deleted.id.clone(),
                MutationOperation::Delete,
                delete_payload(id),
                now,
            ));
            Ok(deleted)
        })
        .await
    }

    async fn update_entry_status(&self, id: &EntryId, status: EntryStatus) -> Result<()> {
        if self.get_entry(id).await?.is_none() {
            return Ok(());
        }
        let now = now_millis();
        self.write(|state| {
            if let Some(entry) = state.entry_mut(id) {
                entry.status = status;
                entry.updated_at = now;
            }
            Ok(())
        })
        .await
    }

    async fn enqueue_mutation(
        &self,
        entity_id: &EntryId,
        operation: MutationOperation,
        payload: Value,
    ) -> Result<MutationId> {
        let mutation = SyncMutation::new(entity_id.clone(), operation, payload, now_millis());
        let id = mutation.id.clone();
        self.write(|state| {
            state.sync_queue.push(mutation);
            Ok(())
        })
        .await?;
        Ok(id)
    }

    async fn list_pending_mutations(&self, limit: usize) -> Result<Vec<SyncMutation>> {
        self.read(|state| {
            let mut queue = state.sync_queue.iter().collect::<Vec<_>>();
            // Stable, so equal timestamps keep append order
            queue.sort_by_key(|mutation| mutation.created_at);
            queue.into_iter().take(limit).cloned().collect()
        })
        .await
    }

    async fn count_pending_mutations(&self) -> Result<usize> {
        self.read(|state| state.sync_queue.len()).await
    }

    async fn delete_mutation(&self, id: &MutationId) -> Result<()> {
        let present = self
            .read(|state| state.sync_queue.iter().any(|m| &m.id == id))
            .await?;
        if !present {
            return Ok(());
        }
        self.write(|state| {
            state.sync_queue.retain(|m| &m.id != id);
            Ok(())
        })
        .await
    }

    async fn record_mutation_error(&self, id: &MutationId, message: &str) -> Result<()> {
        let now = now_millis();
        self.write(|state| {
            if let Some(mutation) = state.sync_queue.iter_mut().find(|m| &m.id == id) {
                mutation.record_error(message, now);
            }
            Ok(())
        })
        .await
    }

    async fn get_profile(&self) -> Result<Option<UserProfile>> {
        self.read(|state| state.profiles.clone()).await
    }

    async fn save_profile(&self, input: ProfileInput) -> Result<UserProfile> {
        let now = now_millis();
        self.write(|state| {
            let profile = state
                .profiles
                .take()
                .unwrap_or_else(|| UserProfile::new(now))
                .merge(input, now)?;
            state.profiles = Some(profile.clone());
            Ok(profile)
        })
        .await
    }

    async fn get_settings(&self) -> Result<AppSettings> {
        self.read(|state| state.app_settings.clone().unwrap_or_default())
            .await
    }

    async fn save_settings(&self, patch: SettingsPatch) -> Result<AppSettings> {
        let now = now_millis();
        self.write(|state| {
            let settings = state
                .app_settings
                .take()
                .unwrap_or_else(|| AppSettings::new(now))
                .merge(patch, now)?;
            state.app_settings = Some(settings.clone());
            Ok(settings)
        })
        .await
    }
}
