//! libSQL implementation of `LocalStore`

use std::path::Path;
use std::sync::Arc;

use libsql::{Connection, Row, Value as SqlValue};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::tags::{decode_tags, encode_tags};
use crate::models::{
    AppSettings, EntryId, EntryPatch, EntryStatus, MassEntry, MassUnit, MutationId,
    MutationOperation, NewMassEntry, ProfileInput, SettingsPatch, SyncMutation, UserProfile,
    attempts_from_stored, reminder_hour_from_stored, APP_SETTINGS_ID, LOCAL_PROFILE_ID,
};
use crate::util::now_millis;

use super::{delete_payload, limit_to_i64, LocalStore};

const ENTRY_COLUMNS: &str = "id, profile_id, mass, unit, note, tags, logged_at, status, \
                             created_at, updated_at, is_deleted";

const MUTATION_COLUMNS: &str = "id, entity_type, entity_id, operation, payload, attempts, \
                                last_error, created_at, updated_at";

// Rows with any other operation stay stored but are never replayed, so they
// cannot hold a page slot at the head of the queue.
const KNOWN_OPERATIONS: &str = "operation IN ('create', 'update', 'delete')";

/// Table-backed store. Statements are serialized through one connection.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteStore {
    /// Open (and migrate) the database file, creating parent directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let db = Database::open(path).await?;
        Ok(Self::from_database(db))
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self::from_database(db))
    }

    #[must_use]
    pub fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    fn parse_entry(row: &Row) -> Result<MassEntry> {
        let id: String = row.get(0)?;
        let unit: String = row.get(3)?;
        let tags: String = row.get::<String>(5).unwrap_or_default();
        let status: String = row.get(7)?;

        Ok(MassEntry {
            id: EntryId::from(id),
            profile_id: row.get(1)?,
            mass: real_value(row, 2)?.unwrap_or_default(),
            unit: unit.parse().unwrap_or(MassUnit::Kg),
            note: optional_text(row, 4)?,
            tags: decode_tags(&tags),
            logged_at: row.get(6)?,
            status: EntryStatus::from_stored(&status),
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            is_deleted: row.get::<i64>(10)? != 0,
        })
    }

    fn parse_mutation(row: &Row) -> Result<SyncMutation> {
        let id: String = row.get(0)?;
        let entity_id: String = row.get(2)?;
        let operation: String = row.get(3)?;
        let payload: String = row.get::<String>(4).unwrap_or_default();
        let attempts: i64 = row.get(5)?;

        Ok(SyncMutation {
            id: MutationId::from(id),
            entity_type: row.get(1)?,
            entity_id: EntryId::from(entity_id),
            operation: operation.parse()?,
            payload: serde_json::from_str(&payload).unwrap_or(Value::Null),
            attempts: attempts_from_stored(attempts),
            last_error: optional_text(row, 6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn parse_profile(row: &Row) -> Result<UserProfile> {
        let unit: String = row.get::<String>(4).unwrap_or_default();
        Ok(UserProfile {
            id: row.get(0)?,
            full_name: optional_text(row, 1)?,
            email: optional_text(row, 2)?,
            bio: optional_text(row, 3)?,
            unit_preference: unit.parse().unwrap_or_default(),
            goal_mass: real_value(row, 5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn parse_settings(row: &Row) -> Result<AppSettings> {
        let hour: i64 = row.get(2)?;
        Ok(AppSettings {
            auto_sync: row.get::<i64>(0)? != 0,
            reminders_enabled: row.get::<i64>(1)? != 0,
            reminder_hour: reminder_hour_from_stored(hour),
            last_sync: integer_value(row, 3)?,
            reminder_handle: optional_text(row, 4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    async fn fetch_entry(conn: &Connection, id: &EntryId) -> Result<Option<MassEntry>> {
        let mut rows = conn
            .query(
                &format!("SELECT {ENTRY_COLUMNS} FROM mass_entries WHERE id = ?"),
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_entry(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_entry(conn: &Connection, entry: &MassEntry) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT INTO mass_entries ({ENTRY_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            libsql::params![
                entry.id.as_str(),
                entry.profile_id.as_str(),
                entry.mass,
                entry.unit.as_str(),
                text_or_null(entry.note.as_deref()),
                encode_tags(&entry.tags),
                entry.logged_at,
                entry.status.as_str(),
                entry.created_at,
                entry.updated_at,
                i64::from(entry.is_deleted)
            ],
        )
        .await?;
        Ok(())
    }

    async fn write_entry(conn: &Connection, entry: &MassEntry) -> Result<()> {
        conn.execute(
            "UPDATE mass_entries
             SET mass = ?, unit = ?, note = ?, tags = ?, logged_at = ?, status = ?,
                 updated_at = ?, is_deleted = ?
             WHERE id = ?",
            libsql::params![
                entry.mass,
                entry.unit.as_str(),
                text_or_null(entry.note.as_deref()),
                encode_tags(&entry.tags),
                entry.logged_at,
                entry.status.as_str(),
                entry.updated_at,
                i64::from(entry.is_deleted),
                entry.id.as_str()
            ],
        )
        .await?;
        Ok(())
    }

    async fn insert_mutation(conn: &Connection, mutation: &SyncMutation) -> Result<()> {
        conn.execute(
            &format!("INSERT INTO sync_queue ({MUTATION_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"),
            libsql::params![
                mutation.id.as_str(),
                mutation.entity_type.as_str(),
                mutation.entity_id.as_str(),
                mutation.operation.as_str(),
                serde_json::to_string(&mutation.payload)?,
                i64::from(mutation.attempts),
                text_or_null(mutation.last_error.as_deref()),
                mutation.created_at,
                mutation.updated_at
            ],
        )
        .await?;
        Ok(())
    }

    /// Write an entry change and its intent atomically.
    async fn write_entry_with_intent(
        conn: &Connection,
        entry: &MassEntry,
        is_new: bool,
        mutation: &SyncMutation,
    ) -> Result<()> {
        conn.execute("BEGIN IMMEDIATE", ()).await?;

        let result = async {
            if is_new {
                Self::insert_entry(conn, entry).await?;
            } else {
                Self::write_entry(conn, entry).await?;
            }
            Self::insert_mutation(conn, mutation).await
        }
        .await;

        finish_transaction(conn, result).await
    }

    async fn load_settings(conn: &Connection) -> Result<Option<AppSettings>> {
        let mut rows = conn
            .query(
                "SELECT auto_sync, reminders_enabled, reminder_hour, last_sync, reminder_handle,
                        created_at, updated_at
                 FROM app_settings WHERE id = ?",
                [APP_SETTINGS_ID],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_settings(&row)?)),
            None => Ok(None),
        }
    }

    async fn load_profile(conn: &Connection) -> Result<Option<UserProfile>> {
        let mut rows = conn
            .query(
                "SELECT id, full_name, email, bio, unit_preference, goal_mass, created_at, updated_at
                 FROM profiles WHERE id = ?",
                [LOCAL_PROFILE_ID],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_profile(&row)?)),
            None => Ok(None),
        }
    }
}

impl LocalStore for SqliteStore {
    async fn create_entry(&self, input: NewMassEntry) -> Result<MassEntry> {
        let now = now_millis();
        let entry = MassEntry::from_input(input, now)?;
        let mutation = SyncMutation::new(
            entry.id.clone(),
            MutationOperation::Create,
            entry.payload()?,
            now,
        );

        let db = self.db.lock().await;
        Self::write_entry_with_intent(db.connection(), &entry, true, &mutation).await?;
        tracing::debug!("Created entry {} with intent {}", entry.id, mutation.id);
        Ok(entry)
    }

    async fn get_entry(&self, id: &EntryId) -> Result<Option<MassEntry>> {
        let db = self.db.lock().await;
        Self::fetch_entry(db.connection(), id).await
    }

    async fn list_entries(&self, profile_id: Option<&str>, limit: usize) -> Result<Vec<MassEntry>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                &format!(
                    "SELECT {ENTRY_COLUMNS}
                     FROM mass_entries
                     WHERE is_deleted = 0 AND (?1 IS NULL OR profile_id = ?1)
                     ORDER BY logged_at DESC, created_at DESC, rowid DESC
                     LIMIT ?2"
                ),
                libsql::params![text_or_null(profile_id), limit_to_i64(limit)],
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_entry(&row)?);
        }
        Ok(entries)
    }

    async fn update_entry(&self, id: &EntryId, patch: EntryPatch) -> Result<MassEntry> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let mut entry = Self::fetch_entry(conn, id)
            .await?
            .filter(|entry| !entry.is_deleted)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let now = now_millis();
        entry.apply_patch(patch, now)?;
        let mutation = SyncMutation::new(
            entry.id.clone(),
            MutationOperation::Update,
            entry.payload()?,
            now,
        );

        Self::write_entry_with_intent(conn, &entry, false, &mutation).await?;
        Ok(entry)
    }

    async fn delete_entry(&self, id: &EntryId) -> Result<MassEntry> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let mut entry = Self::fetch_entry(conn, id)
            .await?
            .filter(|entry| !entry.is_deleted)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let now = now_millis();
        entry.is_deleted = true;
        entry.status = EntryStatus::Pending;
        entry.updated_at = now;
        let mutation =
            SyncMutation::new(entry.id.clone(), MutationOperation::Delete, delete_payload(id), now);

        Self::write_entry_with_intent(conn, &entry, false, &mutation).await?;
        Ok(entry)
    }

    async fn update_entry_status(&self, id: &EntryId, status: EntryStatus) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "UPDATE mass_entries SET status = ?, updated_at = ? WHERE id = ?",
                libsql::params![status.as_str(), now_millis(), id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn enqueue_mutation(
        &self,
        entity_id: &EntryId,
        operation: MutationOperation,
        payload: Value,
    ) -> Result<MutationId> {
        let mutation = SyncMutation::new(entity_id.clone(), operation, payload, now_millis());
        let db = self.db.lock().await;
        Self::insert_mutation(db.connection(), &mutation).await?;
        Ok(mutation.id)
    }

    async fn list_pending_mutations(&self, limit: usize) -> Result<Vec<SyncMutation>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                &format!(
                    "SELECT {MUTATION_COLUMNS}
                     FROM sync_queue
                     WHERE {KNOWN_OPERATIONS}
                     ORDER BY created_at ASC, rowid ASC
                     LIMIT ?"
                ),
                libsql::params![limit_to_i64(limit)],
            )
            .await?;

        let mut mutations = Vec::new();
        while let Some(row) = rows.next().await? {
            match Self::parse_mutation(&row) {
                Ok(mutation) => mutations.push(mutation),
                Err(error) => tracing::warn!("Skipping unreadable queued intent: {}", error),
            }
        }
        Ok(mutations)
    }

    async fn count_pending_mutations(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                &format!("SELECT COUNT(*) FROM sync_queue WHERE {KNOWN_OPERATIONS}"),
                (),
            )
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn delete_mutation(&self, id: &MutationId) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute("DELETE FROM sync_queue WHERE id = ?", [id.as_str()])
            .await?;
        Ok(())
    }

    async fn record_mutation_error(&self, id: &MutationId, message: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "UPDATE sync_queue
                 SET attempts = attempts + 1, last_error = ?, updated_at = ?
                 WHERE id = ?",
                libsql::params![message, now_millis(), id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn get_profile(&self) -> Result<Option<UserProfile>> {
        let db = self.db.lock().await;
        Self::load_profile(db.connection()).await
    }

    async fn save_profile(&self, input: ProfileInput) -> Result<UserProfile> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let now = now_millis();
        let profile = Self::load_profile(conn)
            .await?
            .unwrap_or_else(|| UserProfile::new(now))
            .merge(input, now)?;

        conn.execute(
            "INSERT INTO profiles
                (id, full_name, email, bio, unit_preference, goal_mass, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                full_name = excluded.full_name,
                email = excluded.email,
                bio = excluded.bio,
                unit_preference = excluded.unit_preference,
                goal_mass = excluded.goal_mass,
                updated_at = excluded.updated_at",
            libsql::params![
                profile.id.as_str(),
                text_or_null(profile.full_name.as_deref()),
                text_or_null(profile.email.as_deref()),
                text_or_null(profile.bio.as_deref()),
                profile.unit_preference.as_str(),
                profile.goal_mass.map_or(SqlValue::Null, SqlValue::Real),
                profile.created_at,
                profile.updated_at
            ],
        )
        .await?;

        Ok(profile)
    }

    async fn get_settings(&self) -> Result<AppSettings> {
        let db = self.db.lock().await;
        match Self::load_settings(db.connection()).await {
            Ok(settings) => Ok(settings.unwrap_or_default()),
            Err(error) => {
                tracing::warn!("Falling back to default settings: {}", error);
                Ok(AppSettings::default())
            }
        }
    }

    async fn save_settings(&self, patch: SettingsPatch) -> Result<AppSettings> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let now = now_millis();
        let existing = Self::load_settings(conn).await.unwrap_or_else(|error| {
            tracing::warn!("Replacing unreadable settings row: {}", error);
            None
        });
        let settings = existing
            .unwrap_or_else(|| AppSettings::new(now))
            .merge(patch, now)?;

        conn.execute(
            "INSERT INTO app_settings
                (id, auto_sync, reminders_enabled, reminder_hour, last_sync, reminder_handle,
                 created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                auto_sync = excluded.auto_sync,
                reminders_enabled = excluded.reminders_enabled,
                reminder_hour = excluded.reminder_hour,
                last_sync = excluded.last_sync,
                reminder_handle = excluded.reminder_handle,
                updated_at = excluded.updated_at",
            libsql::params![
                APP_SETTINGS_ID,
                i64::from(settings.auto_sync),
                i64::from(settings.reminders_enabled),
                i64::from(settings.reminder_hour),
                settings.last_sync.map_or(SqlValue::Null, SqlValue::Integer),
                text_or_null(settings.reminder_handle.as_deref()),
                settings.created_at,
                settings.updated_at
            ],
        )
        .await?;

        Ok(settings)
    }
}

/// Commit on success, roll back on failure.
async fn finish_transaction<T>(conn: &Connection, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            if let Err(e) = conn.execute("COMMIT", ()).await {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(e.into());
            }
            Ok(value)
        }
        Err(error) => {
            conn.execute("ROLLBACK", ()).await.ok();
            Err(error)
        }
    }
}

fn text_or_null(value: Option<&str>) -> SqlValue {
    value.map_or(SqlValue::Null, |text| SqlValue::Text(text.to_string()))
}

fn optional_text(row: &Row, index: i32) -> Result<Option<String>> {
    Ok(match row.get_value(index)? {
        SqlValue::Text(text) => Some(text),
        _ => None,
    })
}

#[allow(clippy::cast_precision_loss)]
fn real_value(row: &Row, index: i32) -> Result<Option<f64>> {
    Ok(match row.get_value(index)? {
        SqlValue::Real(value) => Some(value),
        SqlValue::Integer(value) => Some(value as f64),
        _ => None,
    })
}

fn integer_value(row: &Row, index: i32) -> Result<Option<i64>> {
    Ok(match row.get_value(index)? {
        SqlValue::Integer(value) => Some(value),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract::{file_store_tests, store_contract_tests, RawRecords};
    use tempfile::tempdir;

    store_contract_tests!(async { SqliteStore::open_in_memory().await.unwrap() });
    file_store_tests!(SqliteStore::open, "ballast.db");

    impl RawRecords for SqliteStore {
        async fn set_raw_reminder_hour(&self, hour: i64) {
            let db = self.db.lock().await;
            db.connection()
                .execute("UPDATE app_settings SET reminder_hour = ?", [hour])
                .await
                .unwrap();
        }

        async fn set_raw_entry_field(&self, id: &EntryId, field: &str, value: &str) {
            let db = self.db.lock().await;
            db.connection()
                .execute(
                    &format!("UPDATE mass_entries SET {field} = ? WHERE id = ?"),
                    [value, id.as_str()],
                )
                .await
                .unwrap();
        }

        async fn push_raw_mutation(&self, entity_id: &EntryId, operation: &str, attempts: i64) {
            let template = SyncMutation::new(
                entity_id.clone(),
                MutationOperation::Create,
                Value::Null,
                now_millis(),
            );
            let db = self.db.lock().await;
            db.connection()
                .execute(
                    &format!(
                        "INSERT INTO sync_queue ({MUTATION_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
                    ),
                    libsql::params![
                        template.id.as_str(),
                        template.entity_type.as_str(),
                        template.entity_id.as_str(),
                        operation,
                        "null",
                        attempts,
                        text_or_null(None),
                        template.created_at,
                        template.updated_at
                    ],
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_malformed_tags_column_reads_as_empty() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let entry = store
            .create_entry(NewMassEntry::new(70.0, MassUnit::Kg).with_tags(["a"]))
            .await
            .unwrap();

        {
            let db = store.db.lock().await;
            db.connection()
                .execute(
                    "UPDATE mass_entries SET tags = '{broken' WHERE id = ?",
                    [entry.id.as_str()],
                )
                .await
                .unwrap();
        }

        let stored = store.get_entry(&entry.id).await.unwrap().unwrap();
        assert!(stored.tags.is_empty());
        assert_eq!(stored.mass, 70.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unreadable_queue_row_does_not_block_the_queue() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let broken = store
            .enqueue_mutation(&EntryId::from("a"), MutationOperation::Create, Value::Null)
            .await
            .unwrap();
        let healthy = store
            .enqueue_mutation(&EntryId::from("b"), MutationOperation::Create, Value::Null)
            .await
            .unwrap();

        {
            let db = store.db.lock().await;
            db.connection()
                .execute(
                    "UPDATE sync_queue SET updated_at = 'soon' WHERE id = ?",
                    [broken.as_str()],
                )
                .await
                .unwrap();
        }

        let pending = store.list_pending_mutations(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, healthy);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_entries_and_queue_survive_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("ballast.db");

        let entry = {
            let store = SqliteStore::open(&path).await.unwrap();
            store
                .create_entry(NewMassEntry::new(81.3, MassUnit::Kg).with_note("gym"))
                .await
                .unwrap()
        };

        let reopened = SqliteStore::open(&path).await.unwrap();
        let stored = reopened.get_entry(&entry.id).await.unwrap().unwrap();
        assert_eq!(stored, entry);

        let pending = reopened.list_pending_mutations(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].entity_id, entry.id);
    }
}
