//! Schema migrations for the libSQL store

use crate::error::Result;
use libsql::Connection;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

// Entries, the queue and the two singleton tables
const V1: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS mass_entries (
        id TEXT PRIMARY KEY,
        profile_id TEXT NOT NULL,
        mass REAL NOT NULL,
        unit TEXT NOT NULL,
        note TEXT,
        tags TEXT NOT NULL DEFAULT '[]',
        logged_at INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_mass_entries_logged ON mass_entries(logged_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_mass_entries_profile ON mass_entries(profile_id)",
    "CREATE TABLE IF NOT EXISTS sync_queue (
        id TEXT PRIMARY KEY,
        entity_type TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        operation TEXT NOT NULL,
        payload TEXT NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_sync_queue_created ON sync_queue(created_at ASC)",
    "CREATE TABLE IF NOT EXISTS profiles (
        id TEXT PRIMARY KEY,
        full_name TEXT,
        email TEXT,
        bio TEXT,
        unit_preference TEXT NOT NULL DEFAULT 'kg',
        goal_mass REAL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS app_settings (
        id TEXT PRIMARY KEY,
        auto_sync INTEGER NOT NULL DEFAULT 1,
        reminders_enabled INTEGER NOT NULL DEFAULT 0,
        reminder_hour INTEGER NOT NULL DEFAULT 20,
        last_sync INTEGER,
        reminder_handle TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
];

// Soft deletes and per-entity queue lookups
const V2: &[&str] = &[
    "ALTER TABLE mass_entries ADD COLUMN is_deleted INTEGER NOT NULL DEFAULT 0",
    "CREATE INDEX IF NOT EXISTS idx_mass_entries_deleted ON mass_entries(is_deleted)",
    "CREATE INDEX IF NOT EXISTS idx_sync_queue_entity ON sync_queue(entity_id)",
];

/// Schema steps in order; step `i` brings the schema to version `i + 1`.
const STEPS: &[&[&str]] = &[V1, V2];

/// Bring the schema up to [`CURRENT_VERSION`], one transaction per step.
pub async fn run(conn: &Connection) -> Result<()> {
    let current = get_version(conn).await?;

    for (version, statements) in (1..).zip(STEPS) {
        if version <= current {
            continue;
        }
        apply(conn, version, statements).await?;
        tracing::info!("Migrated local store schema to version {}", version);
    }

    Ok(())
}

/// Installed schema version, 0 for a fresh file.
pub async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            (),
        )
        .await?;
    let has_table = match rows.next().await? {
        Some(row) => row.get::<i64>(0)? > 0,
        None => false,
    };
    if !has_table {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get::<i32>(0)?),
        None => Ok(0),
    }
}

async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN IMMEDIATE", ()).await?;

    let outcome = async {
        for statement in statements {
            conn.execute(statement, ()).await?;
        }
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            libsql::params![version],
        )
        .await?;
        conn.execute("COMMIT", ()).await?;
        Ok::<_, libsql::Error>(())
    }
    .await;

    if let Err(error) = outcome {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(error.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    async fn table_exists(conn: &Connection, name: &str) -> bool {
        let mut rows = conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
                [name],
            )
            .await
            .unwrap();
        rows.next()
            .await
            .unwrap()
            .is_some_and(|row| row.get::<i32>(0).unwrap() != 0)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_steps_match_current_version() {
        assert_eq!(i32::try_from(STEPS.len()).unwrap(), CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_create_four_logical_tables() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        for table in ["mass_entries", "sync_queue", "profiles", "app_settings"] {
            assert!(table_exists(&conn, table).await, "missing table {table}");
        }
    }
}
