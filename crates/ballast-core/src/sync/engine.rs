//! Queue drain and bulk seeding.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::SyncConfig;
use crate::models::{EntryStatus, MassEntry, SettingsPatch, SyncMutation};
use crate::store::LocalStore;
use crate::util::{normalize_text_option, now_millis};

use super::client::compact_text;
use super::{MassApiClient, SingleFlight, SyncError, SyncResult};

/// Why a run did not touch the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotConfigured,
    AuthRequired,
    AlreadyRunning,
}

impl SkipReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::AuthRequired => "auth_required",
            Self::AlreadyRunning => "already_running",
        }
    }

    /// Text suitable for "sync skipped: ..." messages.
    pub const fn describe(self) -> &'static str {
        match self {
            Self::NotConfigured => "no remote endpoint configured",
            Self::AuthRequired => "please sign in to sync",
            Self::AlreadyRunning => "a sync run is already in progress",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Aggregate outcome of one run.
///
/// For a run that was not skipped, `synced + errors.len() == attempted`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub attempted: usize,
    pub synced: usize,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
    pub errors: Vec<String>,
}

impl SyncReport {
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: true,
            reason: Some(reason),
            ..Self::default()
        }
    }

    /// Ran and every attempted intent was acknowledged.
    pub fn is_clean(&self) -> bool {
        !self.skipped && self.errors.is_empty()
    }

    pub fn summary(&self) -> String {
        match self.reason {
            Some(reason) if self.skipped => format!("sync skipped: {reason}"),
            _ if self.attempted == 0 => "nothing to sync".to_string(),
            _ => format!("synced {}/{}", self.synced, self.attempted),
        }
    }
}

/// Outcome of a bulk seed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub created: usize,
    /// Rejected with 409: the remote already holds the entry
    pub already_present: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Drains the mutation queue of a [`LocalStore`] against the remote service.
pub struct SyncEngine<S> {
    store: Arc<S>,
    client: Option<MassApiClient>,
    page_size: usize,
    require_auth: bool,
    flight: SingleFlight,
}

impl<S: LocalStore> SyncEngine<S> {
    /// Build an engine; an unset base URL yields an offline engine.
    pub fn new(store: Arc<S>, config: &SyncConfig) -> SyncResult<Self> {
        let client = config
            .api_base_url
            .as_deref()
            .map(MassApiClient::new)
            .transpose()?;

        Ok(Self {
            store,
            client,
            page_size: config.page_size.max(1),
            require_auth: config.require_auth,
            flight: SingleFlight::new(),
        })
    }

    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub const fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.flight.is_running()
    }

    /// Replay one page of pending intents in queue order.
    ///
    /// Per-intent failures are recorded on the intent and reported in
    /// `errors`; only failing to read the queue returns `Err`. A call made
    /// while another run is in flight returns a skipped report at once.
    pub async fn sync_pending_entries(&self, token: Option<&str>) -> SyncResult<SyncReport> {
        let Some(client) = &self.client else {
            tracing::debug!("Sync skipped: no remote endpoint configured");
            return Ok(SyncReport::skipped(SkipReason::NotConfigured));
        };

        let token = normalize_text_option(token.map(str::to_string));
        if self.require_auth && token.is_none() {
            tracing::info!("Sync skipped: sign-in required");
            return Ok(SyncReport::skipped(SkipReason::AuthRequired));
        }

        let Some(_flight) = self.flight.try_acquire() else {
            tracing::debug!("Sync skipped: another run is in flight");
            return Ok(SyncReport::skipped(SkipReason::AlreadyRunning));
        };

        let pending = self.store.list_pending_mutations(self.page_size).await?;
        let mut report = SyncReport::default();

        for mutation in &pending {
            report.attempted += 1;
            match client.send(mutation, token.as_deref()).await {
                Ok(()) => match self.acknowledge(mutation).await {
                    Ok(()) => report.synced += 1,
                    Err(error) => {
                        let message = format!(
                            "{} {}: accepted remotely but not acknowledged locally: {error}",
                            mutation.operation, mutation.entity_id
                        );
                        tracing::warn!("{}", message);
                        report.errors.push(message);
                    }
                },
                Err(error) => {
                    report.errors.push(self.record_failure(mutation, &error).await);
                }
            }
        }

        if report.errors.is_empty() {
            if let Err(error) = self
                .store
                .save_settings(SettingsPatch::last_sync(now_millis()))
                .await
            {
                tracing::warn!("Failed to record last sync time: {}", error);
            }
        }

        if report.attempted > 0 {
            tracing::info!(
                "Sync run finished: {}/{} synced, {} failed",
                report.synced,
                report.attempted,
                report.errors.len()
            );
        }
        Ok(report)
    }

    async fn acknowledge(&self, mutation: &SyncMutation) -> crate::Result<()> {
        self.store.delete_mutation(&mutation.id).await?;
        self.store
            .update_entry_status(&mutation.entity_id, EntryStatus::Synced)
            .await
    }

    /// Keep the intent queued with its error and return the report line.
    async fn record_failure(&self, mutation: &SyncMutation, error: &SyncError) -> String {
        let detail = compact_text(&error.to_string());
        let message = format!("{} {}: {detail}", mutation.operation, mutation.entity_id);
        tracing::warn!("Sync failed for {}", message);

        if let Err(store_error) = self
            .store
            .record_mutation_error(&mutation.id, &detail)
            .await
        {
            tracing::warn!(
                "Failed to record error on intent {}: {}",
                mutation.id,
                store_error
            );
        }
        if let Err(store_error) = self
            .store
            .update_entry_status(&mutation.entity_id, EntryStatus::Failed)
            .await
        {
            tracing::warn!(
                "Failed to mark entry {} as failed: {}",
                mutation.entity_id,
                store_error
            );
        }

        message
    }

    /// Upload a full snapshot straight to the remote collection.
    ///
    /// Requires a token. A 409 counts as already present; any other failure
    /// is logged and the next entry is tried. Local state is not touched.
    pub async fn seed_entries(&self, token: &str, entries: &[MassEntry]) -> SyncResult<SeedReport> {
        let client = self.client.as_ref().ok_or(SyncError::NotConfigured)?;
        let token = normalize_text_option(Some(token.to_string())).ok_or(SyncError::AuthRequired)?;

        let mut report = SeedReport::default();
        for entry in entries.iter().filter(|entry| !entry.is_deleted) {
            let payload = entry.payload()?;
            match client.create(&payload, Some(&token)).await {
                Ok(()) => report.created += 1,
                Err(SyncError::Api { status: 409, .. }) => {
                    tracing::debug!("Seed: entry {} already present", entry.id);
                    report.already_present += 1;
                }
                Err(error) => {
                    let message = format!("{}: {}", entry.id, compact_text(&error.to_string()));
                    tracing::warn!("Seed failed for {}", message);
                    report.failed += 1;
                    report.errors.push(message);
                }
            }
        }

        tracing::info!(
            "Seed finished: {} created, {} already present, {} failed",
            report.created,
            report.already_present,
            report.failed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryPatch, MassUnit, MutationOperation, NewMassEntry};
    use crate::store::{BlobStore, SqliteStore};
    use crate::sync::test_support::MockRemote;
    use axum::http::StatusCode;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    async fn sqlite_store() -> Arc<SqliteStore> {
        Arc::new(SqliteStore::open_in_memory().await.unwrap())
    }

    fn engine<S: LocalStore>(store: &Arc<S>, base_url: Option<&str>) -> SyncEngine<S> {
        let mut config = SyncConfig::new();
        if let Some(url) = base_url {
            config = config.with_api_base_url(url);
        }
        SyncEngine::new(Arc::clone(store), &config).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unconfigured_run_is_skipped() {
        let store = sqlite_store().await;
        store
            .create_entry(NewMassEntry::new(70.4, MassUnit::Kg))
            .await
            .unwrap();

        let report = engine(&store, None).sync_pending_entries(None).await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                attempted: 0,
                synced: 0,
                skipped: true,
                reason: Some(SkipReason::NotConfigured),
                errors: vec![],
            }
        );
        assert_eq!(store.count_pending_mutations().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_offline_entry_syncs_once_configured() {
        let store = sqlite_store().await;
        let entry = store
            .create_entry(NewMassEntry::new(70.4, MassUnit::Kg))
            .await
            .unwrap();

        let remote = MockRemote::accepting().await;
        let report = engine(&store, Some(&remote.base_url))
            .sync_pending_entries(Some("token-123"))
            .await
            .unwrap();

        assert_eq!(report.attempted, 1);
        assert_eq!(report.synced, 1);
        assert!(!report.skipped);
        assert!(report.errors.is_empty());

        let stored = store.get_entry(&entry.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EntryStatus::Synced);
        assert!(store.list_pending_mutations(10).await.unwrap().is_empty());
        assert!(store.get_settings().await.unwrap().last_sync.is_some());

        let requests = remote.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path, "/v1/mass");
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer token-123"));
        let body = requests[0].body.as_ref().unwrap();
        assert_eq!(body["id"], entry.id.as_str());
        assert_eq!(body["mass"], 70.4);
        assert_eq!(body["unit"], "kg");
        assert_eq!(body["profileId"], entry.profile_id.as_str());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_partial_failure_keeps_failed_intent_queued() {
        let store = sqlite_store().await;
        let first = store
            .create_entry(NewMassEntry::new(80.0, MassUnit::Kg))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(3)).await;
        let second = store
            .create_entry(NewMassEntry::new(79.5, MassUnit::Kg))
            .await
            .unwrap();

        let remote = MockRemote::start(|_, index| {
            if index == 0 {
                (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable".to_string())
            } else {
                (StatusCode::CREATED, String::new())
            }
        })
        .await;

        let report = engine(&store, Some(&remote.base_url))
            .sync_pending_entries(Some("token"))
            .await
            .unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.synced, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("database unavailable (500)"));

        let pending = store.list_pending_mutations(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].entity_id, first.id);
        assert_eq!(pending[0].operation, MutationOperation::Create);
        assert_eq!(pending[0].attempts, 1);
        assert!(pending[0].last_error.is_some());

        let first = store.get_entry(&first.id).await.unwrap().unwrap();
        let second = store.get_entry(&second.id).await.unwrap().unwrap();
        assert_eq!(first.status, EntryStatus::Failed);
        assert_eq!(second.status, EntryStatus::Synced);

        // A run with errors leaves last_sync unset
        assert_eq!(store.get_settings().await.unwrap().last_sync, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unreachable_remote_is_recorded_per_intent() {
        let store = sqlite_store().await;
        store
            .create_entry(NewMassEntry::new(80.0, MassUnit::Kg))
            .await
            .unwrap();

        // Bind then drop a listener so the port refuses connections
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let engine = engine(&store, Some(&format!("http://{addr}")));
        for attempt in 1..=2 {
            let report = engine.sync_pending_entries(None).await.unwrap();
            assert_eq!(report.attempted, 1);
            assert_eq!(report.synced, 0);
            assert_eq!(report.errors.len(), 1);

            let pending = store.list_pending_mutations(10).await.unwrap();
            assert_eq!(pending[0].attempts, attempt);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_and_delete_use_entry_routes() {
        let store = Arc::new(BlobStore::in_memory());
        let entry = store
            .create_entry(NewMassEntry::new(90.0, MassUnit::Lb))
            .await
            .unwrap();
        store
            .update_entry(
                &entry.id,
                EntryPatch {
                    note: Some(Some("after run".to_string())),
                    ..EntryPatch::default()
                },
            )
            .await
            .unwrap();
        store.delete_entry(&entry.id).await.unwrap();

        let remote = MockRemote::accepting().await;
        let report = engine(&store, Some(&remote.base_url))
            .sync_pending_entries(None)
            .await
            .unwrap();
        assert_eq!(report.synced, 3);

        let requests = remote.requests().await;
        let routes = requests
            .iter()
            .map(|r| (r.method.as_str(), r.path.clone()))
            .collect::<Vec<_>>();
        let entry_path = format!("/v1/mass/{}", entry.id);
        assert_eq!(
            routes,
            vec![
                ("POST", "/v1/mass".to_string()),
                ("PATCH", entry_path.clone()),
                ("DELETE", entry_path),
            ]
        );
        assert_eq!(requests[1].body.as_ref().unwrap()["note"], "after run");
        assert!(requests[2].body.is_none());
        assert!(requests[0].authorization.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_page_size_bounds_one_run() {
        let store = sqlite_store().await;
        for mass in [70.0, 71.0, 72.0] {
            store
                .create_entry(NewMassEntry::new(mass, MassUnit::Kg))
                .await
                .unwrap();
        }

        let remote = MockRemote::accepting().await;
        let config = SyncConfig::new()
            .with_api_base_url(remote.base_url.clone())
            .with_page_size(2);
        let engine = SyncEngine::new(Arc::clone(&store), &config).unwrap();

        let report = engine.sync_pending_entries(None).await.unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(store.count_pending_mutations().await.unwrap(), 1);

        let report = engine.sync_pending_entries(None).await.unwrap();
        assert_eq!(report.attempted, 1);
        assert_eq!(store.count_pending_mutations().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_require_auth_skips_without_token() {
        let store = sqlite_store().await;
        store
            .create_entry(NewMassEntry::new(70.0, MassUnit::Kg))
            .await
            .unwrap();

        let remote = MockRemote::accepting().await;
        let config = SyncConfig::new()
            .with_api_base_url(remote.base_url.clone())
            .with_require_auth(true);
        let engine = SyncEngine::new(Arc::clone(&store), &config).unwrap();

        let report = engine.sync_pending_entries(Some("  ")).await.unwrap();
        assert!(report.skipped);
        assert_eq!(report.reason, Some(SkipReason::AuthRequired));
        assert!(remote.requests().await.is_empty());
        assert_eq!(store.count_pending_mutations().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_overlapping_triggers_run_the_queue_once() {
        let store = sqlite_store().await;
        let entry = store
            .create_entry(NewMassEntry::new(70.0, MassUnit::Kg))
            .await
            .unwrap();

        let remote = MockRemote::start_with_delay(Duration::from_millis(150), |_, _| {
            (StatusCode::CREATED, String::new())
        })
        .await;
        let engine = engine(&store, Some(&remote.base_url));

        let (reachability_run, timer_run) = tokio::join!(
            engine.sync_pending_entries(None),
            engine.sync_pending_entries(None)
        );
        let mut reports = vec![reachability_run.unwrap(), timer_run.unwrap()];
        reports.sort_by_key(|report| report.skipped);

        assert_eq!(reports[0].synced, 1);
        assert!(reports[1].skipped);
        assert_eq!(reports[1].reason, Some(SkipReason::AlreadyRunning));

        assert_eq!(remote.requests().await.len(), 1);
        assert_eq!(store.list_entries(None, 10).await.unwrap().len(), 1);
        assert_eq!(
            store.get_entry(&entry.id).await.unwrap().unwrap().status,
            EntryStatus::Synced
        );
        assert!(!engine.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_seed_counts_conflicts_as_present() {
        let store = sqlite_store().await;
        let remote = MockRemote::start(|_, index| match index {
            0 => (StatusCode::CREATED, String::new()),
            1 => (StatusCode::CONFLICT, r#"{"error":"exists"}"#.to_string()),
            _ => (StatusCode::BAD_GATEWAY, String::new()),
        })
        .await;
        let engine = engine(&store, Some(&remote.base_url));

        let now = now_millis();
        let entries = [70.0, 71.0, 72.0]
            .into_iter()
            .map(|mass| MassEntry::from_input(NewMassEntry::new(mass, MassUnit::Kg), now).unwrap())
            .collect::<Vec<_>>();

        let report = engine.seed_entries("seed-token", &entries).await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.already_present, 1);
        assert_eq!(report.failed, 1);
        assert!(report.errors[0].contains("HTTP 502"));

        let requests = remote.requests().await;
        assert_eq!(requests.len(), 3);
        assert!(requests
            .iter()
            .all(|r| r.authorization.as_deref() == Some("Bearer seed-token")));

        // Seeding is not queue replay
        assert_eq!(store.count_pending_mutations().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_seed_requires_token_and_endpoint() {
        let store = sqlite_store().await;
        let offline = engine(&store, None);
        assert!(matches!(
            offline.seed_entries("token", &[]).await,
            Err(SyncError::NotConfigured)
        ));

        let online = engine(&store, Some("http://127.0.0.1:9"));
        assert!(matches!(
            online.seed_entries(" ", &[]).await,
            Err(SyncError::AuthRequired)
        ));
    }

    #[test]
    fn report_summary_reads_naturally() {
        assert_eq!(
            SyncReport::skipped(SkipReason::NotConfigured).summary(),
            "sync skipped: no remote endpoint configured"
        );
        let report = SyncReport {
            attempted: 3,
            synced: 2,
            errors: vec!["x".to_string()],
            ..SyncReport::default()
        };
        assert_eq!(report.summary(), "synced 2/3");
        assert!(!report.is_clean());
    }
}
