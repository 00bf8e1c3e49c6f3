//! What the scheduler drives

use std::future::Future;
use std::sync::Arc;

use crate::store::LocalStore;
use crate::sync::{SyncEngine, SyncReport, SyncResult};

/// One sync run, triggered by the scheduler.
pub trait SyncRunner: Send + Sync {
    fn run_sync(&self) -> impl Future<Output = SyncResult<SyncReport>> + Send;
}

/// Runs a [`SyncEngine`] with a fixed bearer token.
pub struct EngineRunner<S> {
    engine: Arc<SyncEngine<S>>,
    token: Option<String>,
}

impl<S: LocalStore> EngineRunner<S> {
    pub const fn new(engine: Arc<SyncEngine<S>>, token: Option<String>) -> Self {
        Self { engine, token }
    }

    pub const fn engine(&self) -> &Arc<SyncEngine<S>> {
        &self.engine
    }
}

impl<S: LocalStore> SyncRunner for EngineRunner<S> {
    async fn run_sync(&self) -> SyncResult<SyncReport> {
        self.engine
            .sync_pending_entries(self.token.as_deref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::models::{EntryStatus, MassUnit, NewMassEntry};
    use crate::store::SqliteStore;
    use crate::sync::test_support::MockRemote;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_engine_runner_passes_token() {
        let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
        let entry = store
            .create_entry(NewMassEntry::new(70.0, MassUnit::Kg))
            .await
            .unwrap();

        let remote = MockRemote::accepting().await;
        let config = SyncConfig::new().with_api_base_url(remote.base_url.clone());
        let engine = Arc::new(SyncEngine::new(Arc::clone(&store), &config).unwrap());
        let runner = EngineRunner::new(engine, Some("abc".to_string()));

        let report = runner.run_sync().await.unwrap();
        assert_eq!(report.synced, 1);
        assert_eq!(
            remote.requests().await[0].authorization.as_deref(),
            Some("Bearer abc")
        );
        assert_eq!(
            store.get_entry(&entry.id).await.unwrap().unwrap().status,
            EntryStatus::Synced
        );
    }
}
