use std::sync::Arc;
use std::time::Duration;

use ballast_core::scheduler::{EngineRunner, ReachabilityMonitor};
use ballast_core::{
    ConnectivityScheduler, LocalStore, NetworkStatus, SchedulerConfig, SchedulerState, SyncEngine,
};
use tokio::sync::watch;

use crate::commands::common::{resolve_token, CliContext};
use crate::error::CliError;

pub async fn run_watch(
    token: Option<String>,
    interval_secs: Option<u64>,
    ctx: &CliContext,
) -> Result<(), CliError> {
    let mut sync_config = ctx.sync_config()?;
    if let Some(secs) = interval_secs {
        sync_config = sync_config.with_poll_interval(Duration::from_secs(secs.max(1)));
    }

    let store = Arc::new(ctx.open_store().await?);
    let settings = store.get_settings().await?;
    let engine = Arc::new(SyncEngine::new(Arc::clone(&store), &sync_config)?);
    let runner = Arc::new(EngineRunner::new(engine, resolve_token(token)));

    // Without an endpoint to probe the status stays Unknown and only the
    // timer fires.
    let (_status_tx, status_rx) = watch::channel(NetworkStatus::Unknown);
    let (reachability, probe_task) = match sync_config
        .api_base_url
        .as_deref()
        .and_then(ReachabilityMonitor::for_endpoint)
    {
        Some(monitor) => {
            tracing::debug!("Probing {} for reachability", monitor.target());
            let (rx, task) = monitor.spawn();
            (rx, Some(task))
        }
        None => (status_rx, None),
    };

    let mut scheduler = ConnectivityScheduler::start(
        runner,
        SchedulerConfig::from_settings(&settings, &sync_config),
        reachability,
    );
    if scheduler.state() == SchedulerState::Disabled {
        println!("Auto sync is disabled. Enable it with `ballast settings set --auto-sync true`.");
        return Ok(());
    }

    println!(
        "Watching for changes every {}s. Press Ctrl-C to stop.",
        sync_config.poll_interval.as_secs()
    );
    tokio::signal::ctrl_c().await?;

    scheduler.shutdown().await;
    if let Some(task) = probe_task {
        task.abort();
    }
    println!("Stopped.");
    Ok(())
}
