//! Connectivity-triggered sync scheduling.
//!
//! [`ConnectivityScheduler`] starts `Idle`, runs one sync at once, then stays
//! `Armed` with two triggers: a reachability listener (fires on a transition
//! to online) and a fixed-interval timer. Shutdown cancels both; runs that
//! are already in flight finish on their own. Triggered runs are not
//! serialized here; the engine's single-flight guard coalesces overlaps.

mod reachability;
mod runner;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::SyncConfig;
use crate::models::AppSettings;

pub use reachability::{NetworkStatus, ReachabilityMonitor};
pub use runner::{EngineRunner, SyncRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Armed,
    /// Auto sync is off; nothing was attached
    Disabled,
    TornDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub poll_interval: Duration,
}

impl SchedulerConfig {
    /// Enabled by the `auto_sync` setting, timed by the sync config.
    pub const fn from_settings(settings: &AppSettings, sync: &SyncConfig) -> Self {
        Self {
            enabled: settings.auto_sync,
            poll_interval: sync.poll_interval,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: crate::config::DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Mount,
    Timer,
    Reachability,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mount => "startup",
            Self::Timer => "timer",
            Self::Reachability => "reachability",
        })
    }
}

/// Handle to a running scheduler. Dropping it tears the scheduler down.
pub struct ConnectivityScheduler {
    state: watch::Receiver<SchedulerState>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl ConnectivityScheduler {
    /// Start scheduling runs of `runner`. Must be called inside a tokio runtime.
    pub fn start<R>(
        runner: Arc<R>,
        config: SchedulerConfig,
        reachability: watch::Receiver<NetworkStatus>,
    ) -> Self
    where
        R: SyncRunner + 'static,
    {
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);

        if !config.enabled || config.poll_interval.is_zero() {
            tracing::info!("Auto sync disabled; scheduler not armed");
            state_tx.send_replace(SchedulerState::Disabled);
            return Self {
                state: state_rx,
                shutdown: None,
                task: None,
            };
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(
            runner,
            config.poll_interval,
            reachability,
            shutdown_rx,
            state_tx,
        ));

        Self {
            state: state_rx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// Stop both triggers. In-flight runs are left to complete.
    pub async fn shutdown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.send_replace(true);
        }
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!("Scheduler task ended abnormally: {}", error);
            }
        }
    }
}

async fn run_loop<R>(
    runner: Arc<R>,
    period: Duration,
    mut reachability: watch::Receiver<NetworkStatus>,
    mut shutdown: watch::Receiver<bool>,
    state: watch::Sender<SchedulerState>,
) where
    R: SyncRunner + 'static,
{
    spawn_run(&runner, Trigger::Mount);
    state.send_replace(SchedulerState::Armed);
    tracing::info!("Sync scheduler armed (every {}s)", period.as_secs());

    let mut timer = tokio::time::interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_status = *reachability.borrow_and_update();
    let mut listening = true;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = timer.tick() => spawn_run(&runner, Trigger::Timer),
            changed = reachability.changed(), if listening => {
                if changed.is_err() {
                    tracing::debug!("Reachability source closed; timer only");
                    listening = false;
                    continue;
                }
                let status = *reachability.borrow_and_update();
                if status == NetworkStatus::Online && last_status != NetworkStatus::Online {
                    spawn_run(&runner, Trigger::Reachability);
                }
                last_status = status;
            }
        }
    }

    state.send_replace(SchedulerState::TornDown);
    tracing::info!("Sync scheduler torn down");
}

fn spawn_run<R>(runner: &Arc<R>, trigger: Trigger)
where
    R: SyncRunner + 'static,
{
    let runner = Arc::clone(runner);
    tokio::spawn(async move {
        match runner.run_sync().await {
            Ok(report) if report.skipped => {
                tracing::debug!("{} sync: {}", trigger, report.summary());
            }
            Ok(report) => tracing::info!("{} sync: {}", trigger, report.summary()),
            Err(error) => tracing::warn!("{} sync failed: {}", trigger, error),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{SyncReport, SyncResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PERIOD: Duration = Duration::from_secs(120);

    #[derive(Default)]
    struct CountingRunner {
        started: AtomicUsize,
        finished: AtomicUsize,
        work: Duration,
    }

    impl CountingRunner {
        fn started(&self) -> usize {
            self.started.load(Ordering::SeqCst)
        }
    }

    impl SyncRunner for CountingRunner {
        async fn run_sync(&self) -> SyncResult<SyncReport> {
            self.started.fetch_add(1, Ordering::SeqCst);
            if !self.work.is_zero() {
                tokio::time::sleep(self.work).await;
            }
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(SyncReport::default())
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn start(
        runner: &Arc<CountingRunner>,
        enabled: bool,
        status: NetworkStatus,
    ) -> (ConnectivityScheduler, watch::Sender<NetworkStatus>) {
        let (tx, rx) = watch::channel(status);
        let config = SchedulerConfig {
            enabled,
            poll_interval: PERIOD,
        };
        (ConnectivityScheduler::start(Arc::clone(runner), config, rx), tx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_scheduler_never_runs() {
        let runner = Arc::new(CountingRunner::default());
        let (scheduler, tx) = start(&runner, false, NetworkStatus::Offline);

        assert_eq!(scheduler.state(), SchedulerState::Disabled);
        tx.send_replace(NetworkStatus::Online);
        tokio::time::sleep(PERIOD * 5).await;
        assert_eq!(runner.started(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_once_on_start_then_arms() {
        let runner = Arc::new(CountingRunner::default());
        let (scheduler, _tx) = start(&runner, true, NetworkStatus::Online);

        settle().await;
        assert_eq!(runner.started(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Armed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_every_period() {
        let runner = Arc::new(CountingRunner::default());
        let (_scheduler, _tx) = start(&runner, true, NetworkStatus::Online);

        settle().await;
        tokio::time::sleep(PERIOD * 3).await;
        settle().await;
        assert_eq!(runner.started(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_transitions_to_online_trigger() {
        let runner = Arc::new(CountingRunner::default());
        let (_scheduler, tx) = start(&runner, true, NetworkStatus::Offline);
        settle().await;
        assert_eq!(runner.started(), 1);

        tx.send_replace(NetworkStatus::Online);
        settle().await;
        assert_eq!(runner.started(), 2);

        // Still online: no new trigger
        tx.send_replace(NetworkStatus::Online);
        settle().await;
        assert_eq!(runner.started(), 2);

        tx.send_replace(NetworkStatus::Offline);
        settle().await;
        assert_eq!(runner.started(), 2);

        tx.send_replace(NetworkStatus::Online);
        settle().await;
        assert_eq!(runner.started(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_reachability_source_keeps_timer() {
        let runner = Arc::new(CountingRunner::default());
        let (_scheduler, tx) = start(&runner, true, NetworkStatus::Unknown);
        settle().await;
        drop(tx);

        tokio::time::sleep(PERIOD).await;
        settle().await;
        assert_eq!(runner.started(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_triggers_but_lets_run_finish() {
        let runner = Arc::new(CountingRunner {
            work: Duration::from_secs(5),
            ..CountingRunner::default()
        });
        let (mut scheduler, tx) = start(&runner, true, NetworkStatus::Online);
        settle().await;
        assert_eq!(runner.started(), 1);

        scheduler.shutdown().await;
        assert_eq!(scheduler.state(), SchedulerState::TornDown);

        tx.send_replace(NetworkStatus::Offline);
        tx.send_replace(NetworkStatus::Online);
        tokio::time::sleep(PERIOD * 3).await;

        assert_eq!(runner.started(), 1);
        assert_eq!(runner.finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn config_follows_auto_sync_setting() {
        let settings = AppSettings {
            auto_sync: false,
            ..AppSettings::default()
        };
        let sync = SyncConfig::new().with_poll_interval(Duration::from_secs(30));
        let config = SchedulerConfig::from_settings(&settings, &sync);
        assert!(!config.enabled);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
    }
}
