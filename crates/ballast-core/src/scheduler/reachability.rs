//! Network reachability probe

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(15);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
    Unknown,
}

/// Periodically opens a TCP connection to the remote endpoint and publishes
/// whether it succeeded.
#[derive(Debug, Clone)]
pub struct ReachabilityMonitor {
    target: String,
    interval: Duration,
    timeout: Duration,
}

impl ReachabilityMonitor {
    /// Probe the host and port of `base_url`. `None` for unparseable URLs.
    pub fn for_endpoint(base_url: &str) -> Option<Self> {
        let url = reqwest::Url::parse(base_url).ok()?;
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;
        Some(Self {
            target: format!("{host}:{port}"),
            interval: DEFAULT_PROBE_INTERVAL,
            timeout: DEFAULT_PROBE_TIMEOUT,
        })
    }

    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub async fn probe(&self) -> NetworkStatus {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.target)).await {
            Ok(Ok(_)) => NetworkStatus::Online,
            Ok(Err(error)) => {
                tracing::debug!("Reachability probe to {} failed: {}", self.target, error);
                NetworkStatus::Offline
            }
            Err(_) => {
                tracing::debug!("Reachability probe to {} timed out", self.target);
                NetworkStatus::Offline
            }
        }
    }

    /// Probe until every receiver is dropped. Starts as `Unknown`.
    pub fn spawn(self) -> (watch::Receiver<NetworkStatus>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(NetworkStatus::Unknown);
        let handle = tokio::spawn(async move {
            loop {
                let status = self.probe().await;
                let changed = tx.send_if_modified(|current| {
                    if *current == status {
                        false
                    } else {
                        *current = status;
                        true
                    }
                });
                if changed {
                    tracing::info!("Network status for {}: {:?}", self.target, status);
                }

                tokio::select! {
                    () = tx.closed() => break,
                    () = tokio::time::sleep(self.interval) => {}
                }
            }
        });
        (rx, handle)
    }
}
