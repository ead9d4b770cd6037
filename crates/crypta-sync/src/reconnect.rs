//! Periodic re-connection to trusted peers.

use std::sync::Arc;
use std::time::Duration;

use crypta_store::PeerDirectory;
use crypta_types::{PeerAddress, PeerRecord};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::transport::Transport;

pub const MIN_RECONNECT_INTERVAL: Duration = Duration::from_secs(15);
pub const MAX_RECONNECT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(30);

/// Where the loop finds the peers it should stay connected to.
pub trait PeerSource: Send + Sync {
    fn peer_ids(&self) -> SyncResult<Vec<String>>;
    fn load_peer(&self, identification: &str) -> SyncResult<PeerRecord>;
}

impl PeerSource for PeerDirectory {
    fn peer_ids(&self) -> SyncResult<Vec<String>> {
        Ok(self.ids()?)
    }

    fn load_peer(&self, identification: &str) -> SyncResult<PeerRecord> {
        Ok(self.load(identification)?)
    }
}

/// Outcome of one pass over the peer list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub attempted: usize,
    pub connected: usize,
    pub failed: usize,
    /// Untrusted peers and this node itself.
    pub skipped: usize,
}

pub struct ReconnectLoop {
    peers: Arc<dyn PeerSource>,
    transport: Arc<dyn Transport>,
    interval: Duration,
}

impl ReconnectLoop {
    /// `interval` is clamped to `[MIN_RECONNECT_INTERVAL, MAX_RECONNECT_INTERVAL]`.
    pub fn new(
        peers: Arc<dyn PeerSource>,
        transport: Arc<dyn Transport>,
        interval: Duration,
    ) -> Self {
        Self {
            peers,
            transport,
            interval: interval.clamp(MIN_RECONNECT_INTERVAL, MAX_RECONNECT_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Try to connect to every trusted peer once.
    ///
    /// A failing peer never stops the pass. Only a failure to list peers is
    /// returned as an error.
    pub async fn tick(&self) -> SyncResult<TickReport> {
        let own = match self.transport.address() {
            Ok(a) => Some(a),
            Err(e) => {
                debug!(error = %e, "own address unavailable; not filtering self");
                None
            }
        };
        let mut report = TickReport::default();
        for id in self.peers.peer_ids()? {
            let record = match self.peers.load_peer(&id) {
                Ok(r) => r,
                Err(e) => {
                    warn!(peer_id = %id, error = %e, "skipping unreadable peer file");
                    report.failed += 1;
                    continue;
                }
            };
            if !record.trusted || own.as_ref() == Some(&record.address) {
                report.skipped += 1;
                continue;
            }
            report.attempted += 1;
            match self.connect(&record.address).await {
                Ok(()) => report.connected += 1,
                Err(e) => {
                    debug!(peer = %record.address.short(), error = %e, "reconnect attempt failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn connect(&self, address: &PeerAddress) -> SyncResult<()> {
        self.transport.accept_connection(address).await
    }

    /// Run [`ReconnectLoop::tick`] every interval until the handle is stopped.
    /// The first pass runs immediately.
    pub fn spawn(self) -> ReconnectHandle {
        let token = CancellationToken::new();
        let child = token.clone();
        let task = tokio::spawn(async move { self.run(child).await });
        ReconnectHandle { token, task }
    }

    async fn run(self, token: CancellationToken) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.interval, "reconnect loop started");
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = self.tick() => match result {
                    Ok(report) => debug!(?report, "reconnect pass finished"),
                    Err(e) => warn!(error = %e, "reconnect pass failed"),
                },
            }
        }
        info!("reconnect loop stopped");
    }
}

/// Stops a spawned [`ReconnectLoop`].
#[derive(Debug)]
pub struct ReconnectHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ReconnectHandle {
    /// Cancel the loop and wait for it to exit. A pass in progress is
    /// abandoned.
    pub async fn stop(self) -> SyncResult<()> {
        self.token.cancel();
        self.task
            .await
            .map_err(|e| SyncError::Task(format!("reconnect loop: {e}")))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
