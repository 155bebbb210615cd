//! # Catch-Up Manager
//!
//! One [`CatchUpManager::step`] probes every peer, decides the sync state
//! and, when behind, moves at most one verified batch into the local log.
//! Steps are serialised; the node runtime calls them in a loop.

use crate::config::CatchUpConfig;
use crate::domain::{verify_batch, CatchUpError, PeerTable};
use crate::ports::{EntrySink, SyncSource};
use futures::future::join_all;
use parking_lot::Mutex;
use shared_bus::{InMemoryEventBus, RegistryEvent};
use shared_types::{unix_millis, FetchEntriesRequest, NodeId, PeerInfo, PeerRpc, SyncState};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Result of one successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Local height equals the best height any peer reported.
    CaughtUp { height: u64 },
    /// A batch was applied; the target is re-queried next step.
    Applied { from: u64, height: u64, target: u64 },
}

/// Catch-up state machine for one node.
pub struct CatchUpManager {
    config: CatchUpConfig,
    source: Arc<dyn SyncSource>,
    sink: Arc<dyn EntrySink>,
    events: Arc<InMemoryEventBus>,
    state: watch::Sender<SyncState>,
    peers: Mutex<PeerTable>,
    batch_size: AtomicU64,
    lag_hint: AtomicU64,
    nudge: Notify,
    step_lock: tokio::sync::Mutex<()>,
}

impl CatchUpManager {
    /// Manager starting in `Behind`.
    pub fn new(
        config: CatchUpConfig,
        source: Arc<dyn SyncSource>,
        sink: Arc<dyn EntrySink>,
        events: Arc<InMemoryEventBus>,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::Behind);
        Self {
            batch_size: AtomicU64::new(config.batch_size.max(1)),
            config,
            source,
            sink,
            events,
            state,
            peers: Mutex::new(PeerTable::new()),
            lag_hint: AtomicU64::new(0),
            nudge: Notify::new(),
            step_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &CatchUpConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// State updates.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Entries requested by the next fetch.
    pub fn batch_size(&self) -> u64 {
        self.batch_size.load(Ordering::Relaxed)
    }

    /// Highest height a peer or proposal has hinted at.
    pub fn lag_hint(&self) -> u64 {
        self.lag_hint.load(Ordering::Relaxed)
    }

    /// Number of peers that answered the last probe.
    pub fn reachable_peers(&self) -> usize {
        self.peers.lock().reachable_count()
    }

    /// Someone saw `observed_height`; wake the driver if that is ahead.
    pub fn lag_detected(&self, observed_height: u64) {
        self.lag_hint.fetch_max(observed_height, Ordering::Relaxed);
        if observed_height > self.sink.local_height() {
            self.nudge.notify_one();
        }
    }

    /// Sleep for the probe interval or until nudged.
    pub async fn wait_for_nudge(&self) {
        tokio::select! {
            _ = self.nudge.notified() => {}
            _ = sleep(self.config.interval()) => {}
        }
    }

    /// Enter the terminal `Halted` state.
    pub fn halt(&self) {
        let mut from = None;
        self.state.send_if_modified(|current| {
            if *current == SyncState::Halted {
                return false;
            }
            from = Some(*current);
            *current = SyncState::Halted;
            true
        });
        if let Some(from) = from {
            warn!(%from, "Catch-up halted");
            self.events.emit(RegistryEvent::SyncStateChanged {
                from,
                to: SyncState::Halted,
            });
        }
    }

    /// Probe peers and move at most one batch.
    pub async fn step(&self) -> Result<StepOutcome, CatchUpError> {
        let _serial = self.step_lock.lock().await;
        if self.state() == SyncState::Halted {
            return Err(CatchUpError::Halted);
        }
        self.peers.lock().advance_step();

        let clients = self.source.peers();
        let required = self.sink.config().quorum_size().saturating_sub(1);
        let answered = self.probe(&clients).await;
        if answered < required {
            self.transition(SyncState::Behind);
            return Err(CatchUpError::InsufficientPeers {
                got: answered,
                required,
            });
        }

        let local = self.sink.local_height();
        let best = self
            .peers
            .lock()
            .views()
            .filter(|v| v.reachable)
            .map(|v| v.committed_height)
            .max()
            .unwrap_or(0);
        let target = best.max(local);
        if target == local {
            self.transition(SyncState::CaughtUp);
            return Ok(StepOutcome::CaughtUp { height: local });
        }
        self.transition(SyncState::Syncing { target });

        let to = target.min(local + self.batch_size());
        let picked = self.peers.lock().pick(to);
        let Some(peer) = picked else {
            return Err(CatchUpError::NoSource { from: local, to });
        };
        let Some(rpc) = clients
            .iter()
            .find(|(info, _)| info.id == peer)
            .map(|(_, rpc)| Arc::clone(rpc))
        else {
            return Err(CatchUpError::NoSource { from: local, to });
        };

        let request = FetchEntriesRequest {
            from_index: local,
            to_index: to,
        };
        debug!(%peer, from = local, to, target, "Fetching batch");
        let response = match timeout(self.config.fetch_timeout(), rpc.fetch_entries(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(self.unreachable(peer, err.to_string())),
            Err(_) => return Err(self.unreachable(peer, "fetch timed out".into())),
        };

        if let Err(err) = verify_batch(&response.entries, local, to) {
            return Err(self.reject(peer, err.to_string()));
        }
        match self.sink.apply_batch(response.entries).await {
            Ok(height) => {
                self.grow_batch();
                debug!(%peer, from = local, height, target, "Batch applied");
                Ok(StepOutcome::Applied {
                    from: local,
                    height,
                    target,
                })
            }
            Err(rejected) => {
                debug!(height = rejected.height, "Batch applied partially");
                Err(self.reject(peer, rejected.reason))
            }
        }
    }

    /// Step until caught up or the round bound is spent.
    ///
    /// Returns the number of steps used.
    pub async fn run_until_caught_up(&self) -> Result<u32, CatchUpError> {
        let mut target = self.sink.local_height();
        for round in 1..=self.config.max_sync_rounds {
            match self.step().await {
                Ok(StepOutcome::CaughtUp { height }) => {
                    debug!(round, height, "Caught up");
                    return Ok(round);
                }
                Ok(StepOutcome::Applied { target: t, .. }) => target = t,
                Err(CatchUpError::Halted) => return Err(CatchUpError::Halted),
                Err(err) => {
                    debug!(round, error = %err, "Catch-up step failed");
                    sleep(self.config.retry_delay()).await;
                }
            }
        }
        Err(CatchUpError::ConvergenceExceeded {
            rounds: self.config.max_sync_rounds,
            height: self.sink.local_height(),
            target,
        })
    }

    /// Ask every peer for its health; returns how many answered with our
    /// genesis.
    async fn probe(&self, clients: &[(PeerInfo, Arc<dyn PeerRpc>)]) -> usize {
        self.peers
            .lock()
            .sync_members(clients.iter().map(|(info, _)| info));

        let genesis = self.sink.genesis_hash();
        let wait = self.config.health_timeout();
        let replies = join_all(clients.iter().map(|(info, rpc)| async move {
            (info.id, timeout(wait, rpc.health()).await)
        }))
        .await;

        let now = unix_millis();
        let mut answered = 0;
        let mut changes: Vec<(NodeId, bool)> = Vec::new();
        {
            let mut peers = self.peers.lock();
            for (id, reply) in replies {
                match reply {
                    Ok(Ok(health)) if health.genesis_hash == genesis => {
                        answered += 1;
                        if peers.record_health(&id, health.committed_height, now) {
                            changes.push((id, true));
                        }
                    }
                    Ok(Ok(_)) => {
                        warn!(peer = %id, "Peer reports a different genesis; ignoring");
                        if peers.record_failure(&id) {
                            changes.push((id, false));
                        }
                    }
                    _ => {
                        if peers.record_failure(&id) {
                            changes.push((id, false));
                        }
                    }
                }
            }
        }

        for (peer, reachable) in changes {
            debug!(%peer, reachable, "Peer reachability changed");
            self.events
                .emit(RegistryEvent::PeerReachability { peer, reachable });
        }
        answered
    }

    fn transition(&self, to: SyncState) {
        let mut from = None;
        self.state.send_if_modified(|current| {
            if *current == to || *current == SyncState::Halted {
                return false;
            }
            from = Some(*current);
            *current = to;
            true
        });
        let Some(from) = from else {
            return;
        };
        if from.label() == to.label() {
            debug!(%from, %to, "Sync target moved");
        } else {
            info!(%from, %to, "Sync state changed");
        }
        self.events
            .emit(RegistryEvent::SyncStateChanged { from, to });
    }

    fn reject(&self, peer: NodeId, reason: String) -> CatchUpError {
        self.peers.lock().penalise(&peer, self.config.penalty_steps);
        let halved = (self.batch_size() / 2).max(self.config.min_batch_size.max(1));
        self.batch_size.store(halved, Ordering::Relaxed);
        warn!(%peer, %reason, batch_size = halved, "Discarded batch");
        CatchUpError::VerificationFailure { peer, reason }
    }

    fn unreachable(&self, peer: NodeId, reason: String) -> CatchUpError {
        {
            let mut peers = self.peers.lock();
            peers.record_failure(&peer);
            peers.penalise(&peer, self.config.penalty_steps);
        }
        debug!(%peer, %reason, "Fetch failed");
        CatchUpError::FetchFailed { peer, reason }
    }

    fn grow_batch(&self) {
        let grown = (self.batch_size() * 2).min(self.config.batch_size.max(1));
        self.batch_size.store(grown, Ordering::Relaxed);
    }
}
