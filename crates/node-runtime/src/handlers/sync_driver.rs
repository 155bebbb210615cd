//! # Background Drivers
//!
//! Long-running node tasks, each stopped by the shared shutdown channel:
//!
//! | Task | Loop |
//! |------|------|
//! | [`run_catch_up`] | step catch-up; back-to-back while batches apply, else wait for a nudge or the probe interval |
//! | [`run_halt_watcher`] | wait for the pipeline to halt, then freeze catch-up |
//! | [`run_heartbeat`] | log height and sync state, refresh gauges |
//! | [`run_event_monitor`] | follow the node event bus, count transitions, log halts and peer flips |
//!
//! The catch-up probe doubles as the liveness monitor: every step asks each
//! member for its health.

use crate::handlers::commit_pipeline::CommitPipeline;
use registry_telemetry::metrics::{
    CATCH_UP_BATCHES, CONFIG_CHANGES, PEERS_REACHABLE, PEER_TRANSITIONS, ROUNDS_ABANDONED,
    SYNC_STATE, SYNC_TRANSITIONS,
};
use shared_bus::{RegistryEvent, Subscription};
use shared_types::SyncState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use wr_04_catch_up::{CatchUpError, CatchUpManager, StepOutcome};

/// Gauge value for a sync state.
pub fn sync_state_gauge(state: SyncState) -> i64 {
    match state {
        SyncState::Behind => 0,
        SyncState::Syncing { .. } => 1,
        SyncState::CaughtUp => 2,
        SyncState::Halted => 3,
    }
}

/// Step catch-up until shutdown or halt.
pub async fn run_catch_up(catch_up: Arc<CatchUpManager>, mut shutdown: watch::Receiver<bool>) {
    info!("Catch-up driver started");
    loop {
        if *shutdown.borrow() {
            break;
        }

        let result = catch_up.step().await;
        SYNC_STATE.set(sync_state_gauge(catch_up.state()));
        PEERS_REACHABLE.set(catch_up.reachable_peers() as i64);

        let pause = match result {
            Ok(StepOutcome::Applied { from, height, target }) => {
                CATCH_UP_BATCHES.with_label_values(&["applied"]).inc();
                debug!(from, height, target, "Catch-up batch applied");
                continue;
            }
            Ok(StepOutcome::CaughtUp { .. }) => None,
            Err(CatchUpError::Halted) => break,
            Err(err @ CatchUpError::VerificationFailure { .. }) => {
                CATCH_UP_BATCHES.with_label_values(&[err.label()]).inc();
                warn!(error = %err, "Catch-up batch discarded");
                Some(catch_up.config().retry_delay())
            }
            Err(err) => {
                CATCH_UP_BATCHES.with_label_values(&[err.label()]).inc();
                debug!(error = %err, "Catch-up step did not progress");
                None
            }
        };

        tokio::select! {
            _ = shutdown.changed() => {}
            _ = idle(&catch_up, pause) => {}
        }
    }
    info!("Catch-up driver stopped");
}

async fn idle(catch_up: &CatchUpManager, pause: Option<Duration>) {
    match pause {
        Some(delay) => sleep(delay).await,
        None => catch_up.wait_for_nudge().await,
    }
}

/// Freeze catch-up once the pipeline halts.
pub async fn run_halt_watcher(
    pipeline: Arc<CommitPipeline>,
    catch_up: Arc<CatchUpManager>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut halted = pipeline.subscribe_halt();
    tokio::select! {
        _ = shutdown.changed() => {}
        result = halted.wait_for(Option::is_some) => {
            if result.is_ok() {
                catch_up.halt();
                SYNC_STATE.set(sync_state_gauge(SyncState::Halted));
            }
        }
    }
}

/// Periodic status line.
pub async fn run_heartbeat(
    pipeline: Arc<CommitPipeline>,
    catch_up: Arc<CatchUpManager>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let state = if pipeline.is_halted() { SyncState::Halted } else { catch_up.state() };
                SYNC_STATE.set(sync_state_gauge(state));
                info!(
                    height = pipeline.height(),
                    %state,
                    peers = catch_up.reachable_peers(),
                    "Node status"
                );
            }
        }
    }
}

/// Consume node events until shutdown; returns how many were handled.
pub async fn run_event_monitor(
    mut events: Subscription,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut handled = 0;
    loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(event) => {
                    record_event(&event);
                    handled += 1;
                }
                None => break,
            },
            _ = shutdown.changed() => break,
        }
    }
    handled
}

fn record_event(event: &RegistryEvent) {
    match event {
        RegistryEvent::EntryCommitted { .. } => {}
        RegistryEvent::EntryRejectedOnApply { index, reason } => {
            warn!(index, %reason, "Committed entry left the registry unchanged");
        }
        RegistryEvent::ConfigChanged { version, members } => {
            CONFIG_CHANGES.inc();
            info!(version, members, "Cluster membership changed");
        }
        RegistryEvent::SyncStateChanged { to, .. } => {
            SYNC_TRANSITIONS.with_label_values(&[to.label()]).inc();
            SYNC_STATE.set(sync_state_gauge(*to));
        }
        RegistryEvent::RoundAbandoned { .. } => ROUNDS_ABANDONED.inc(),
        RegistryEvent::PeerReachability { peer, reachable } => {
            PEER_TRANSITIONS
                .with_label_values(&[if *reachable { "true" } else { "false" }])
                .inc();
            if *reachable {
                info!(%peer, "Peer reachable");
            } else {
                warn!(%peer, "Peer unreachable");
            }
        }
        RegistryEvent::NodeHalted { reason } => {
            error!(%reason, "Node halted; writes refused until restart");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::commit_pipeline::PipelineSettings;
    use async_trait::async_trait;
    use shared_bus::InMemoryEventBus;
    use shared_crypto::KeyPair;
    use shared_types::{ClusterConfig, PeerInfo, PeerRpc};
    use wr_04_catch_up::{CatchUpConfig, SyncSource};

    struct NoPeers;

    impl SyncSource for NoPeers {
        fn peers(&self) -> Vec<(PeerInfo, Arc<dyn PeerRpc>)> {
            Vec::new()
        }
    }

    fn single_node() -> (Arc<CommitPipeline>, Arc<CatchUpManager>) {
        let config = ClusterConfig::genesis(vec![PeerInfo {
            id: KeyPair::from_seed([1u8; 32]).public_key().into(),
            address: "local".into(),
        }]);
        let events = Arc::new(InMemoryEventBus::new());
        let pipeline = Arc::new(CommitPipeline::in_memory(
            config,
            PipelineSettings::default(),
            events.clone(),
        ));
        let catch_up = Arc::new(CatchUpManager::new(
            CatchUpConfig::for_testing(),
            Arc::new(NoPeers),
            pipeline.clone(),
            events,
        ));
        (pipeline, catch_up)
    }

    #[tokio::test]
    async fn test_event_monitor_counts_bus_events() {
        use shared_bus::{EventFilter, EventSubscriber};

        let events = InMemoryEventBus::new();
        let subscription = events.subscribe(EventFilter::all());
        let halted_before = SYNC_TRANSITIONS.with_label_values(&["halted"]).get();
        let abandoned_before = ROUNDS_ABANDONED.get();

        events.emit(RegistryEvent::SyncStateChanged {
            from: SyncState::CaughtUp,
            to: SyncState::Halted,
        });
        events.emit(RegistryEvent::RoundAbandoned {
            index: 4,
            round: 2,
            reason: "no quorum".into(),
        });
        events.emit(RegistryEvent::NodeHalted {
            reason: "test".into(),
        });

        let (stop, shutdown) = watch::channel(false);
        stop.send(true).unwrap();
        let handled = run_event_monitor(subscription, shutdown).await;

        assert_eq!(handled, 3);
        assert!(SYNC_TRANSITIONS.with_label_values(&["halted"]).get() > halted_before);
        assert!(ROUNDS_ABANDONED.get() > abandoned_before);
    }

    #[test]
    fn test_sync_state_gauge_values() {
        assert_eq!(sync_state_gauge(SyncState::Behind), 0);
        assert_eq!(sync_state_gauge(SyncState::Syncing { target: 4 }), 1);
        assert_eq!(sync_state_gauge(SyncState::CaughtUp), 2);
        assert_eq!(sync_state_gauge(SyncState::Halted), 3);
    }

    #[tokio::test]
    async fn test_single_member_reaches_caught_up() {
        let (_pipeline, catch_up) = single_node();
        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn(run_catch_up(catch_up.clone(), shutdown));

        let mut states = catch_up.subscribe();
        tokio::time::timeout(Duration::from_secs(2), states.wait_for(|s| s.is_caught_up()))
            .await
            .unwrap()
            .unwrap();

        stop.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_pipeline_halt_freezes_catch_up() {
        let (pipeline, catch_up) = single_node();
        let (_stop, shutdown) = watch::channel(false);
        let watcher = tokio::spawn(run_halt_watcher(
            pipeline.clone(),
            catch_up.clone(),
            shutdown.clone(),
        ));
        let driver = tokio::spawn(run_catch_up(catch_up.clone(), shutdown));

        pipeline.halt("test");
        watcher.await.unwrap();
        assert_eq!(catch_up.state(), SyncState::Halted);

        tokio::time::timeout(Duration::from_secs(2), driver)
            .await
            .unwrap()
            .unwrap();
    }
}
