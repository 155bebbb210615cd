//! # Commit Pipeline
//!
//! The node's single writer. Live commits from consensus and verified
//! batches from catch-up both end here:
//!
//! ```text
//! deliver(certified) ──► CommitBuffer ──┐
//!                                        ├─► verify cert ─► log.append ─► state.apply ─► events
//! apply_batch(entries) ─────────────────┘        (config at the entry's height)
//! ```
//!
//! Certificates are verified against the configuration in force at the
//! entry's height, which is the state's configuration just before applying.
//!
//! ## Halting
//!
//! A fatal log error or a state store refusing the next index stops the
//! writer for good: `halted` flips to `Some(reason)`, a `NodeHalted` event is
//! emitted and every later write returns [`PipelineError::Halted`].

use async_trait::async_trait;
use parking_lot::RwLock;
use registry_telemetry::metrics::{
    APPLY_REJECTIONS, BUFFERED_ENTRIES, COMMITS_APPLIED, COMMITTED_HEIGHT, NODE_HALTED,
};
use shared_bus::{InMemoryEventBus, RegistryEvent};
use shared_types::{
    CertifiedEntry, ClusterConfig, Deployment, Digest, Identity, Operation, ValidationError,
};
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use wr_01_replication_log::{
    BufferConfig, CommitBuffer, LogError, LogStore, OfferOutcome, ReplicationLog, Snapshot,
    SnapshotStore,
};
use wr_02_state_store::{ApplyOutcome, RegistryQueries, RegistryState, StateError};
use wr_03_consensus::CommitSink;
use wr_04_catch_up::{BatchRejected, EntrySink};

/// Why a write did not go through.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Node halted: {0}")]
    Halted(String),

    #[error("Entry refused: {0}")]
    Rejected(String),

    #[error("Certificate for index {index} invalid: {reason}")]
    Certificate { index: u64, reason: String },

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Snapshot cadence and buffer limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Snapshot every this many commits; 0 disables snapshots.
    pub snapshot_interval: u64,
    /// Snapshots retained after each save.
    pub snapshots_kept: usize,
    pub buffer: BufferConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            snapshot_interval: 1_024,
            snapshots_kept: 2,
            buffer: BufferConfig::default(),
        }
    }
}

struct PipelineInner {
    buffer: CommitBuffer,
    log: ReplicationLog,
    snapshots: Box<dyn SnapshotStore>,
}

/// Log, state and snapshots behind one writer lock.
pub struct CommitPipeline {
    genesis_hash: Digest,
    settings: PipelineSettings,
    state: RwLock<RegistryState>,
    inner: tokio::sync::Mutex<PipelineInner>,
    heights: watch::Sender<u64>,
    halted: watch::Sender<Option<String>>,
    events: Arc<InMemoryEventBus>,
}

impl CommitPipeline {
    /// Reload the log, restore the newest usable snapshot and replay the
    /// suffix on top of it.
    pub fn open(
        genesis: ClusterConfig,
        log_store: Box<dyn LogStore>,
        snapshots: Box<dyn SnapshotStore>,
        settings: PipelineSettings,
        events: Arc<InMemoryEventBus>,
    ) -> Result<Self, PipelineError> {
        let log = ReplicationLog::open(log_store)?;
        let height = log.committed_height();

        let fresh = RegistryState::genesis(genesis);
        let genesis_hash = fresh.genesis_hash();
        let mut state = restore_snapshot(snapshots.as_ref(), height, &genesis_hash).unwrap_or(fresh);
        let base = state.height();
        state.apply_all(log.iter_from(base).map(|c| &c.entry))?;

        info!(
            height,
            snapshot_height = base,
            state_root = %state.state_root(),
            "Commit pipeline opened"
        );
        COMMITTED_HEIGHT.set(height as i64);

        let (heights, _) = watch::channel(height);
        let (halted, _) = watch::channel(None);
        Ok(Self {
            genesis_hash,
            settings,
            state: RwLock::new(state),
            inner: tokio::sync::Mutex::new(PipelineInner {
                buffer: CommitBuffer::new(settings.buffer),
                log,
                snapshots,
            }),
            heights,
            halted,
            events,
        })
    }

    /// In-memory pipeline over `genesis`.
    pub fn in_memory(
        genesis: ClusterConfig,
        settings: PipelineSettings,
        events: Arc<InMemoryEventBus>,
    ) -> Self {
        let (heights, _) = watch::channel(0);
        let (halted, _) = watch::channel(None);
        let state = RegistryState::genesis(genesis);
        Self {
            genesis_hash: state.genesis_hash(),
            settings,
            state: RwLock::new(state),
            inner: tokio::sync::Mutex::new(PipelineInner {
                buffer: CommitBuffer::new(settings.buffer),
                log: ReplicationLog::in_memory(),
                snapshots: Box::new(wr_01_replication_log::MemorySnapshotStore::new()),
            }),
            heights,
            halted,
            events,
        }
    }

    /// Applied height.
    pub fn height(&self) -> u64 {
        self.state.read().height()
    }

    pub fn genesis_hash(&self) -> Digest {
        self.genesis_hash
    }

    /// Run `f` against the applied state.
    pub fn with_state<R>(&self, f: impl FnOnce(&RegistryState) -> R) -> R {
        f(&self.state.read())
    }

    /// Canonical bytes of the applied state.
    pub fn encoded_state(&self) -> Vec<u8> {
        self.state.read().encode()
    }

    /// Height after every write.
    pub fn subscribe_heights(&self) -> watch::Receiver<u64> {
        self.heights.subscribe()
    }

    /// `Some(reason)` once halted.
    pub fn subscribe_halt(&self) -> watch::Receiver<Option<String>> {
        self.halted.subscribe()
    }

    pub fn halt_reason(&self) -> Option<String> {
        self.halted.borrow().clone()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.borrow().is_some()
    }

    /// Stop writing for good.
    pub fn halt(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let first = self.halted.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason.clone());
            true
        });
        if first {
            error!(%reason, "Node halted");
            NODE_HALTED.set(1);
            self.events.emit(RegistryEvent::NodeHalted { reason });
        }
    }

    /// Committed entries in `range`, clamped to the height.
    pub async fn entries(&self, range: Range<u64>) -> Vec<CertifiedEntry> {
        self.inner.lock().await.log.read(range)
    }

    /// Buffer a live commit and write every entry that became contiguous.
    ///
    /// Returns the height afterwards.
    pub async fn commit(&self, certified: CertifiedEntry) -> Result<u64, PipelineError> {
        let mut inner = self.inner.lock().await;
        self.ensure_running()?;

        let height = self.height();
        let index = certified.index();
        match inner.buffer.offer(certified, height) {
            OfferOutcome::Buffered => {
                if index > height {
                    debug!(index, height, "Commit buffered ahead of height");
                }
            }
            OfferOutcome::Stale | OfferOutcome::Duplicate => return Ok(height),
            OfferOutcome::Conflict => {
                warn!(index, "Conflicting entry already buffered");
                return Err(PipelineError::Rejected(format!(
                    "another entry is buffered for index {index}"
                )));
            }
            OfferOutcome::TooFarAhead => {
                return Err(PipelineError::Rejected(format!(
                    "index {index} is too far past height {height}"
                )))
            }
            OfferOutcome::Full => {
                return Err(PipelineError::Rejected("commit buffer full".into()));
            }
        }

        let result = self.drain(&mut inner);
        self.publish_progress(&inner);
        result
    }

    /// Write catch-up entries in order, skipping those already committed.
    pub async fn write_batch(&self, entries: Vec<CertifiedEntry>) -> Result<u64, BatchRejected> {
        let mut inner = self.inner.lock().await;
        let reject = |height, reason: String| BatchRejected { height, reason };
        if let Some(reason) = self.halt_reason() {
            return Err(reject(self.height(), format!("halted: {reason}")));
        }

        let mut outcome = Ok(());
        for certified in entries {
            let height = self.height();
            if certified.index() < height {
                continue;
            }
            if certified.index() > height {
                outcome = Err(reject(
                    height,
                    format!("gap: expected index {height}, got {}", certified.index()),
                ));
                break;
            }
            if let Err(e) = self.write_next(&mut inner, certified) {
                outcome = Err(reject(self.height(), e.to_string()));
                break;
            }
        }

        let height = self.height();
        inner.buffer.discard_below(height);
        let drained = self.drain(&mut inner);
        self.publish_progress(&inner);
        outcome?;
        if let Err(e) = drained {
            debug!(error = %e, "Buffered entry refused after batch");
        }
        Ok(self.height())
    }

    fn ensure_running(&self) -> Result<(), PipelineError> {
        match self.halt_reason() {
            Some(reason) => Err(PipelineError::Halted(reason)),
            None => Ok(()),
        }
    }

    fn drain(&self, inner: &mut PipelineInner) -> Result<u64, PipelineError> {
        while let Some(next) = inner.buffer.take_next(self.height()) {
            self.write_next(inner, next)?;
        }
        Ok(self.height())
    }

    fn write_next(
        &self,
        inner: &mut PipelineInner,
        certified: CertifiedEntry,
    ) -> Result<(), PipelineError> {
        self.ensure_running()?;
        let index = certified.index();
        {
            let state = self.state.read();
            certified
                .certificate
                .verify(&certified.entry, state.config())
                .map_err(|e| PipelineError::Certificate {
                    index,
                    reason: e.to_string(),
                })?;
        }

        if let Err(e) = inner.log.append(certified.clone()) {
            if e.is_fatal() {
                self.halt(e.to_string());
            }
            return Err(e.into());
        }

        let applied = self.state.write().apply(&certified.entry);
        match applied {
            Ok(outcome) => self.announce(&certified, outcome),
            Err(e) => {
                self.halt(format!("state store refused index {index}: {e}"));
                return Err(e.into());
            }
        }

        self.maybe_snapshot(inner);
        Ok(())
    }

    fn announce(&self, certified: &CertifiedEntry, outcome: ApplyOutcome) {
        let index = certified.index();
        let operation = &certified.entry.operation;
        let kind = operation.kind();
        match outcome {
            ApplyOutcome::Applied | ApplyOutcome::ConfigChanged { .. } => {
                COMMITS_APPLIED.with_label_values(&[kind.as_str()]).inc();
                self.events.emit(RegistryEvent::EntryCommitted {
                    index,
                    kind,
                    name: operation.name().map(str::to_string),
                    entry_digest: certified.certificate.entry_digest,
                    state_root: self.state.read().state_root(),
                });
                if let ApplyOutcome::ConfigChanged { version, members } = outcome {
                    self.events
                        .emit(RegistryEvent::ConfigChanged { version, members });
                }
                debug!(index, kind = kind.as_str(), "Entry committed");
            }
            ApplyOutcome::Rejected(reason) => {
                APPLY_REJECTIONS.inc();
                self.events.emit(RegistryEvent::EntryRejectedOnApply {
                    index,
                    reason: reason.to_string(),
                });
            }
            ApplyOutcome::AlreadyApplied => {}
        }
    }

    fn maybe_snapshot(&self, inner: &mut PipelineInner) {
        let interval = self.settings.snapshot_interval;
        let height = self.height();
        if interval == 0 || height == 0 || height % interval != 0 {
            return;
        }

        let taken = self.state.read().snapshot();
        let (payload, state_root) = match taken {
            Ok(image) => image,
            Err(e) => {
                warn!(height, error = %e, "Snapshot encoding failed");
                return;
            }
        };
        let snapshot = Snapshot {
            height,
            state_root,
            payload,
        };
        if let Err(e) = inner.snapshots.save(&snapshot) {
            warn!(height, error = %e, "Snapshot not saved");
            return;
        }
        if let Err(e) = inner.snapshots.prune(self.settings.snapshots_kept) {
            warn!(error = %e, "Snapshot pruning failed");
        }
        debug!(height, %state_root, "Snapshot saved");
    }

    fn publish_progress(&self, inner: &PipelineInner) {
        let height = self.height();
        self.heights.send_if_modified(|current| {
            if *current == height {
                return false;
            }
            *current = height;
            true
        });
        COMMITTED_HEIGHT.set(height as i64);
        BUFFERED_ENTRIES.set(inner.buffer.len() as i64);
    }
}

/// Newest snapshot at or below `height` that restores cleanly.
fn restore_snapshot(
    store: &dyn SnapshotStore,
    height: u64,
    genesis_hash: &Digest,
) -> Option<RegistryState> {
    let mut ceiling = height;
    loop {
        let snapshot = match store.latest_at_or_below(ceiling) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Snapshot store unreadable, replaying from genesis");
                return None;
            }
        };
        match RegistryState::restore(&snapshot.payload, &snapshot.state_root, genesis_hash) {
            Ok(state) if state.height() == snapshot.height => {
                info!(height = snapshot.height, "State restored from snapshot");
                return Some(state);
            }
            Ok(state) => warn!(
                snapshot = snapshot.height,
                restored = state.height(),
                "Snapshot height does not match its contents"
            ),
            Err(e) => warn!(height = snapshot.height, error = %e, "Snapshot discarded"),
        }
        if snapshot.height == 0 {
            return None;
        }
        ceiling = snapshot.height - 1;
    }
}

#[async_trait]
impl CommitSink for CommitPipeline {
    async fn deliver(&self, certified: CertifiedEntry) -> Result<u64, String> {
        self.commit(certified).await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl EntrySink for CommitPipeline {
    fn local_height(&self) -> u64 {
        self.height()
    }

    fn genesis_hash(&self) -> Digest {
        self.genesis_hash
    }

    fn config(&self) -> ClusterConfig {
        self.state.read().config().clone()
    }

    async fn apply_batch(&self, entries: Vec<CertifiedEntry>) -> Result<u64, BatchRejected> {
        self.write_batch(entries).await
    }
}

impl RegistryQueries for CommitPipeline {
    fn lookup(&self, name: &str) -> Option<(Deployment, u64)> {
        self.state.read().lookup(name)
    }

    fn list_deployments(&self, owner: Option<&Identity>) -> Vec<Deployment> {
        self.state.read().list_deployments(owner)
    }

    fn next_version_for(&self, name: &str) -> u64 {
        self.state.read().next_version_for(name)
    }

    fn applied_height(&self) -> u64 {
        self.height()
    }

    fn root(&self) -> Digest {
        self.state.read().state_root()
    }

    fn cluster_config(&self) -> ClusterConfig {
        self.state.read().config().clone()
    }

    fn precheck(&self, operation: &Operation) -> Result<(), ValidationError> {
        self.state.read().validate(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_bus::{EventFilter, EventSubscriber, EventTopic, Subscription};
    use shared_crypto::KeyPair;
    use shared_types::{
        sign_vote, CommitCertificate, ContentDigest, DeployIntent, LogEntry, PeerInfo,
        VoteSignature,
    };
    use wr_01_replication_log::{FileLogStore, FileSnapshotStore, MemoryLogStore, MemorySnapshotStore};

    fn node_key() -> KeyPair {
        KeyPair::from_seed([1u8; 32])
    }

    fn genesis() -> ClusterConfig {
        ClusterConfig::genesis(vec![PeerInfo {
            id: node_key().public_key().into(),
            address: "local".into(),
        }])
    }

    fn certify_with(entry: LogEntry, signer: &KeyPair) -> CertifiedEntry {
        let digest = entry.digest();
        let certificate = CommitCertificate {
            index: entry.index,
            ballot: entry.ballot(),
            entry_digest: digest,
            votes: vec![VoteSignature {
                voter: signer.public_key().into(),
                signature: sign_vote(signer, entry.index, &entry.ballot(), &digest),
            }],
        };
        CertifiedEntry { entry, certificate }
    }

    fn deploy(index: u64, name: &str, version: u64) -> CertifiedEntry {
        let deployer = KeyPair::from_seed([2u8; 32]);
        let entry = LogEntry {
            index,
            round: 1,
            proposer: node_key().public_key().into(),
            timestamp: 1_000 + index,
            operation: Operation::Deploy(DeployIntent::signed(
                name,
                ContentDigest([index as u8; 32]),
                version,
                None,
                &deployer,
            )),
        };
        certify_with(entry, &node_key())
    }

    fn pipeline() -> CommitPipeline {
        CommitPipeline::in_memory(
            genesis(),
            PipelineSettings::default(),
            Arc::new(InMemoryEventBus::new()),
        )
    }

    fn pipeline_with_events() -> (CommitPipeline, Subscription) {
        let events = Arc::new(InMemoryEventBus::new());
        let subscription = events.subscribe(EventFilter::topics(vec![
            EventTopic::Commits,
            EventTopic::Lifecycle,
        ]));
        let pipeline = CommitPipeline::in_memory(genesis(), PipelineSettings::default(), events);
        (pipeline, subscription)
    }

    fn drain(subscription: &mut Subscription) -> Vec<RegistryEvent> {
        let mut seen = Vec::new();
        while let Ok(Some(event)) = subscription.try_recv() {
            seen.push(event);
        }
        seen
    }

    struct BrokenStore;

    impl LogStore for BrokenStore {
        fn load(&mut self) -> Result<Vec<CertifiedEntry>, LogError> {
            Ok(Vec::new())
        }

        fn append(&mut self, _entry: &CertifiedEntry) -> Result<(), LogError> {
            Err(LogError::Corrupted {
                offset: 0,
                reason: "device gone".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_out_of_order_commits_are_buffered() {
        let pipeline = pipeline();
        let mut heights = pipeline.subscribe_heights();

        assert_eq!(pipeline.commit(deploy(1, "beta", 1)).await.unwrap(), 0);
        assert!(pipeline.lookup("beta").is_none());

        assert_eq!(pipeline.commit(deploy(0, "alpha", 1)).await.unwrap(), 2);
        assert!(heights.has_changed().unwrap());
        assert_eq!(*heights.borrow_and_update(), 2);
        assert_eq!(pipeline.lookup("beta").unwrap().1, 2);
        assert_eq!(pipeline.entries(0..10).await.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_commit_is_ignored() {
        let pipeline = pipeline();
        pipeline.commit(deploy(0, "alpha", 1)).await.unwrap();
        assert_eq!(pipeline.commit(deploy(0, "alpha", 1)).await.unwrap(), 1);
        assert_eq!(pipeline.height(), 1);
    }

    #[tokio::test]
    async fn test_forged_certificate_refused() {
        let pipeline = pipeline();
        let outsider = KeyPair::from_seed([9u8; 32]);
        let forged = certify_with(deploy(0, "alpha", 1).entry, &outsider);

        let err = pipeline.commit(forged).await.unwrap_err();
        assert!(matches!(err, PipelineError::Certificate { index: 0, .. }));
        assert_eq!(pipeline.height(), 0);
        assert!(!pipeline.is_halted());

        assert_eq!(pipeline.commit(deploy(0, "alpha", 1)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_committed_entry_advances_height() {
        let (pipeline, mut events) = pipeline_with_events();
        pipeline.commit(deploy(0, "alpha", 2)).await.unwrap();
        pipeline.commit(deploy(1, "alpha", 1)).await.unwrap();

        assert_eq!(pipeline.height(), 2);
        assert_eq!(pipeline.lookup("alpha").unwrap().0.version, 2);
        assert_eq!(pipeline.with_state(RegistryState::rejected_entries), 1);

        let seen = drain(&mut events);
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], RegistryEvent::EntryCommitted { index: 0, .. }));
        assert!(matches!(seen[1], RegistryEvent::EntryRejectedOnApply { index: 1, .. }));
    }

    #[tokio::test]
    async fn test_batch_skips_committed_and_stops_at_gap() {
        let pipeline = pipeline();
        pipeline.commit(deploy(0, "alpha", 1)).await.unwrap();

        let height = pipeline
            .apply_batch(vec![deploy(0, "alpha", 1), deploy(1, "beta", 1)])
            .await
            .unwrap();
        assert_eq!(height, 2);

        let rejected = pipeline
            .apply_batch(vec![deploy(3, "delta", 1)])
            .await
            .unwrap_err();
        assert_eq!(rejected.height, 2);
        assert!(rejected.reason.contains("gap"));
    }

    #[tokio::test]
    async fn test_batch_drains_buffered_successors() {
        let pipeline = pipeline();
        pipeline.commit(deploy(2, "gamma", 1)).await.unwrap();

        let height = pipeline
            .apply_batch(vec![deploy(0, "alpha", 1), deploy(1, "beta", 1)])
            .await
            .unwrap();
        assert_eq!(height, 3);
    }

    #[tokio::test]
    async fn test_fatal_store_error_halts() {
        let events = Arc::new(InMemoryEventBus::new());
        let mut lifecycle = events.subscribe(EventFilter::topics(vec![EventTopic::Lifecycle]));
        let pipeline = CommitPipeline::open(
            genesis(),
            Box::new(BrokenStore),
            Box::new(MemorySnapshotStore::new()),
            PipelineSettings::default(),
            events.clone(),
        )
        .unwrap();
        let halt = pipeline.subscribe_halt();

        assert!(matches!(
            pipeline.commit(deploy(0, "alpha", 1)).await,
            Err(PipelineError::Log(LogError::Corrupted { .. }))
        ));
        assert!(halt.borrow().is_some());
        assert!(matches!(
            drain(&mut lifecycle).as_slice(),
            [RegistryEvent::NodeHalted { .. }]
        ));
        assert!(matches!(
            pipeline.commit(deploy(0, "alpha", 1)).await,
            Err(PipelineError::Halted(_))
        ));
        assert!(pipeline.apply_batch(vec![deploy(0, "alpha", 1)]).await.is_err());
    }

    #[test]
    fn test_open_detects_discontinuous_log() {
        let store = MemoryLogStore::with_records(vec![deploy(0, "alpha", 1), deploy(2, "gamma", 1)]);
        let result = CommitPipeline::open(
            genesis(),
            Box::new(store),
            Box::new(MemorySnapshotStore::new()),
            PipelineSettings::default(),
            Arc::new(InMemoryEventBus::new()),
        );
        assert!(matches!(
            result,
            Err(PipelineError::Log(LogError::Discontinuous { expected: 1, found: 2 }))
        ));
    }

    #[test]
    fn test_bad_snapshot_falls_back_to_genesis_replay() {
        let records: Vec<_> = (0..3).map(|i| deploy(i, &format!("site-{i}"), 1)).collect();
        let expected = RegistryState::replay(genesis(), records.iter().map(|c| &c.entry)).unwrap();

        let mut snapshots = MemorySnapshotStore::new();
        snapshots
            .save(&Snapshot {
                height: 2,
                state_root: Digest([7u8; 32]),
                payload: expected.snapshot().unwrap().0,
            })
            .unwrap();

        let pipeline = CommitPipeline::open(
            genesis(),
            Box::new(MemoryLogStore::with_records(records)),
            Box::new(snapshots),
            PipelineSettings::default(),
            Arc::new(InMemoryEventBus::new()),
        )
        .unwrap();
        assert_eq!(pipeline.height(), 3);
        assert_eq!(pipeline.encoded_state(), expected.encode());
    }

    #[tokio::test]
    async fn test_restart_replays_log_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PipelineSettings {
            snapshot_interval: 2,
            snapshots_kept: 2,
            ..PipelineSettings::default()
        };
        let open = || {
            CommitPipeline::open(
                genesis(),
                Box::new(FileLogStore::open(dir.path().join("log")).unwrap()),
                Box::new(FileSnapshotStore::open(dir.path().join("snapshots")).unwrap()),
                settings,
                Arc::new(InMemoryEventBus::new()),
            )
            .unwrap()
        };

        let before = {
            let pipeline = open();
            for i in 0..5 {
                pipeline.commit(deploy(i, &format!("site-{i}"), 1)).await.unwrap();
            }
            pipeline.encoded_state()
        };

        let snapshots = FileSnapshotStore::open(dir.path().join("snapshots")).unwrap();
        assert_eq!(snapshots.heights().unwrap(), vec![2, 4]);

        let reopened = open();
        assert_eq!(reopened.height(), 5);
        assert_eq!(reopened.encoded_state(), before);
        assert_eq!(reopened.entries(0..5).await.len(), 5);
    }
}
