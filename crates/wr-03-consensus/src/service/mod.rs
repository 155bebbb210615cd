//! # Consensus Service
//!
//! [`ConsensusEngine`] plays both roles: it answers prepare/propose/commit
//! as a voter, and a background driver runs rounds for operations submitted
//! on this node, one at a time.

mod proposer;
mod queue;

#[cfg(test)]
mod tests;

pub use queue::{Committed, ProposalHandle};

use crate::domain::{ConsensusConfig, ConsensusError, VoterLedger};
use crate::metrics;
use crate::ports::{CommitSink, ConsensusApi, LagSignal, PeerDirectory, RegistryView};
use async_trait::async_trait;
use parking_lot::Mutex;
use queue::Submission;
use shared_bus::InMemoryEventBus;
use shared_crypto::KeyPair;
use shared_types::{
    sign_vote, Ballot, CommitAck, CommitRequest, NodeId, Operation, PrepareRequest, Promise,
    ProposeRequest, RejectReason, SyncState, Vote,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

/// Everything the engine needs from its node.
#[derive(Clone)]
pub struct ConsensusPorts {
    pub registry: Arc<dyn RegistryView>,
    pub sink: Arc<dyn CommitSink>,
    pub peers: Arc<dyn PeerDirectory>,
    pub lag: Arc<dyn LagSignal>,
    pub events: Arc<InMemoryEventBus>,
}

/// Voter and proposer for one node.
pub struct ConsensusEngine {
    key: KeyPair,
    node_id: NodeId,
    config: ConsensusConfig,
    ports: ConsensusPorts,
    ledger: Mutex<VoterLedger>,
    queue_tx: mpsc::Sender<Submission>,
    queue_rx: Mutex<Option<mpsc::Receiver<Submission>>>,
}

impl ConsensusEngine {
    /// Engine signing votes with `key`.
    pub fn new(key: KeyPair, config: ConsensusConfig, ports: ConsensusPorts) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        Self {
            node_id: key.public_key().into(),
            key,
            config,
            ports,
            ledger: Mutex::new(VoterLedger::new()),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
        }
    }

    /// This node's id.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Start the proposal driver. Returns `None` if it was already started.
    pub fn spawn_driver(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
        let mut queue = self.queue_rx.lock().take()?;
        let engine = Arc::clone(self);

        Some(tokio::spawn(async move {
            info!(node = %engine.node_id, "Proposal driver started");
            loop {
                let submission = tokio::select! {
                    _ = shutdown.changed() => break,
                    next = queue.recv() => match next {
                        Some(submission) => submission,
                        None => break,
                    },
                };

                let span = info_span!(
                    "proposal",
                    id = %submission.id,
                    kind = submission.operation.kind().as_str()
                );
                let result = tokio::select! {
                    _ = shutdown.changed() => {
                        let _ = submission.reply.send(Err(ConsensusError::Shutdown));
                        break;
                    }
                    result = engine.propose_operation(&submission.operation).instrument(span) => result,
                };
                // The waiter may have given up; the outcome still stands.
                let _ = submission.reply.send(result);
            }
            info!(node = %engine.node_id, "Proposal driver stopped");
        }))
    }

    /// Gate shared by prepare and propose.
    fn admit(&self, index: u64, proposer: &NodeId, height: u64) -> Result<(), RejectReason> {
        let state = self.ports.registry.sync_state();
        if state == SyncState::Halted {
            return Err(RejectReason::Halted);
        }
        if !self.ports.registry.config().is_member(proposer) {
            return Err(RejectReason::NotAMember);
        }
        if index < height {
            return Err(RejectReason::AlreadyCommitted {
                committed_height: height,
            });
        }
        if index > height {
            self.ports.lag.lag_detected(index);
            return Err(RejectReason::VoterBehind {
                committed_height: height,
            });
        }
        if !state.is_caught_up() {
            return Err(RejectReason::NotCaughtUp);
        }
        Ok(())
    }

    pub(crate) fn on_prepare(&self, request: PrepareRequest) -> Promise {
        let height = self.ports.registry.committed_height();
        let reject = |reason: RejectReason| Promise {
            from: self.node_id,
            granted: false,
            reason: Some(reason),
            accepted: None,
            committed_height: height,
        };

        if let Err(reason) = self.admit(request.index, &request.ballot.proposer, height) {
            debug!(index = request.index, ballot = %request.ballot, ?reason, "Prepare refused");
            return reject(reason);
        }

        let mut ledger = self.ledger.lock();
        ledger.prune_below(height);
        match ledger.promise(request.index, request.ballot) {
            Ok(accepted) => Promise {
                from: self.node_id,
                granted: true,
                reason: None,
                accepted,
                committed_height: height,
            },
            Err(promised) => reject(RejectReason::StaleBallot { promised }),
        }
    }

    pub(crate) fn on_propose(&self, request: ProposeRequest) -> Vote {
        let height = self.ports.registry.committed_height();
        let vote = self.decide(request, height);
        metrics::record_vote(vote.accept);
        vote
    }

    fn decide(&self, request: ProposeRequest, height: u64) -> Vote {
        let reject = |reason: RejectReason| Vote {
            voter: self.node_id,
            accept: false,
            reason: Some(reason),
            signature: None,
            committed_height: height,
        };

        let ballot: Ballot = request.ballot();
        if let Err(reason) = self.admit(request.index, &ballot.proposer, height) {
            debug!(index = request.index, %ballot, ?reason, "Proposal refused");
            return reject(reason);
        }

        let entry = request.to_entry();
        if let Err(err) = self.ports.registry.validate(&entry.operation, &entry.proposer) {
            debug!(index = entry.index, %ballot, error = %err, "Proposal failed validation");
            return reject(RejectReason::Validation(err));
        }

        let digest = entry.digest();
        let index = entry.index;
        {
            let mut ledger = self.ledger.lock();
            ledger.prune_below(height);
            if let Err(promised) = ledger.accept(index, ballot, entry) {
                return reject(RejectReason::StaleBallot { promised });
            }
        }

        Vote {
            voter: self.node_id,
            accept: true,
            reason: None,
            signature: Some(sign_vote(&self.key, index, &ballot, &digest)),
            committed_height: height,
        }
    }

    pub(crate) async fn on_commit(&self, request: CommitRequest) -> CommitAck {
        metrics::record_commit_received();
        let height = self.ports.registry.committed_height();
        let ack = |accepted: bool, committed_height: u64, reason: Option<String>| CommitAck {
            accepted,
            committed_height,
            reason,
        };

        if self.ports.registry.sync_state() == SyncState::Halted {
            return ack(false, height, Some("halted".into()));
        }

        let certified = request.certified;
        let index = certified.index();
        if index < height {
            return ack(true, height, None);
        }
        if let Err(err) = certified.certificate.check_binding(&certified.entry) {
            debug!(index, error = %err, "Commit with mismatched certificate");
            return ack(false, height, Some(err.to_string()));
        }
        if index > height {
            self.ports.lag.lag_detected(index);
        }

        match self.ports.sink.deliver(certified).await {
            Ok(after) => ack(true, after, None),
            Err(reason) => {
                debug!(index, %reason, "Commit refused by pipeline");
                ack(false, self.ports.registry.committed_height(), Some(reason))
            }
        }
    }
}

#[async_trait]
impl ConsensusApi for ConsensusEngine {
    async fn submit(&self, operation: Operation) -> Result<ProposalHandle, ConsensusError> {
        if self.ports.registry.sync_state() == SyncState::Halted {
            return Err(ConsensusError::Halted);
        }
        let (reply, rx) = oneshot::channel();
        let id = Uuid::new_v4();
        self.queue_tx
            .send(Submission {
                id,
                operation,
                reply,
            })
            .await
            .map_err(|_| ConsensusError::Shutdown)?;
        Ok(ProposalHandle::new(id, rx))
    }

    async fn handle_prepare(&self, request: PrepareRequest) -> Promise {
        self.on_prepare(request)
    }

    async fn handle_propose(&self, request: ProposeRequest) -> Vote {
        self.on_propose(request)
    }

    async fn handle_commit(&self, request: CommitRequest) -> CommitAck {
        self.on_commit(request).await
    }
}
