//! Proposer side: rounds, retries and commit broadcast.

use super::{Committed, ConsensusEngine};
use crate::domain::{backoff_delay, ConsensusError, PromiseTally, VoteTally};
use crate::metrics;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use shared_bus::RegistryEvent;
use shared_types::{
    unix_millis, Ballot, CertifiedEntry, ClusterConfig, CommitCertificate, CommitRequest, Digest,
    LogEntry, NodeId, Operation, PrepareRequest, Promise, ProposeRequest, SyncState,
    TransportError, ValidationError, Vote,
};
use std::time::Instant;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

type Reply<'a, T> = BoxFuture<'a, (NodeId, Result<T, TransportError>)>;

/// How one round ended.
#[derive(Debug)]
pub(crate) enum RoundOutcome {
    /// Entry committed; `own` when it carries the submitted operation.
    Committed { index: u64, digest: Digest, own: bool },
    /// A quorum refused the operation.
    Rejected(ValidationError),
    /// Voters are past the index we proposed at.
    Behind { height: u64 },
    /// No quorum; retry.
    Abandoned(String),
}

impl ConsensusEngine {
    /// Drive `operation` until it commits or retries run out.
    pub(crate) async fn propose_operation(&self, operation: &Operation) -> Result<Committed, ConsensusError> {
        let started = Instant::now();
        let mut attempt: u32 = 0;
        let mut stalled = false;

        while attempt < self.config.max_attempts {
            match self.ports.registry.sync_state() {
                SyncState::Halted => return Err(ConsensusError::Halted),
                SyncState::CaughtUp => {}
                state => {
                    debug!(%state, "Proposer waiting for catch-up");
                    if !self.wait_caught_up().await {
                        attempt += 1;
                        stalled = true;
                        continue;
                    }
                }
            }
            stalled = false;

            let index = self.ports.registry.committed_height();
            self.ports.registry.validate(operation, &self.node_id)?;
            let ballot = Ballot::new(self.ledger.lock().next_round(index), self.node_id);

            let outcome = match timeout(self.config.round_timeout(), self.run_round(index, ballot, operation)).await {
                Ok(outcome) => outcome,
                Err(_) => RoundOutcome::Abandoned("round timed out".into()),
            };

            match outcome {
                RoundOutcome::Committed { index, digest, own: true } => {
                    metrics::record_round("committed");
                    metrics::record_proposal_latency(started.elapsed().as_secs_f64());
                    info!(index, entry = %digest, "Operation committed");
                    return Ok(Committed {
                        index,
                        entry_digest: digest,
                    });
                }
                RoundOutcome::Committed { index, own: false, .. } => {
                    metrics::record_round("adopted");
                    debug!(index, "Completed an earlier proposal; retrying at next index");
                    if self.ports.registry.committed_height() <= index {
                        attempt += 1;
                    }
                }
                RoundOutcome::Rejected(err) => {
                    metrics::record_round("rejected");
                    return Err(err.into());
                }
                RoundOutcome::Behind { height } => {
                    metrics::record_round("behind");
                    debug!(index, height, "Proposer is behind; signalling catch-up");
                    self.ports.lag.lag_detected(height);
                    attempt += 1;
                    sleep(backoff_delay(&self.config, attempt)).await;
                }
                RoundOutcome::Abandoned(reason) => {
                    metrics::record_round("abandoned");
                    debug!(index, round = ballot.round, %reason, "Round abandoned");
                    self.ports.events.emit(RegistryEvent::RoundAbandoned {
                        index,
                        round: ballot.round,
                        reason,
                    });
                    attempt += 1;
                    sleep(backoff_delay(&self.config, attempt)).await;
                }
            }
        }

        if stalled {
            warn!(attempts = attempt, "Proposal stalled: node not caught up");
            Err(ConsensusError::PartitionStall)
        } else {
            warn!(attempts = attempt, "Proposal gave up without quorum");
            Err(ConsensusError::QuorumTimeout { attempts: attempt })
        }
    }

    /// Wait up to one round timeout for `CaughtUp`.
    async fn wait_caught_up(&self) -> bool {
        let mut rx = self.ports.registry.watch_sync();
        let waited = timeout(
            self.config.round_timeout(),
            rx.wait_for(|s| s.is_caught_up() || *s == SyncState::Halted),
        )
        .await;
        matches!(waited, Ok(Ok(state)) if state.is_caught_up())
    }

    /// One prepare + propose round at `index`.
    pub(crate) async fn run_round(&self, index: u64, ballot: Ballot, operation: &Operation) -> RoundOutcome {
        let config = self.ports.registry.config();
        let quorum = config.quorum_size();
        let members = config.member_count();

        // Phase one
        let mut promises = PromiseTally::new(quorum, members);
        let mut pending = self.prepare_all(&config, PrepareRequest { index, ballot });
        while let Some((from, reply)) = pending.next().await {
            match reply {
                Ok(promise) => promises.record(&promise),
                Err(err) => {
                    debug!(peer = %from, error = %err, "Prepare not delivered");
                    promises.record_failure();
                }
            }
            if promises.has_quorum() || promises.is_lost() {
                break;
            }
        }
        drop(pending);

        self.ledger.lock().observe_round(index, promises.highest_round());
        if !promises.has_quorum() {
            if let Some(height) = promises.committed_elsewhere() {
                return RoundOutcome::Behind { height };
            }
            return RoundOutcome::Abandoned(format!(
                "{} of {quorum} promises",
                promises.granted()
            ));
        }

        let (entry, own) = match promises.into_best() {
            Some(accepted) => {
                // Keep the agreed value; the ballot fields become ours.
                let own = accepted.entry.operation == *operation;
                let entry = LogEntry {
                    index,
                    round: ballot.round,
                    proposer: self.node_id,
                    timestamp: accepted.entry.timestamp,
                    operation: accepted.entry.operation,
                };
                (entry, own)
            }
            None => {
                let entry = LogEntry {
                    index,
                    round: ballot.round,
                    proposer: self.node_id,
                    timestamp: unix_millis(),
                    operation: operation.clone(),
                };
                (entry, true)
            }
        };

        // Phase two
        let digest = entry.digest();
        let mut votes = VoteTally::new(quorum, members, index, ballot, digest);
        let mut pending = self.propose_all(&config, ProposeRequest::from_entry(&entry));
        while let Some((from, reply)) = pending.next().await {
            match reply {
                Ok(vote) => votes.record(from, &vote),
                Err(err) => {
                    debug!(peer = %from, error = %err, "Proposal not delivered");
                    votes.record_failure();
                }
            }
            if votes.has_quorum() || votes.is_lost() {
                break;
            }
        }
        drop(pending);

        self.ledger.lock().observe_round(index, votes.highest_round());
        if !votes.has_quorum() {
            if let Some(height) = votes.committed_elsewhere() {
                return RoundOutcome::Behind { height };
            }
            if let Some(err) = votes.validation_failure() {
                if own {
                    return RoundOutcome::Rejected(err.clone());
                }
            }
            return RoundOutcome::Abandoned(format!("{} of {quorum} votes", votes.accepted()));
        }

        // Commit
        let certified = CertifiedEntry {
            entry,
            certificate: CommitCertificate {
                index,
                ballot,
                entry_digest: digest,
                votes: votes.into_votes(),
            },
        };
        self.broadcast_commit(&config, &certified);
        if let Err(reason) = self.ports.sink.deliver(certified).await {
            return RoundOutcome::Abandoned(format!("local commit failed: {reason}"));
        }
        RoundOutcome::Committed { index, digest, own }
    }

    fn prepare_all<'a>(
        &'a self,
        config: &ClusterConfig,
        request: PrepareRequest,
    ) -> FuturesUnordered<Reply<'a, Promise>> {
        config
            .peers
            .iter()
            .map(|peer| {
                let id = peer.id;
                let request = request.clone();
                if id == self.node_id {
                    async move { (id, Ok(self.on_prepare(request))) }.boxed()
                } else {
                    let rpc = self.ports.peers.peer(&id);
                    async move {
                        let reply = match rpc {
                            Some(rpc) => rpc.prepare(request).await,
                            None => Err(TransportError::Unreachable(id)),
                        };
                        (id, reply)
                    }
                    .boxed()
                }
            })
            .collect()
    }

    fn propose_all<'a>(
        &'a self,
        config: &ClusterConfig,
        request: ProposeRequest,
    ) -> FuturesUnordered<Reply<'a, Vote>> {
        config
            .peers
            .iter()
            .map(|peer| {
                let id = peer.id;
                let request = request.clone();
                if id == self.node_id {
                    async move { (id, Ok(self.on_propose(request))) }.boxed()
                } else {
                    let rpc = self.ports.peers.peer(&id);
                    async move {
                        let reply = match rpc {
                            Some(rpc) => rpc.propose(request).await,
                            None => Err(TransportError::Unreachable(id)),
                        };
                        (id, reply)
                    }
                    .boxed()
                }
            })
            .collect()
    }

    /// Announce `certified` to every other member without waiting.
    fn broadcast_commit(&self, config: &ClusterConfig, certified: &CertifiedEntry) {
        for peer in config.peers.iter().filter(|p| p.id != self.node_id) {
            let Some(rpc) = self.ports.peers.peer(&peer.id) else {
                continue;
            };
            let request = CommitRequest {
                certified: certified.clone(),
            };
            let id = peer.id;
            tokio::spawn(async move {
                match rpc.commit(request).await {
                    Ok(ack) if !ack.accepted => {
                        debug!(peer = %id, reason = ?ack.reason, "Peer refused commit")
                    }
                    Ok(_) => {}
                    Err(err) => debug!(peer = %id, error = %err, "Commit not delivered"),
                }
            });
        }
    }
}
