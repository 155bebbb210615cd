//! # Round Tallies
//!
//! Counting promises and votes for one round. A round ends as soon as a
//! quorum is reached or can no longer be reached.

use shared_types::{
    AcceptedProposal, Ballot, Digest, NodeId, Promise, RejectReason, ValidationError, Vote,
    VoteSignature,
};
use std::collections::HashSet;

/// Shared bookkeeping of both phases.
#[derive(Debug, Clone)]
struct Progress {
    quorum: usize,
    members: usize,
    responded: usize,
    granted: usize,
    highest_round: u64,
    committed_elsewhere: Option<u64>,
}

impl Progress {
    fn new(quorum: usize, members: usize) -> Self {
        Self {
            quorum,
            members,
            responded: 0,
            granted: 0,
            highest_round: 0,
            committed_elsewhere: None,
        }
    }

    fn reject(&mut self, reason: &RejectReason) {
        match reason {
            RejectReason::StaleBallot { promised } => {
                self.highest_round = self.highest_round.max(promised.round);
            }
            RejectReason::AlreadyCommitted { committed_height } => {
                self.committed_elsewhere = Some(
                    self.committed_elsewhere
                        .map_or(*committed_height, |h| h.max(*committed_height)),
                );
            }
            _ => {}
        }
    }

    fn has_quorum(&self) -> bool {
        self.granted >= self.quorum
    }

    fn is_lost(&self) -> bool {
        self.granted + (self.members - self.responded.min(self.members)) < self.quorum
    }
}

/// Promises collected in phase one.
#[derive(Debug, Clone)]
pub struct PromiseTally {
    progress: Progress,
    best: Option<AcceptedProposal>,
}

impl PromiseTally {
    pub fn new(quorum: usize, members: usize) -> Self {
        Self {
            progress: Progress::new(quorum, members),
            best: None,
        }
    }

    /// Count one answer.
    pub fn record(&mut self, promise: &Promise) {
        self.progress.responded += 1;
        if promise.granted {
            self.progress.granted += 1;
            if let Some(accepted) = &promise.accepted {
                let higher = self
                    .best
                    .as_ref()
                    .map_or(true, |best| accepted.ballot > best.ballot);
                if higher {
                    self.best = Some(accepted.clone());
                }
            }
        } else if let Some(reason) = &promise.reason {
            self.progress.reject(reason);
        }
    }

    /// Count a member that could not be reached.
    pub fn record_failure(&mut self) {
        self.progress.responded += 1;
    }

    pub fn has_quorum(&self) -> bool {
        self.progress.has_quorum()
    }

    pub fn is_lost(&self) -> bool {
        self.progress.is_lost()
    }

    pub fn granted(&self) -> usize {
        self.progress.granted
    }

    /// Highest round a rejecting voter had promised.
    pub fn highest_round(&self) -> u64 {
        self.progress.highest_round
    }

    /// Highest height a voter reported beyond the proposed index.
    pub fn committed_elsewhere(&self) -> Option<u64> {
        self.progress.committed_elsewhere
    }

    /// Highest-ballot accepted proposal reported by the quorum.
    pub fn into_best(self) -> Option<AcceptedProposal> {
        self.best
    }
}

/// Votes collected in phase two.
#[derive(Debug, Clone)]
pub struct VoteTally {
    progress: Progress,
    index: u64,
    ballot: Ballot,
    digest: Digest,
    votes: Vec<VoteSignature>,
    seen: HashSet<NodeId>,
    validation_rejections: usize,
    first_validation_error: Option<ValidationError>,
}

impl VoteTally {
    pub fn new(quorum: usize, members: usize, index: u64, ballot: Ballot, digest: Digest) -> Self {
        Self {
            progress: Progress::new(quorum, members),
            index,
            ballot,
            digest,
            votes: Vec::with_capacity(quorum),
            seen: HashSet::new(),
            validation_rejections: 0,
            first_validation_error: None,
        }
    }

    /// Count the vote `from` sent.
    ///
    /// Accepting votes only count when signed by `from` over this round's
    /// entry; anything else is treated like a rejection.
    pub fn record(&mut self, from: NodeId, vote: &Vote) {
        self.progress.responded += 1;
        if vote.accept {
            let Some(signature) = vote.signature else {
                return;
            };
            let signed = VoteSignature {
                voter: from,
                signature,
            };
            if vote.voter == from
                && signed.verify(self.index, &self.ballot, &self.digest).is_ok()
                && self.seen.insert(from)
            {
                self.votes.push(signed);
                self.progress.granted += 1;
            }
        } else if let Some(reason) = &vote.reason {
            if let RejectReason::Validation(err) = reason {
                self.validation_rejections += 1;
                self.first_validation_error.get_or_insert_with(|| err.clone());
            }
            self.progress.reject(reason);
        }
    }

    /// Count a member that could not be reached.
    pub fn record_failure(&mut self) {
        self.progress.responded += 1;
    }

    pub fn has_quorum(&self) -> bool {
        self.progress.has_quorum()
    }

    pub fn is_lost(&self) -> bool {
        self.progress.is_lost()
    }

    pub fn accepted(&self) -> usize {
        self.progress.granted
    }

    pub fn highest_round(&self) -> u64 {
        self.progress.highest_round
    }

    pub fn committed_elsewhere(&self) -> Option<u64> {
        self.progress.committed_elsewhere
    }

    /// Validation error, once a quorum rejected on validation.
    pub fn validation_failure(&self) -> Option<&ValidationError> {
        if self.validation_rejections >= self.progress.quorum {
            self.first_validation_error.as_ref()
        } else {
            None
        }
    }

    /// Signatures forming the certificate.
    pub fn into_votes(self) -> Vec<VoteSignature> {
        self.votes
    }
}
