//! Proposal queue plumbing.

use crate::domain::ConsensusError;
use shared_types::{Digest, Operation};
use tokio::sync::oneshot;
use uuid::Uuid;

/// An operation that made it into the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Committed {
    /// Log index of the committing entry.
    pub index: u64,
    /// Digest of the committing entry.
    pub entry_digest: Digest,
}

pub(crate) struct Submission {
    pub id: Uuid,
    pub operation: Operation,
    pub reply: oneshot::Sender<Result<Committed, ConsensusError>>,
}

/// Waiter for one submitted operation.
///
/// Dropping the handle does not withdraw the proposal.
#[derive(Debug)]
pub struct ProposalHandle {
    id: Uuid,
    rx: oneshot::Receiver<Result<Committed, ConsensusError>>,
}

impl ProposalHandle {
    pub(crate) fn new(id: Uuid, rx: oneshot::Receiver<Result<Committed, ConsensusError>>) -> Self {
        Self { id, rx }
    }

    /// Correlation id of the submission.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the driver's verdict.
    pub async fn wait(self) -> Result<Committed, ConsensusError> {
        self.rx.await.unwrap_or(Err(ConsensusError::Shutdown))
    }
}
