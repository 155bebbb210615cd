//! Driving ports (inbound API).

use crate::domain::ConsensusError;
use crate::service::ProposalHandle;
use async_trait::async_trait;
use shared_types::{
    CommitAck, CommitRequest, Operation, PrepareRequest, Promise, ProposeRequest, Vote,
};

/// Consensus API used by the client interface and the peer RPC server.
#[async_trait]
pub trait ConsensusApi: Send + Sync {
    /// Queue `operation` for agreement.
    async fn submit(&self, operation: Operation) -> Result<ProposalHandle, ConsensusError>;

    /// Phase one, voter side.
    async fn handle_prepare(&self, request: PrepareRequest) -> Promise;

    /// Phase two, voter side.
    async fn handle_propose(&self, request: ProposeRequest) -> Vote;

    /// Deliver a certified entry announced by a peer.
    async fn handle_commit(&self, request: CommitRequest) -> CommitAck;
}
