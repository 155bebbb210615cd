//! # Commit Certificates
//!
//! Proof that a quorum of the configuration in force at an index voted for
//! one specific entry under one ballot.
//!
//! ```text
//! vote payload = index || ballot.round || ballot.proposer || entry digest
//! signed under the "vote" context with the voter's node key
//! ```
//!
//! A certificate is verified against the [`ClusterConfig`] of the height it
//! certifies, never against the verifier's latest configuration.

use crate::encoding::CanonicalWriter;
use crate::entities::{Ballot, ClusterConfig, Digest, LogEntry, NodeId, SignatureBytes};
use crate::errors::CertificateError;
use serde::{Deserialize, Serialize};
use shared_crypto::KeyPair;
use std::collections::HashSet;

const VOTE_CONTEXT: &str = "web-registry vote v1";

/// Bytes a voter signs when accepting `digest` at `index` under `ballot`.
pub fn vote_payload(index: u64, ballot: &Ballot, digest: &Digest) -> Vec<u8> {
    let mut w = CanonicalWriter::new();
    w.put_u64(index)
        .put_u64(ballot.round)
        .put_fixed(&ballot.proposer.0)
        .put_fixed(&digest.0);
    w.into_bytes()
}

/// Sign an accepting vote.
pub fn sign_vote(key: &KeyPair, index: u64, ballot: &Ballot, digest: &Digest) -> SignatureBytes {
    key.sign_in_context(VOTE_CONTEXT, &vote_payload(index, ballot, digest))
        .into()
}

/// One voter's signature inside a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSignature {
    pub voter: NodeId,
    pub signature: SignatureBytes,
}

impl VoteSignature {
    /// Verify this vote for `(index, ballot, digest)`.
    pub fn verify(&self, index: u64, ballot: &Ballot, digest: &Digest) -> Result<(), CertificateError> {
        let bad = || CertificateError::BadSignature { voter: self.voter };
        self.voter
            .public_key()
            .map_err(|_| bad())?
            .verify_in_context(
                VOTE_CONTEXT,
                &vote_payload(index, ballot, digest),
                &self.signature.signature(),
            )
            .map_err(|_| bad())
    }
}

/// Quorum evidence for one committed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitCertificate {
    pub index: u64,
    pub ballot: Ballot,
    pub entry_digest: Digest,
    pub votes: Vec<VoteSignature>,
}

impl CommitCertificate {
    /// Check that the certificate talks about `entry`.
    ///
    /// Cheap structural check used before a batch is handed to the writer.
    pub fn check_binding(&self, entry: &LogEntry) -> Result<(), CertificateError> {
        if self.index != entry.index {
            return Err(CertificateError::IndexMismatch {
                certificate: self.index,
                entry: entry.index,
            });
        }
        if self.ballot != entry.ballot() {
            return Err(CertificateError::BallotMismatch { index: entry.index });
        }
        if self.entry_digest != entry.digest() {
            return Err(CertificateError::DigestMismatch { index: entry.index });
        }
        Ok(())
    }

    /// Full verification against the configuration in force at `entry.index`.
    pub fn verify(&self, entry: &LogEntry, config: &ClusterConfig) -> Result<(), CertificateError> {
        self.check_binding(entry)?;

        let mut seen = HashSet::with_capacity(self.votes.len());
        for vote in &self.votes {
            if !config.is_member(&vote.voter) {
                return Err(CertificateError::UnknownVoter { voter: vote.voter });
            }
            if !seen.insert(vote.voter) {
                return Err(CertificateError::DuplicateVoter { voter: vote.voter });
            }
            vote.verify(self.index, &self.ballot, &self.entry_digest)?;
        }

        let required = config.quorum_size();
        if seen.len() < required {
            return Err(CertificateError::InsufficientVotes {
                got: seen.len(),
                required,
            });
        }
        Ok(())
    }
}

/// A committed entry together with its certificate.
///
/// The unit that is appended, fetched during catch-up, and replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertifiedEntry {
    pub entry: LogEntry,
    pub certificate: CommitCertificate,
}

impl CertifiedEntry {
    /// Log index.
    pub fn index(&self) -> u64 {
        self.entry.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ContentDigest, DeployIntent, Operation, PeerInfo};

    fn cluster(n: u8) -> (Vec<KeyPair>, ClusterConfig) {
        let keys: Vec<KeyPair> = (1..=n).map(|s| KeyPair::from_seed([s; 32])).collect();
        let peers = keys
            .iter()
            .enumerate()
            .map(|(i, k)| PeerInfo {
                id: k.public_key().into(),
                address: format!("n{i}"),
            })
            .collect();
        (keys, ClusterConfig::genesis(peers))
    }

    fn entry(proposer: NodeId) -> LogEntry {
        let deployer = KeyPair::from_seed([42u8; 32]);
        LogEntry {
            index: 0,
            round: 1,
            proposer,
            timestamp: 1,
            operation: Operation::Deploy(DeployIntent::signed(
                "site",
                ContentDigest([8u8; 32]),
                1,
                None,
                &deployer,
            )),
        }
    }

    fn certify(entry: &LogEntry, signers: &[&KeyPair]) -> CommitCertificate {
        let digest = entry.digest();
        CommitCertificate {
            index: entry.index,
            ballot: entry.ballot(),
            entry_digest: digest,
            votes: signers
                .iter()
                .map(|k| VoteSignature {
                    voter: k.public_key().into(),
                    signature: sign_vote(k, entry.index, &entry.ballot(), &digest),
                })
                .collect(),
        }
    }

    #[test]
    fn test_quorum_certificate_verifies() {
        let (keys, config) = cluster(3);
        let e = entry(config.peers[0].id);
        let cert = certify(&e, &[&keys[0], &keys[2]]);
        assert!(cert.verify(&e, &config).is_ok());
    }

    #[test]
    fn test_minority_certificate_rejected() {
        let (keys, config) = cluster(4);
        let e = entry(config.peers[0].id);
        let cert = certify(&e, &[&keys[0], &keys[1]]);
        assert_eq!(
            cert.verify(&e, &config),
            Err(CertificateError::InsufficientVotes {
                got: 2,
                required: 3
            })
        );
    }

    #[test]
    fn test_duplicate_and_foreign_votes_rejected() {
        let (keys, config) = cluster(3);
        let e = entry(config.peers[0].id);

        let dup = certify(&e, &[&keys[0], &keys[0]]);
        assert!(matches!(
            dup.verify(&e, &config),
            Err(CertificateError::DuplicateVoter { .. })
        ));

        let outsider = KeyPair::from_seed([99u8; 32]);
        let foreign = certify(&e, &[&keys[0], &outsider]);
        assert!(matches!(
            foreign.verify(&e, &config),
            Err(CertificateError::UnknownVoter { .. })
        ));
    }

    #[test]
    fn test_certificate_does_not_transfer_to_other_entry() {
        let (keys, config) = cluster(3);
        let e = entry(config.peers[0].id);
        let cert = certify(&e, &[&keys[0], &keys[1]]);

        let mut tampered = e.clone();
        tampered.timestamp += 1;
        assert_eq!(
            cert.verify(&tampered, &config),
            Err(CertificateError::DigestMismatch { index: 0 })
        );

        let mut forged = cert.clone();
        forged.votes[1].signature = forged.votes[0].signature;
        assert!(matches!(
            forged.verify(&e, &config),
            Err(CertificateError::BadSignature { .. })
        ));
    }
}
