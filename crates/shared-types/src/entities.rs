//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Identities**: `Identity`, `NodeId`, `SignatureBytes`
//! - **Registry**: `Deployment`, `DeployIntent`, `RemoveIntent`, `Operation`
//! - **Log**: `LogEntry`, `Ballot`, `Digest`
//! - **Cluster**: `ClusterConfig`, `PeerInfo`, `PeerView`, `SyncState`

use crate::encoding::{Canonical, CanonicalWriter};
use crate::errors::{HexParseError, ValidationError};
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use shared_crypto::{context_hash, CryptoError, KeyPair, PublicKey, Signature};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

/// Longest accepted deployment name (one DNS label).
pub const MAX_NAME_LEN: usize = 63;

/// Longest accepted site description in bytes.
pub const MAX_DESCRIPTION_LEN: usize = 256;

const DEPLOY_INTENT_CONTEXT: &str = "web-registry deploy intent v1";
const REMOVE_INTENT_CONTEXT: &str = "web-registry remove intent v1";
const LOG_ENTRY_CONTEXT: &str = "web-registry log entry v1";
const CLUSTER_CONFIG_CONTEXT: &str = "web-registry cluster config v1";

// =============================================================================
// FIXED-WIDTH BYTE IDENTIFIERS
// =============================================================================

/// Hex string in human-readable formats, raw bytes otherwise.
macro_rules! hex_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Width in bytes.
            pub const LEN: usize = $len;

            /// Raw bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Lowercase hex.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex.
            pub fn from_hex(text: &str) -> Result<Self, HexParseError> {
                decode_fixed::<$len>(text).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}..)", stringify!($name), &self.to_hex()[..8])
            }
        }

        impl FromStr for $name {
            type Err = HexParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_hex())
                } else {
                    serializer.serialize_bytes(&self.0)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let visitor = FixedBytesVisitor::<$len>(PhantomData);
                if deserializer.is_human_readable() {
                    deserializer.deserialize_str(visitor).map(Self)
                } else {
                    deserializer.deserialize_bytes(visitor).map(Self)
                }
            }
        }
    };
}

fn decode_fixed<const N: usize>(text: &str) -> Result<[u8; N], HexParseError> {
    let raw = hex::decode(text).map_err(|e| HexParseError::InvalidHex(e.to_string()))?;
    raw.as_slice()
        .try_into()
        .map_err(|_| HexParseError::InvalidLength {
            expected: N,
            actual: raw.len(),
        })
}

struct FixedBytesVisitor<const N: usize>(PhantomData<[u8; N]>);

impl<'de, const N: usize> Visitor<'de> for FixedBytesVisitor<N> {
    type Value = [u8; N];

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{N} bytes or a {}-character hex string", N * 2)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        decode_fixed::<N>(v).map_err(E::custom)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        v.try_into().map_err(|_| E::invalid_length(v.len(), &self))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut out = [0u8; N];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(i, &self))?;
        }
        Ok(out)
    }
}

hex_bytes!(
    /// Public-key-derived identity of a deployer.
    Identity,
    32
);

hex_bytes!(
    /// Identity of a cluster peer; the Ed25519 key that signs its votes.
    NodeId,
    32
);

hex_bytes!(
    /// Digest of a published web bundle.
    ContentDigest,
    32
);

hex_bytes!(
    /// BLAKE3 digest of a registry object (entry, state, config).
    Digest,
    32
);

hex_bytes!(
    /// Raw Ed25519 signature.
    SignatureBytes,
    64
);

impl From<PublicKey> for Identity {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

impl Identity {
    /// Decode as a verifying key.
    pub fn public_key(&self) -> Result<PublicKey, CryptoError> {
        PublicKey::from_bytes(self.0)
    }
}

impl From<PublicKey> for NodeId {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

impl NodeId {
    /// Decode as a verifying key.
    pub fn public_key(&self) -> Result<PublicKey, CryptoError> {
        PublicKey::from_bytes(self.0)
    }
}

impl From<Signature> for SignatureBytes {
    fn from(sig: Signature) -> Self {
        Self(*sig.as_bytes())
    }
}

impl SignatureBytes {
    /// As a verifiable signature.
    pub fn signature(&self) -> Signature {
        Signature::from_bytes(self.0)
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Check that `name` is a single lowercase DNS label.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let malformed = |reason: &str| ValidationError::MalformedName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(malformed("empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(malformed("longer than 63 characters"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(malformed("only a-z, 0-9 and '-' are allowed"));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(malformed("must not start or end with '-'"));
    }
    Ok(())
}

/// Check a site description against the size limit.
pub fn validate_description(description: Option<&str>) -> Result<(), ValidationError> {
    match description {
        Some(d) if d.len() > MAX_DESCRIPTION_LEN => Err(ValidationError::DescriptionTooLong {
            len: d.len(),
            max: MAX_DESCRIPTION_LEN,
        }),
        _ => Ok(()),
    }
}

/// The registry's record for one name.
///
/// Created or replaced only by a committed `Deploy` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Deployment name (DNS label).
    pub name: String,
    /// Deployer that owns the name.
    pub owner: Identity,
    /// Digest of the published bundle.
    pub digest: ContentDigest,
    /// Strictly increasing per name.
    pub version: u64,
    /// Proposer timestamp of the committing entry (ms).
    pub timestamp: u64,
    /// Optional site description.
    pub description: Option<String>,
    /// Log index of the committing entry.
    pub committed_at: u64,
}

impl Canonical for Deployment {
    fn encode(&self, w: &mut CanonicalWriter) {
        w.put_str(&self.name)
            .put_fixed(&self.owner.0)
            .put_fixed(&self.digest.0)
            .put_u64(self.version)
            .put_u64(self.timestamp)
            .put_opt_str(self.description.as_deref())
            .put_u64(self.committed_at);
    }
}

/// A deployer-signed request to bind `name` to a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployIntent {
    pub name: String,
    pub digest: ContentDigest,
    pub version: u64,
    pub owner: Identity,
    pub description: Option<String>,
    pub signature: SignatureBytes,
}

impl DeployIntent {
    /// Bytes the owner signs.
    pub fn signing_payload(
        name: &str,
        digest: &ContentDigest,
        version: u64,
        description: Option<&str>,
    ) -> Vec<u8> {
        let mut w = CanonicalWriter::new();
        w.put_str(name)
            .put_fixed(&digest.0)
            .put_u64(version)
            .put_opt_str(description);
        w.into_bytes()
    }

    /// Build and sign an intent with the deployer's key.
    pub fn signed(
        name: impl Into<String>,
        digest: ContentDigest,
        version: u64,
        description: Option<String>,
        deployer: &KeyPair,
    ) -> Self {
        let name = name.into();
        let payload = Self::signing_payload(&name, &digest, version, description.as_deref());
        let signature = deployer.sign_in_context(DEPLOY_INTENT_CONTEXT, &payload);
        Self {
            name,
            digest,
            version,
            owner: deployer.public_key().into(),
            description,
            signature: signature.into(),
        }
    }

    /// Check the signature against `owner`.
    pub fn verify_signature(&self) -> Result<(), CryptoError> {
        let payload = Self::signing_payload(
            &self.name,
            &self.digest,
            self.version,
            self.description.as_deref(),
        );
        self.owner.public_key()?.verify_in_context(
            DEPLOY_INTENT_CONTEXT,
            &payload,
            &self.signature.signature(),
        )
    }
}

/// A deployer-signed request to take `name` offline.
///
/// The version must exceed the live one; the tombstone keeps it so a later
/// re-deploy must go higher still.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveIntent {
    pub name: String,
    pub version: u64,
    pub owner: Identity,
    pub signature: SignatureBytes,
}

impl RemoveIntent {
    /// Bytes the owner signs.
    pub fn signing_payload(name: &str, version: u64) -> Vec<u8> {
        let mut w = CanonicalWriter::new();
        w.put_str(name).put_u64(version);
        w.into_bytes()
    }

    /// Build and sign a removal.
    pub fn signed(name: impl Into<String>, version: u64, deployer: &KeyPair) -> Self {
        let name = name.into();
        let signature =
            deployer.sign_in_context(REMOVE_INTENT_CONTEXT, &Self::signing_payload(&name, version));
        Self {
            name,
            version,
            owner: deployer.public_key().into(),
            signature: signature.into(),
        }
    }

    /// Check the signature against `owner`.
    pub fn verify_signature(&self) -> Result<(), CryptoError> {
        self.owner.public_key()?.verify_in_context(
            REMOVE_INTENT_CONTEXT,
            &Self::signing_payload(&self.name, self.version),
            &self.signature.signature(),
        )
    }
}

/// A registry write, the payload of a log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Create or update a deployment.
    Deploy(DeployIntent),
    /// Remove a deployment.
    Remove(RemoveIntent),
    /// Replace the cluster configuration.
    Reconfigure(ClusterConfig),
}

/// Discriminant of [`Operation`] for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Deploy,
    Remove,
    Reconfigure,
}

impl OperationKind {
    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Remove => "remove",
            Self::Reconfigure => "reconfigure",
        }
    }
}

impl Operation {
    /// Operation kind.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Deploy(_) => OperationKind::Deploy,
            Self::Remove(_) => OperationKind::Remove,
            Self::Reconfigure(_) => OperationKind::Reconfigure,
        }
    }

    /// Name touched by the operation, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Deploy(d) => Some(&d.name),
            Self::Remove(r) => Some(&r.name),
            Self::Reconfigure(_) => None,
        }
    }
}

impl Canonical for Operation {
    fn encode(&self, w: &mut CanonicalWriter) {
        match self {
            Self::Deploy(d) => {
                w.put_tag(1)
                    .put_str(&d.name)
                    .put_fixed(&d.digest.0)
                    .put_u64(d.version)
                    .put_fixed(&d.owner.0)
                    .put_opt_str(d.description.as_deref())
                    .put_fixed(&d.signature.0);
            }
            Self::Remove(r) => {
                w.put_tag(2)
                    .put_str(&r.name)
                    .put_u64(r.version)
                    .put_fixed(&r.owner.0)
                    .put_fixed(&r.signature.0);
            }
            Self::Reconfigure(config) => {
                w.put_tag(3);
                config.encode(w);
            }
        }
    }
}

// =============================================================================
// LOG
// =============================================================================

/// A proposal attempt for one log index.
///
/// Ordered by round first; the proposer id breaks ties so two nodes can
/// never use the same ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ballot {
    pub round: u64,
    pub proposer: NodeId,
}

impl Ballot {
    /// Ballot `round` owned by `proposer`.
    pub fn new(round: u64, proposer: NodeId) -> Self {
        Self { round, proposer }
    }
}

impl fmt::Display for Ballot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.round, &self.proposer.to_hex()[..8])
    }
}

/// One position in the replicated log.
///
/// Immutable once committed; `index` is gap-free from zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub index: u64,
    pub round: u64,
    pub proposer: NodeId,
    /// Proposer wall clock (ms); the only time source `apply` ever sees.
    pub timestamp: u64,
    pub operation: Operation,
}

impl LogEntry {
    /// The ballot this entry was proposed under.
    pub fn ballot(&self) -> Ballot {
        Ballot::new(self.round, self.proposer)
    }

    /// Digest certified by voters.
    pub fn digest(&self) -> Digest {
        Digest(context_hash(LOG_ENTRY_CONTEXT, &self.canonical_bytes()))
    }
}

impl Canonical for LogEntry {
    fn encode(&self, w: &mut CanonicalWriter) {
        w.put_u64(self.index)
            .put_u64(self.round)
            .put_fixed(&self.proposer.0)
            .put_u64(self.timestamp);
        self.operation.encode(w);
    }
}

// =============================================================================
// CLUSTER
// =============================================================================

/// A cluster member and where to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: NodeId,
    /// Transport address (`host:port` for HTTP, a label for in-process).
    pub address: String,
}

impl Canonical for PeerInfo {
    fn encode(&self, w: &mut CanonicalWriter) {
        w.put_fixed(&self.id.0).put_str(&self.address);
    }
}

/// Versioned cluster membership.
///
/// Version 0 is the genesis configuration shared by every node out of band;
/// later versions are committed `Reconfigure` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub version: u64,
    pub peers: Vec<PeerInfo>,
    /// When set, only these identities may deploy.
    pub deployer_allowlist: Option<Vec<Identity>>,
}

impl ClusterConfig {
    /// Genesis configuration over `peers`.
    pub fn genesis(peers: Vec<PeerInfo>) -> Self {
        Self {
            version: 0,
            peers,
            deployer_allowlist: None,
        }
    }

    /// Number of members.
    pub fn member_count(&self) -> usize {
        self.peers.len()
    }

    /// Votes needed to commit: `floor(n/2) + 1`.
    pub fn quorum_size(&self) -> usize {
        self.peers.len() / 2 + 1
    }

    /// Whether `node` is a member.
    pub fn is_member(&self, node: &NodeId) -> bool {
        self.peers.iter().any(|p| &p.id == node)
    }

    /// Member record for `node`.
    pub fn peer(&self, node: &NodeId) -> Option<&PeerInfo> {
        self.peers.iter().find(|p| &p.id == node)
    }

    /// Whether `identity` may deploy under this configuration.
    pub fn allows_deployer(&self, identity: &Identity) -> bool {
        self.deployer_allowlist
            .as_ref()
            .map_or(true, |list| list.contains(identity))
    }

    /// Digest identifying this configuration.
    pub fn digest(&self) -> Digest {
        Digest(context_hash(CLUSTER_CONFIG_CONTEXT, &self.canonical_bytes()))
    }

    /// Structural checks independent of history.
    pub fn validate_shape(&self) -> Result<(), ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidConfig {
            reason: reason.to_string(),
        };
        if self.peers.is_empty() {
            return Err(invalid("no peers"));
        }
        let mut seen = HashSet::new();
        for peer in &self.peers {
            if !seen.insert(peer.id) {
                return Err(invalid("duplicate peer id"));
            }
            if peer.id.public_key().is_err() {
                return Err(invalid("peer id is not a valid public key"));
            }
        }
        Ok(())
    }
}

impl Canonical for ClusterConfig {
    fn encode(&self, w: &mut CanonicalWriter) {
        w.put_u64(self.version).put_seq(&self.peers);
        match &self.deployer_allowlist {
            Some(list) => {
                w.put_tag(1).put_u64(list.len() as u64);
                for identity in list {
                    w.put_fixed(&identity.0);
                }
            }
            None => {
                w.put_tag(0);
            }
        }
    }
}

/// Catch-up state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
    /// Lag suspected; not voting until caught up.
    Behind,
    /// Fetching certified entries up to `target`.
    Syncing { target: u64 },
    /// Local height matches the best known peer height.
    CaughtUp,
    /// Stopped after a log invariant violation.
    Halted,
}

impl SyncState {
    /// Whether the node may vote and propose.
    pub fn is_caught_up(&self) -> bool {
        matches!(self, Self::CaughtUp)
    }

    /// Stable lowercase label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Behind => "behind",
            Self::Syncing { .. } => "syncing",
            Self::CaughtUp => "caught_up",
            Self::Halted => "halted",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syncing { target } => write!(f, "syncing(target={target})"),
            other => f.write_str(other.label()),
        }
    }
}

/// What this node currently knows about a peer. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerView {
    pub id: NodeId,
    pub address: String,
    pub committed_height: u64,
    pub reachable: bool,
    /// Last successful contact (ms since epoch).
    pub last_seen: Option<u64>,
    pub consecutive_failures: u32,
}

impl PeerView {
    /// Fresh view of a configured member.
    pub fn new(info: &PeerInfo) -> Self {
        Self {
            id: info.id,
            address: info.address.clone(),
            committed_height: 0,
            reachable: false,
            last_seen: None,
            consecutive_failures: 0,
        }
    }
}
