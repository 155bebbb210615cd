//! Prometheus metrics for registry nodes.
//!
//! Naming convention: `wr_<area>_<metric>_<unit>`.
//!
//! Subsystem crates that export their own metrics (behind a `metrics`
//! feature) register on the prometheus default registry; [`encode_metrics`]
//! merges both registries.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Node-wide metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // COMMIT PIPELINE
    // =========================================================================

    /// Entries appended and applied, by operation kind
    pub static ref COMMITS_APPLIED: IntCounterVec = IntCounterVec::new(
        Opts::new("wr_commits_applied_total", "Committed entries applied to the registry"),
        &["kind"]
    ).expect("metric creation failed");

    /// Committed entries that failed validation on apply
    pub static ref APPLY_REJECTIONS: IntCounter = IntCounter::new(
        "wr_commits_rejected_on_apply_total",
        "Committed entries that left the registry unchanged"
    ).expect("metric creation failed");

    /// Local committed height
    pub static ref COMMITTED_HEIGHT: IntGauge = IntGauge::new(
        "wr_log_committed_height",
        "Number of committed log entries"
    ).expect("metric creation failed");

    /// Entries waiting in the commit buffer for a missing predecessor
    pub static ref BUFFERED_ENTRIES: IntGauge = IntGauge::new(
        "wr_commit_buffer_entries",
        "Certified entries buffered out of order"
    ).expect("metric creation failed");

    /// 1 once the node halted on an invariant violation
    pub static ref NODE_HALTED: IntGauge = IntGauge::new(
        "wr_node_halted",
        "Set to 1 after a log invariant violation"
    ).expect("metric creation failed");

    // =========================================================================
    // CATCH-UP
    // =========================================================================

    /// Catch-up batches by outcome (applied, rejected, empty, unreachable)
    pub static ref CATCH_UP_BATCHES: IntCounterVec = IntCounterVec::new(
        Opts::new("wr_catch_up_batches_total", "Catch-up fetch attempts"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Sync state as a number: 0 behind, 1 syncing, 2 caught up, 3 halted
    pub static ref SYNC_STATE: IntGauge = IntGauge::new(
        "wr_sync_state",
        "Catch-up state machine position"
    ).expect("metric creation failed");

    // =========================================================================
    // PEERS
    // =========================================================================

    /// Members answering health probes
    pub static ref PEERS_REACHABLE: IntGauge = IntGauge::new(
        "wr_peers_reachable",
        "Cluster members that answered the last health probe"
    ).expect("metric creation failed");

    /// Peer reachability flips seen by the health probe, by direction
    pub static ref PEER_TRANSITIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("wr_peer_transitions_total", "Peers becoming reachable or unreachable"),
        &["reachable"]
    ).expect("metric creation failed");

    // =========================================================================
    // NODE EVENTS
    // =========================================================================

    /// Sync state transitions, by target state
    pub static ref SYNC_TRANSITIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("wr_sync_transitions_total", "Catch-up state machine transitions"),
        &["to"]
    ).expect("metric creation failed");

    /// Proposal rounds given up and retried
    pub static ref ROUNDS_ABANDONED: IntCounter = IntCounter::new(
        "wr_consensus_rounds_abandoned_total",
        "Proposal rounds abandoned without a quorum"
    ).expect("metric creation failed");

    /// Membership changes applied
    pub static ref CONFIG_CHANGES: IntCounter = IntCounter::new(
        "wr_config_changes_total",
        "Committed reconfigurations"
    ).expect("metric creation failed");

    // =========================================================================
    // CLIENT
    // =========================================================================

    /// Client calls by method and outcome
    pub static ref CLIENT_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("wr_client_requests_total", "Client API calls"),
        &["method", "outcome"]
    ).expect("metric creation failed");

    /// Deploy latency from submission to local visibility
    pub static ref DEPLOY_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "wr_client_deploy_duration_seconds",
            "Time from deploy submission until the local registry reflects it"
        ).buckets(exponential_buckets(0.001, 2.0, 14).unwrap_or_default())
    ).expect("metric creation failed");
}

/// Proof that metrics were registered.
pub struct MetricsHandle {
    _private: (),
}

/// Register all node metrics with [`REGISTRY`].
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(COMMITS_APPLIED.clone()),
        Box::new(APPLY_REJECTIONS.clone()),
        Box::new(COMMITTED_HEIGHT.clone()),
        Box::new(BUFFERED_ENTRIES.clone()),
        Box::new(NODE_HALTED.clone()),
        Box::new(CATCH_UP_BATCHES.clone()),
        Box::new(SYNC_STATE.clone()),
        Box::new(PEERS_REACHABLE.clone()),
        Box::new(PEER_TRANSITIONS.clone()),
        Box::new(SYNC_TRANSITIONS.clone()),
        Box::new(ROUNDS_ABANDONED.clone()),
        Box::new(CONFIG_CHANGES.clone()),
        Box::new(CLIENT_REQUESTS.clone()),
        Box::new(DEPLOY_DURATION.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { _private: () })
}

/// Node and subsystem metrics in Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let mut families = REGISTRY.gather();
    families.extend(prometheus::gather());

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
