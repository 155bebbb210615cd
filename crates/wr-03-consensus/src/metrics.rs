//! # Consensus Metrics
//!
//! Enable with the `metrics` feature:
//! ```toml
//! wr-03-consensus = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `wr_consensus_rounds_total{outcome}` - rounds by outcome
//! - `wr_consensus_votes_total{decision}` - votes cast by this node
//! - `wr_consensus_commits_received_total` - commit announcements handled
//! - `wr_consensus_proposal_latency_seconds` - submission to commit

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Rounds by outcome (committed, adopted, rejected, behind, abandoned)
    pub static ref ROUNDS: IntCounterVec = register_int_counter_vec!(
        "wr_consensus_rounds_total",
        "Proposal rounds driven by this node",
        &["outcome"]
    )
    .expect("Failed to create ROUNDS metric");

    /// Votes this node cast, labeled accept or reject
    pub static ref VOTES: IntCounterVec = register_int_counter_vec!(
        "wr_consensus_votes_total",
        "Propose requests answered",
        &["decision"]
    )
    .expect("Failed to create VOTES metric");

    /// Commit announcements received from peers
    pub static ref COMMITS_RECEIVED: IntCounter = register_int_counter!(
        "wr_consensus_commits_received_total",
        "Commit announcements handled"
    )
    .expect("Failed to create COMMITS_RECEIVED metric");

    /// Time from dequeue to commit of an operation
    pub static ref PROPOSAL_LATENCY: Histogram = register_histogram!(
        "wr_consensus_proposal_latency_seconds",
        "Time to commit a proposed operation",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to create PROPOSAL_LATENCY metric");
}

/// Record a finished round
#[cfg(feature = "metrics")]
pub fn record_round(outcome: &str) {
    ROUNDS.with_label_values(&[outcome]).inc();
}

/// Record a vote
#[cfg(feature = "metrics")]
pub fn record_vote(accepted: bool) {
    VOTES
        .with_label_values(&[if accepted { "accept" } else { "reject" }])
        .inc();
}

/// Record a commit announcement
#[cfg(feature = "metrics")]
pub fn record_commit_received() {
    COMMITS_RECEIVED.inc();
}

/// Record proposal latency
#[cfg(feature = "metrics")]
pub fn record_proposal_latency(seconds: f64) {
    PROPOSAL_LATENCY.observe(seconds);
}

// No-op implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub fn record_round(_outcome: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_vote(_accepted: bool) {}

#[cfg(not(feature = "metrics"))]
pub fn record_commit_received() {}

#[cfg(not(feature = "metrics"))]
pub fn record_proposal_latency(_seconds: f64) {}
