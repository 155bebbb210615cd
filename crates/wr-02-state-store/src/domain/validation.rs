//! # Admission Rules
//!
//! Deterministic checks run by every voter before accepting a proposal and
//! again by `apply`. The outcome depends only on the operation and the
//! state at the current height.
//!
//! | Operation | Rules |
//! |-----------|-------|
//! | Deploy | name syntax, description size, signature, allow-list, owner, version > current |
//! | Remove | name syntax, signature, live deployment, owner, version > current |
//! | Reconfigure | peer set shape, version == current + 1 |

use super::registry::{NameRecord, RegistryState};
use shared_types::{
    validate_description, validate_name, ClusterConfig, DeployIntent, NodeId, Operation,
    RemoveIntent, ValidationError,
};

/// Check `operation` against `state`.
pub fn validate_operation(state: &RegistryState, operation: &Operation) -> Result<(), ValidationError> {
    match operation {
        Operation::Deploy(intent) => validate_deploy(state, intent),
        Operation::Remove(intent) => validate_remove(state, intent),
        Operation::Reconfigure(config) => validate_reconfigure(state, config),
    }
}

/// Check `operation` as proposed by `proposer`.
///
/// Membership changes may only come from a current member.
pub fn validate_proposal(
    state: &RegistryState,
    operation: &Operation,
    proposer: &NodeId,
) -> Result<(), ValidationError> {
    if matches!(operation, Operation::Reconfigure(_)) && !state.config().is_member(proposer) {
        return Err(ValidationError::NotAMember { node: *proposer });
    }
    validate_operation(state, operation)
}

fn validate_deploy(state: &RegistryState, intent: &DeployIntent) -> Result<(), ValidationError> {
    validate_name(&intent.name)?;
    validate_description(intent.description.as_deref())?;
    intent
        .verify_signature()
        .map_err(|_| ValidationError::InvalidSignature)?;

    if !state.config().allows_deployer(&intent.owner) {
        return Err(ValidationError::NotAllowlisted {
            identity: intent.owner,
        });
    }

    if let Some(record) = state.record(&intent.name) {
        check_owner_and_version(&intent.name, record, &intent.owner, intent.version)?;
    } else if intent.version == 0 {
        return Err(ValidationError::StaleVersion {
            name: intent.name.clone(),
            current: 0,
            proposed: 0,
        });
    }
    Ok(())
}

fn validate_remove(state: &RegistryState, intent: &RemoveIntent) -> Result<(), ValidationError> {
    validate_name(&intent.name)?;
    intent
        .verify_signature()
        .map_err(|_| ValidationError::InvalidSignature)?;

    match state.record(&intent.name) {
        Some(record @ NameRecord::Live(_)) => {
            check_owner_and_version(&intent.name, record, &intent.owner, intent.version)
        }
        _ => Err(ValidationError::NotFound {
            name: intent.name.clone(),
        }),
    }
}

fn validate_reconfigure(state: &RegistryState, config: &ClusterConfig) -> Result<(), ValidationError> {
    config.validate_shape()?;
    let expected = state.config().version + 1;
    if config.version != expected {
        return Err(ValidationError::InvalidConfig {
            reason: format!("version {} must be {expected}", config.version),
        });
    }
    Ok(())
}

fn check_owner_and_version(
    name: &str,
    record: &NameRecord,
    claimant: &shared_types::Identity,
    version: u64,
) -> Result<(), ValidationError> {
    if record.owner() != claimant {
        return Err(ValidationError::Unauthorized {
            name: name.to_string(),
            owner: *record.owner(),
        });
    }
    if version <= record.version() {
        return Err(ValidationError::StaleVersion {
            name: name.to_string(),
            current: record.version(),
            proposed: version,
        });
    }
    Ok(())
}
