//! Client errors and their JSON-RPC 2.0 encoding.

use serde::{Deserialize, Serialize};
use shared_types::ValidationError;
use thiserror::Error;

/// JSON-RPC error codes.
pub mod codes {
    // JSON-RPC 2.0 standard errors (-32700 to -32600)
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // Registry errors (-32000 to -32099)
    pub const NOT_FOUND: i32 = -32001;
    pub const UNAVAILABLE: i32 = -32002;
    pub const PROPOSAL_TIMEOUT: i32 = -32006;
    pub const NAME_CONFLICT: i32 = -32010;
    pub const BUNDLE_UNAVAILABLE: i32 = -32012;
}

/// Failures of client operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Not committed in time: no quorum within the round budget, or no
    /// local commit within the deploy timeout.
    #[error("Proposal for {name:?} not committed: {reason}")]
    ProposalTimeout { name: String, reason: String },

    /// Stale version or a name owned by someone else.
    #[error("Name conflict: {0}")]
    NameConflict(ValidationError),

    /// Malformed, badly signed, or not allow-listed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Bundle storage refused the digest.
    #[error("Bundle unavailable: {0}")]
    BundleUnavailable(String),

    /// Node cannot take writes (partition stall, halted, shutting down).
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// No live deployment under the name.
    #[error("Name {name:?} not found")]
    NotFound { name: String },
}

impl From<ValidationError> for ClientError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::StaleVersion { .. } | ValidationError::Unauthorized { .. } => {
                Self::NameConflict(err)
            }
            ValidationError::NotFound { name } => Self::NotFound { name },
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

impl ClientError {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ProposalTimeout { .. } => "timeout",
            Self::NameConflict(_) => "conflict",
            Self::InvalidRequest(_) => "invalid",
            Self::BundleUnavailable(_) => "bundle_unavailable",
            Self::Unavailable(_) => "unavailable",
            Self::NotFound { .. } => "not_found",
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct ApiError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Parse error - invalid JSON
    pub fn parse_error(details: impl Into<String>) -> Self {
        Self::new(codes::PARSE_ERROR, format!("Parse error: {}", details.into()))
    }

    /// Invalid request - not a valid JSON-RPC request
    pub fn invalid_request(details: impl Into<String>) -> Self {
        Self::new(
            codes::INVALID_REQUEST,
            format!("Invalid request: {}", details.into()),
        )
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::new(
            codes::INVALID_PARAMS,
            format!("Invalid params: {}", details.into()),
        )
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(
            codes::INTERNAL_ERROR,
            format!("Internal error: {}", details.into()),
        )
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        let code = match &err {
            ClientError::ProposalTimeout { .. } => codes::PROPOSAL_TIMEOUT,
            ClientError::NameConflict(_) => codes::NAME_CONFLICT,
            ClientError::InvalidRequest(_) => codes::INVALID_PARAMS,
            ClientError::BundleUnavailable(_) => codes::BUNDLE_UNAVAILABLE,
            ClientError::Unavailable(_) => codes::UNAVAILABLE,
            ClientError::NotFound { .. } => codes::NOT_FOUND,
        };
        let data = match &err {
            ClientError::NameConflict(ValidationError::StaleVersion { current, .. }) => {
                Some(serde_json::json!({ "current_version": current }))
            }
            _ => None,
        };
        Self {
            code,
            message: err.to_string(),
            data,
        }
    }
}
