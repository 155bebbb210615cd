//! # JSON-RPC Router
//!
//! `POST /` takes a JSON-RPC 2.0 request (or a batch) and dispatches
//! `registry_*` methods to the [`ClientService`]. `GET /health` returns the
//! node summary.
//!
//! | Method | Params | Result |
//! |--------|--------|--------|
//! | `registry_deploy` | `[DeployRequest]` | `DeployReceipt` |
//! | `registry_get` | `[name]` | `GetResponse` |
//! | `registry_remove` | `[RemoveRequest]` | `RemoveReceipt` |
//! | `registry_list` | `[owner?]` | `[Deployment]` |
//! | `registry_info` | - | `RegistryInfo` |

use crate::domain::{codes, ApiError, DeployRequest, RemoveRequest};
use crate::service::ClientService;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use registry_telemetry::metrics::CLIENT_REQUESTS;
use serde::Serialize;
use serde_json::{json, Value};
use shared_types::Identity;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    service: Arc<ClientService>,
}

/// HTTP router for the client API.
pub fn build_router(service: Arc<ClientService>) -> Router {
    let max_body = service.config().max_body_bytes;
    Router::new()
        .route("/", post(handle_json_rpc))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.info())
}

async fn handle_json_rpc(State(state): State<AppState>, body: String) -> impl IntoResponse {
    let request: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(error_response(Value::Null, ApiError::parse_error(e.to_string()))),
            );
        }
    };

    let response = match request {
        Value::Array(requests) if requests.is_empty() => {
            error_response(Value::Null, ApiError::invalid_request("empty batch"))
        }
        Value::Array(requests) => {
            let mut responses = Vec::with_capacity(requests.len());
            for req in &requests {
                responses.push(process_single_request(&state, req).await);
            }
            Value::Array(responses)
        }
        single => process_single_request(&state, &single).await,
    };

    (StatusCode::OK, Json(response))
}

async fn process_single_request(state: &AppState, request: &Value) -> Value {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    if !(id.is_string() || id.is_number()) {
        return error_response(
            Value::Null,
            ApiError::invalid_request("id must be a string or number"),
        );
    }
    if request.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return error_response(id, ApiError::invalid_request("jsonrpc must be \"2.0\""));
    }
    let Some(method) = request.get("method").and_then(Value::as_str) else {
        return error_response(id, ApiError::invalid_request("missing method"));
    };
    let params = request.get("params");

    let result = route_method(&state.service, method, params).await;
    let (label, outcome) = match &result {
        Ok(_) => (method, "ok"),
        Err(e) if e.code == codes::METHOD_NOT_FOUND => ("unknown", "error"),
        Err(_) => (method, "error"),
    };
    CLIENT_REQUESTS.with_label_values(&[label, outcome]).inc();

    match result {
        Ok(value) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": value
        }),
        Err(e) => {
            debug!(method, code = e.code, message = %e.message, "JSON-RPC call failed");
            error_response(id, e)
        }
    }
}

/// Dispatch one method.
async fn route_method(
    service: &ClientService,
    method: &str,
    params: Option<&Value>,
) -> Result<Value, ApiError> {
    match method {
        "registry_deploy" => {
            let request: DeployRequest = parse_param(params, 0)?;
            to_result(service.deploy_signed(request).await?)
        }
        "registry_get" => {
            let name: String = parse_param(params, 0)?;
            to_result(service.get(&name)?)
        }
        "registry_remove" => {
            let request: RemoveRequest = parse_param(params, 0)?;
            to_result(service.remove(request).await?)
        }
        "registry_list" => {
            let owner: Option<Identity> = parse_param_optional(params, 0)?;
            to_result(service.list(owner.as_ref()))
        }
        "registry_info" => to_result(service.info()),
        _ => Err(ApiError::method_not_found(method)),
    }
}

fn to_result<T: Serialize>(value: T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::internal(e.to_string()))
}

fn error_response(id: Value, error: ApiError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": error
    })
}

fn param_at(params: Option<&Value>, index: usize) -> Option<&Value> {
    params.and_then(|p| match p {
        Value::Array(items) => items.get(index),
        other if index == 0 => Some(other),
        _ => None,
    })
}

/// Parse a required parameter from JSON-RPC params array.
fn parse_param<T: serde::de::DeserializeOwned>(
    params: Option<&Value>,
    index: usize,
) -> Result<T, ApiError> {
    let param = param_at(params, index)
        .ok_or_else(|| ApiError::invalid_params(format!("missing parameter at index {index}")))?;
    serde_json::from_value(param.clone())
        .map_err(|e| ApiError::invalid_params(format!("parameter {index}: {e}")))
}

/// Parse an optional parameter; absent or `null` is `None`.
fn parse_param_optional<T: serde::de::DeserializeOwned>(
    params: Option<&Value>,
    index: usize,
) -> Result<Option<T>, ApiError> {
    match param_at(params, index) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| ApiError::invalid_params(format!("parameter {index}: {e}"))),
    }
}
