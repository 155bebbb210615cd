//! # HTTP Peer Transport
//!
//! Peer RPC as JSON over HTTP. The server side wraps any [`PeerRpc`] (the
//! node itself) in an axum router; the client side implements [`PeerRpc`]
//! with reqwest.
//!
//! | Route | Body | Reply |
//! |-------|------|-------|
//! | `POST /peer/prepare` | `PrepareRequest` | `Promise` |
//! | `POST /peer/propose` | `ProposeRequest` | `Vote` |
//! | `POST /peer/commit` | `CommitRequest` | `CommitAck` |
//! | `POST /peer/fetch` | `FetchEntriesRequest` | `FetchEntriesResponse` |
//! | `GET /peer/health` | - | `HealthResponse` |
//!
//! Transport failures on the server travel back as `503` with the error
//! text as body.

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{
    CommitAck, CommitRequest, FetchEntriesRequest, FetchEntriesResponse, HealthResponse, NodeId,
    PeerRpc, PrepareRequest, Promise, ProposeRequest, TransportError, Vote,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::debug;
use wr_02_state_store::RegistryQueries;
use wr_03_consensus::PeerDirectory;

type SharedRpc = Arc<dyn PeerRpc>;

/// Router serving the peer protocol for `rpc`.
pub fn peer_router(rpc: SharedRpc) -> Router {
    Router::new()
        .route("/peer/prepare", post(prepare))
        .route("/peer/propose", post(propose))
        .route("/peer/commit", post(commit))
        .route("/peer/fetch", post(fetch))
        .route("/peer/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(rpc)
}

/// Server-side transport error.
struct PeerFailure(TransportError);

impl IntoResponse for PeerFailure {
    fn into_response(self) -> Response {
        (StatusCode::SERVICE_UNAVAILABLE, self.0.to_string()).into_response()
    }
}

type PeerReply<T> = Result<Json<T>, PeerFailure>;

async fn prepare(State(rpc): State<SharedRpc>, Json(request): Json<PrepareRequest>) -> PeerReply<Promise> {
    rpc.prepare(request).await.map(Json).map_err(PeerFailure)
}

async fn propose(State(rpc): State<SharedRpc>, Json(request): Json<ProposeRequest>) -> PeerReply<Vote> {
    rpc.propose(request).await.map(Json).map_err(PeerFailure)
}

async fn commit(State(rpc): State<SharedRpc>, Json(request): Json<CommitRequest>) -> PeerReply<CommitAck> {
    rpc.commit(request).await.map(Json).map_err(PeerFailure)
}

async fn fetch(
    State(rpc): State<SharedRpc>,
    Json(request): Json<FetchEntriesRequest>,
) -> PeerReply<FetchEntriesResponse> {
    rpc.fetch_entries(request).await.map(Json).map_err(PeerFailure)
}

async fn health(State(rpc): State<SharedRpc>) -> PeerReply<HealthResponse> {
    rpc.health().await.map(Json).map_err(PeerFailure)
}

/// reqwest client for one peer.
pub struct HttpPeerClient {
    node: NodeId,
    base_url: String,
    client: Client,
}

impl HttpPeerClient {
    pub fn new(node: NodeId, base_url: impl Into<String>, client: Client) -> Self {
        Self {
            node,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn classify(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.node)
        } else if error.is_connect() {
            TransportError::Unreachable(self.node)
        } else if error.is_decode() {
            TransportError::Codec(error.to_string())
        } else {
            TransportError::Remote(error.to_string())
        }
    }

    async fn decode<R: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<R, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Remote(format!("{status}: {body}")));
        }
        response
            .json::<R>()
            .await
            .map_err(|e| TransportError::Codec(e.to_string()))
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, TransportError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        self.decode(response).await
    }
}

#[async_trait]
impl PeerRpc for HttpPeerClient {
    async fn prepare(&self, request: PrepareRequest) -> Result<Promise, TransportError> {
        self.post("/peer/prepare", &request).await
    }

    async fn propose(&self, request: ProposeRequest) -> Result<Vote, TransportError> {
        self.post("/peer/propose", &request).await
    }

    async fn commit(&self, request: CommitRequest) -> Result<CommitAck, TransportError> {
        self.post("/peer/commit", &request).await
    }

    async fn fetch_entries(
        &self,
        request: FetchEntriesRequest,
    ) -> Result<FetchEntriesResponse, TransportError> {
        self.post("/peer/fetch", &request).await
    }

    async fn health(&self) -> Result<HealthResponse, TransportError> {
        let response = self
            .client
            .get(format!("{}/peer/health", self.base_url))
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        self.decode(response).await
    }
}

/// Directory resolving member addresses from the configuration in force.
pub struct HttpDirectory {
    registry: Arc<dyn RegistryQueries>,
    client: Client,
    clients: Mutex<HashMap<NodeId, (String, Arc<HttpPeerClient>)>>,
}

impl HttpDirectory {
    pub fn new(
        registry: Arc<dyn RegistryQueries>,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Remote(e.to_string()))?;
        Ok(Self {
            registry,
            client,
            clients: Mutex::new(HashMap::new()),
        })
    }
}

impl PeerDirectory for HttpDirectory {
    fn peer(&self, node: &NodeId) -> Option<Arc<dyn PeerRpc>> {
        let address = self.registry.cluster_config().peer(node)?.address.clone();
        let mut clients = self.clients.lock();
        if let Some((known, client)) = clients.get(node) {
            if *known == address {
                return Some(client.clone());
            }
        }
        debug!(peer = %node, %address, "Peer client created");
        let client = Arc::new(HttpPeerClient::new(*node, address.clone(), self.client.clone()));
        clients.insert(*node, (address, client.clone()));
        Some(client)
    }
}
