//! # HTTP Surfaces Across Nodes
//!
//! Client JSON-RPC and peer routes driven with `tower::ServiceExt::oneshot`
//! against nodes of a running in-process cluster.

#[cfg(test)]
mod tests {
    use crate::cluster::{deployer, TestCluster};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use node_runtime::peer_router;
    use serde_json::{json, Value};
    use shared_types::{ContentDigest, DeployIntent, HealthResponse, SyncState};
    use tower::ServiceExt;
    use wr_05_client_api::{build_router, DeployRequest};

    async fn call(router: Router, body: Value) -> Value {
        let request = Request::post("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn rpc(id: u64, method: &str, params: Value) -> Value {
        json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_deploy_on_one_node_is_readable_on_another() {
        let mut cluster = TestCluster::new(3);
        cluster.start_all().await;
        let key = deployer(1);
        let intent = DeployIntent::signed("portfolio", ContentDigest([9; 32]), 1, None, &key);

        let deployed = call(
            build_router(cluster.node(0).client()),
            rpc(1, "registry_deploy", json!([DeployRequest::from(intent)])),
        )
        .await;
        assert_eq!(deployed["result"]["version"], 1);
        assert_eq!(deployed["result"]["index"], 0);

        cluster.wait_height(1, 1).await;
        let got = call(
            build_router(cluster.node(1).client()),
            rpc(2, "registry_get", json!(["portfolio"])),
        )
        .await;
        assert_eq!(got["result"]["descriptor"]["name"], "portfolio");
        assert_eq!(got["result"]["descriptor"]["digest"], json!(ContentDigest([9; 32])));
        assert_eq!(got["result"]["as_of_height"], 1);

        let info = call(
            build_router(cluster.node(2).client()),
            json!({ "jsonrpc": "2.0", "id": 3, "method": "registry_info" }),
        )
        .await;
        assert_eq!(info["result"]["members"], 3);

        cluster.stop_all().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_peer_health_route_reports_genesis() {
        let mut cluster = TestCluster::new(3);
        cluster.start_all().await;

        let node = cluster.node(1).clone();
        let response = peer_router(node.clone())
            .oneshot(Request::get("/peer/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(health.node_id, node.node_id());
        assert_eq!(health.state, SyncState::CaughtUp);
        assert_eq!(health.genesis_hash, node.pipeline().genesis_hash());

        cluster.stop(1).await;
        let response = peer_router(node)
            .oneshot(Request::get("/peer/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        cluster.stop_all().await;
    }
}
