//! # Cluster Scenarios
//!
//! - three members, deploys entered through different nodes
//! - a fourth genesis member that starts late and catches up

#[cfg(test)]
mod tests {
    use crate::cluster::{deployer, TestCluster};
    use futures::future::join_all;
    use shared_types::{ContentDigest, SyncState};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_three_nodes_serve_identical_descriptors() {
        let mut cluster = TestCluster::new(3);
        cluster.start_all().await;

        let owner = deployer(1);
        for (i, name) in ["a", "b", "c"].into_iter().enumerate() {
            let receipt = cluster
                .node(i)
                .client()
                .deploy(name, ContentDigest([i as u8 + 1; 32]), None, &owner)
                .await
                .unwrap();
            assert_eq!(receipt.version, 1);
            assert_eq!(receipt.index, i as u64);
        }

        assert_eq!(cluster.wait_converged().await, 3);
        for name in ["a", "b", "c"] {
            let reference = cluster.node(0).client().get(name).unwrap().descriptor;
            for node in cluster.running() {
                assert_eq!(node.client().get(name).unwrap().descriptor, reference);
            }
        }

        cluster.stop_all().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deploys_through_every_node() {
        let mut cluster = TestCluster::new(3);
        cluster.start_all().await;

        let results = join_all((0..3).map(|i| {
            let client = cluster.node(i).client();
            async move {
                client
                    .deploy(&format!("site-{i}"), ContentDigest([9u8; 32]), None, &deployer(2))
                    .await
            }
        }))
        .await;

        let mut indexes: Vec<u64> = results.into_iter().map(|r| r.unwrap().index).collect();
        indexes.sort_unstable();
        assert_eq!(indexes, vec![0, 1, 2]);

        assert_eq!(cluster.wait_converged().await, 3);
        assert_eq!(cluster.node(2).client().list(None).len(), 3);
        cluster.stop_all().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_late_member_catches_up_within_bound() {
        let mut cluster = TestCluster::with_config(4, |config| {
            config.catch_up.batch_size = 4;
        });
        cluster.start_first(3).await;

        let owner = deployer(3);
        for i in 0..10u8 {
            cluster
                .node(usize::from(i % 3))
                .client()
                .deploy(&format!("site-{i}"), ContentDigest([i; 32]), None, &owner)
                .await
                .unwrap();
        }
        cluster.wait_height(0, 10).await;

        let late = cluster.launch(3);
        let rounds = late.catch_up().run_until_caught_up().await.unwrap();
        assert!(rounds <= late.config().catch_up.max_sync_rounds);
        assert!(late.pipeline().height() >= 10);
        assert_eq!(late.catch_up().state(), SyncState::CaughtUp);

        cluster.wait_converged().await;
        let reference = cluster.node(0).pipeline().encoded_state();
        assert_eq!(late.pipeline().encoded_state(), reference);

        late.client()
            .deploy("after-join", ContentDigest([42u8; 32]), None, &owner)
            .await
            .unwrap();
        assert_eq!(cluster.wait_converged().await, 11);

        cluster.stop_all().await;
    }
}
