//! # Fault Scenarios
//!
//! - a partitioned minority stops accepting writes, then recovers
//! - a stopped node reopens from its log and snapshots, then catches up
//! - a halted node refuses writes and reports `Halted` to peers

#[cfg(test)]
mod tests {
    use crate::cluster::{deployer, node_id, TestCluster};
    use shared_types::{ContentDigest, PeerRpc, SyncState};
    use std::time::Duration;
    use wr_05_client_api::ClientError;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_partitioned_minority_stalls_then_recovers() {
        let mut cluster = TestCluster::with_config(3, |config| {
            config.client.deploy_timeout_ms = 1_500;
        });
        cluster.start_all().await;
        let owner = deployer(1);

        cluster.network().isolate(node_id(2));

        cluster
            .node(0)
            .client()
            .deploy("majority", ContentDigest([1u8; 32]), None, &owner)
            .await
            .unwrap();

        let err = cluster
            .node(2)
            .client()
            .deploy("minority", ContentDigest([2u8; 32]), None, &owner)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Unavailable(_) | ClientError::ProposalTimeout { .. }
        ));
        assert!(cluster.node(2).client().get("majority").is_err());

        cluster.network().heal_all();
        cluster.wait_caught_up(2).await;
        cluster.wait_converged().await;
        assert!(cluster.node(2).client().get("majority").is_ok());

        cluster
            .node(2)
            .client()
            .deploy("healed", ContentDigest([3u8; 32]), None, &owner)
            .await
            .unwrap();
        cluster.wait_converged().await;
        assert!(cluster.node(0).client().get("healed").is_ok());

        cluster.stop_all().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_restarted_node_replays_and_catches_up() {
        let mut cluster = TestCluster::with_config(3, |config| {
            config.storage.snapshot_interval = 2;
        })
        .persistent();
        cluster.start_all().await;
        let owner = deployer(1);

        for i in 0..3u8 {
            cluster
                .node(0)
                .client()
                .deploy(&format!("early-{i}"), ContentDigest([i; 32]), None, &owner)
                .await
                .unwrap();
        }
        cluster.wait_converged().await;

        cluster.stop(1).await;
        for i in 0..2u8 {
            cluster
                .node(0)
                .client()
                .deploy(&format!("late-{i}"), ContentDigest([i; 32]), None, &owner)
                .await
                .unwrap();
        }

        let reopened = cluster.launch(1);
        assert!(reopened.pipeline().height() >= 3);
        assert!(reopened.client().get("early-2").is_ok());

        cluster.wait_caught_up(1).await;
        assert_eq!(cluster.wait_converged().await, 5);
        assert!(reopened.client().get("late-1").is_ok());

        cluster.stop_all().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_halted_node_refuses_writes_but_serves_reads() {
        let mut cluster = TestCluster::new(3);
        cluster.start_all().await;
        let owner = deployer(1);

        cluster
            .node(0)
            .client()
            .deploy("steady", ContentDigest([1u8; 32]), None, &owner)
            .await
            .unwrap();
        cluster.wait_converged().await;

        let halted = cluster.node(2).clone();
        halted.pipeline().halt("injected invariant violation");

        let mut states = halted.catch_up().subscribe();
        tokio::time::timeout(
            Duration::from_secs(2),
            states.wait_for(|s| *s == SyncState::Halted),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(halted.health().await.unwrap().state, SyncState::Halted);
        assert!(matches!(
            halted
                .client()
                .deploy("refused", ContentDigest([2u8; 32]), None, &owner)
                .await,
            Err(ClientError::Unavailable(_))
        ));
        assert!(halted.client().get("steady").is_ok());

        cluster
            .node(0)
            .client()
            .deploy("without-halted", ContentDigest([3u8; 32]), None, &owner)
            .await
            .unwrap();
        cluster.wait_height(1, 2).await;
        assert_eq!(halted.pipeline().height(), 1);

        cluster.stop_all().await;
    }
}
