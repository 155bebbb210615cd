//! # Cluster Properties
//!
//! | Property | Check |
//! |----------|-------|
//! | Agreement | equal height implies equal state bytes on every node |
//! | Deterministic replay | replaying any node's log from genesis gives its live state |
//! | Uniqueness | a name only moves to a strictly higher version by its owner |

#[cfg(test)]
mod tests {
    use crate::cluster::{deployer, TestCluster};
    use shared_types::{ContentDigest, DeployIntent, RemoveIntent, ValidationError};
    use wr_02_state_store::RegistryState;
    use wr_05_client_api::ClientError;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_agreement_and_deterministic_replay() {
        let mut cluster = TestCluster::new(3);
        cluster.start_all().await;

        let owner = deployer(1);
        for i in 0..6u8 {
            let client = cluster.node(usize::from(i) % 3).client();
            client
                .deploy(&format!("site-{}", i % 4), ContentDigest([i; 32]), None, &owner)
                .await
                .unwrap();
        }
        let height = cluster.wait_converged().await;
        assert_eq!(height, 6);

        let genesis = cluster.config_for(0).genesis.cluster_config();
        for node in cluster.running() {
            let entries = node.pipeline().entries(0..height).await;
            let replayed =
                RegistryState::replay(genesis.clone(), entries.iter().map(|c| &c.entry)).unwrap();
            assert_eq!(replayed.encode(), node.pipeline().encoded_state());
        }

        let logs: Vec<_> = futures::future::join_all(
            cluster
                .running()
                .into_iter()
                .map(|node| node.pipeline().entries(0..height)),
        )
        .await;
        assert!(logs.windows(2).all(|pair| pair[0] == pair[1]));

        cluster.stop_all().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_name_only_moves_to_higher_version_by_owner() {
        let mut cluster = TestCluster::new(3);
        cluster.start_all().await;

        let owner = deployer(1);
        let intruder = deployer(2);
        let first = DeployIntent::signed("blog", ContentDigest([1u8; 32]), 1, None, &owner);
        cluster
            .node(0)
            .client()
            .deploy_signed(first.into())
            .await
            .unwrap();
        cluster.wait_converged().await;

        let replay_v1 = DeployIntent::signed("blog", ContentDigest([2u8; 32]), 1, None, &owner);
        let err = cluster
            .node(1)
            .client()
            .deploy_signed(replay_v1.into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::NameConflict(ValidationError::StaleVersion { current: 1, .. })
        ));

        let hijack = DeployIntent::signed("blog", ContentDigest([3u8; 32]), 2, None, &intruder);
        let err = cluster
            .node(2)
            .client()
            .deploy_signed(hijack.into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::NameConflict(ValidationError::Unauthorized { .. })
        ));

        let upgrade = DeployIntent::signed("blog", ContentDigest([4u8; 32]), 2, None, &owner);
        cluster
            .node(2)
            .client()
            .deploy_signed(upgrade.into())
            .await
            .unwrap();
        cluster.wait_converged().await;
        let current = cluster.node(1).client().get("blog").unwrap().descriptor;
        assert_eq!(current.version, 2);
        assert_eq!(current.digest, ContentDigest([4u8; 32]));

        cluster.stop_all().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_removed_name_keeps_owner_and_version() {
        let mut cluster = TestCluster::new(3);
        cluster.start_all().await;

        let owner = deployer(1);
        cluster
            .node(0)
            .client()
            .deploy("shop", ContentDigest([1u8; 32]), None, &owner)
            .await
            .unwrap();
        cluster
            .node(1)
            .client()
            .remove(RemoveIntent::signed("shop", 2, &owner).into())
            .await
            .unwrap();
        cluster.wait_converged().await;

        for node in cluster.running() {
            assert!(matches!(
                node.client().get("shop"),
                Err(ClientError::NotFound { .. })
            ));
        }

        let err = cluster
            .node(2)
            .client()
            .deploy_signed(
                DeployIntent::signed("shop", ContentDigest([5u8; 32]), 3, None, &deployer(2))
                    .into(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NameConflict(_)));

        let receipt = cluster
            .node(2)
            .client()
            .deploy("shop", ContentDigest([6u8; 32]), None, &owner)
            .await
            .unwrap();
        assert_eq!(receipt.version, 3);

        cluster.stop_all().await;
    }
}
