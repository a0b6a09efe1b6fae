//! # Two-Node Replication
//!
//! The full daemon wired twice on loopback: node A stores a file and
//! pushes its manifest to node B; B's synchronizer repairs the missing
//! blocks from A; afterwards B serves the same bytes purely from its own
//! local tiers.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use bm_block_store::Scope;
    use node_runtime::{NodeConfig, NodeRuntime};

    fn node_config(dir: &TempDir, peer_addresses: Vec<String>) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.node.data_dir = dir.path().to_path_buf();
        config.node.host = "127.0.0.1".into();
        config.node.port = 0;
        config.peers.addresses = peer_addresses;
        // Park the background timers out of the way; the tests drive scan
        // and repair ticks themselves.
        config.sync.scan_interval_secs = 3600;
        config.sync.repair_interval_secs = 3600;
        config
    }

    fn payload_of(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn wait_until(what: &str, mut probe: impl FnMut() -> bool) {
        for _ in 0..500 {
            if probe() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for: {what}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_store_on_a_replicates_to_b() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();

        let node_a = NodeRuntime::start(node_config(&dir_a, vec![])).await.unwrap();
        let node_b = NodeRuntime::start(node_config(
            &dir_b,
            vec![node_a.descriptor().address()],
        ))
        .await
        .unwrap();

        // Discovery connects B→A; A's loop-back registration connects A→B.
        let a_id = node_a.descriptor().id;
        let b_id = node_b.descriptor().id;
        wait_until("B connected to A", || {
            node_b.directory().already_connected(a_id)
        })
        .await;
        wait_until("A connected back to B", || {
            node_a.directory().already_connected(b_id)
        })
        .await;

        // A stores a file; the manifest fans out to B.
        let payload = payload_of(5000);
        let manifest = node_a
            .filesystem()
            .store(r"\\server\f.bin", &payload)
            .unwrap();
        let version = manifest.current_version().unwrap().clone();
        assert_eq!(version.blocks.len(), 5);

        let fs_b = node_b.filesystem().clone();
        wait_until("manifest pushed to B", || {
            fs_b.read_all_manifests().map(|m| m.len()).unwrap_or(0) == 1
        })
        .await;

        // B's reconciliation pulls every referenced block from A.
        node_b.synchronizer().scan_once();
        assert_eq!(node_b.synchronizer().pending_repairs(), 5);
        for _ in 0..5 {
            assert!(node_b.synchronizer().repair_once().await);
        }
        assert_eq!(node_b.synchronizer().pending_repairs(), 0);

        let stored_b = node_b.filesystem().stored_block_identifiers();
        for id in &version.blocks {
            assert!(stored_b.contains(id));
        }

        // Sever the peering; B now serves the bytes without contacting A.
        node_b.directory().remove_peer(a_id);
        wait_until("A's source removed from B", || {
            !node_b.directory().already_connected(a_id)
        })
        .await;

        for &id in &version.blocks {
            let found = node_b
                .filesystem()
                .storage_manager()
                .get_block(id, Scope::LocalOnly)
                .await
                .unwrap();
            assert!(found.is_some(), "block {id} not local on B");
        }
        let retrieved = node_b.filesystem().retrieve(r"\\server\f.bin").await.unwrap();
        assert_eq!(retrieved, Some(payload));

        node_a.shutdown();
        node_b.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unreachable_known_peer_is_skipped() {
        let dir = TempDir::new().unwrap();
        // Nothing listens on this port; discovery logs and moves on.
        let node = NodeRuntime::start(node_config(&dir, vec!["127.0.0.1:1".into()]))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(node.directory().connected_peers().is_empty());

        // The node itself stays fully functional.
        let payload = payload_of(100);
        node.filesystem().store(r"\\server\f.bin", &payload).unwrap();
        assert_eq!(
            node.filesystem().retrieve(r"\\server\f.bin").await.unwrap(),
            Some(payload)
        );
        node.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_block_missing_everywhere_stays_queued() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();

        let node_a = NodeRuntime::start(node_config(&dir_a, vec![])).await.unwrap();
        let node_b = NodeRuntime::start(node_config(
            &dir_b,
            vec![node_a.descriptor().address()],
        ))
        .await
        .unwrap();

        let a_id = node_a.descriptor().id;
        wait_until("B connected to A", || {
            node_b.directory().already_connected(a_id)
        })
        .await;

        // A stores a file, then loses one block before B repairs.
        let manifest = node_a
            .filesystem()
            .store(r"\\server\f.bin", &payload_of(2048))
            .unwrap();
        let version = manifest.current_version().unwrap().clone();
        let lost = version.blocks[0];
        node_a
            .filesystem()
            .storage_manager()
            .delete_block(lost)
            .unwrap();

        let fs_b = node_b.filesystem().clone();
        wait_until("manifest pushed to B", || {
            fs_b.read_all_manifests().map(|m| m.len()).unwrap_or(0) == 1
        })
        .await;

        node_b.synchronizer().scan_once();
        for _ in 0..4 {
            node_b.synchronizer().repair_once().await;
        }

        // The obtainable block arrived; the lost one is still pending.
        let stored_b = node_b.filesystem().stored_block_identifiers();
        assert!(stored_b.contains(&version.blocks[1]));
        assert!(!stored_b.contains(&lost));
        assert_eq!(node_b.synchronizer().pending_snapshot(), vec![lost]);

        node_a.shutdown();
        node_b.shutdown();
    }
}
