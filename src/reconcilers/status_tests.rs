// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{
        ClusterPhase, StorageOSCluster, StorageOSClusterSpec, StorageOSClusterStatus,
    };
    use crate::reconcilers::status::{patch_status_if_changed, status_changed};
    use crate::testing::MemoryClient;

    fn cluster() -> StorageOSCluster {
        let mut cluster = StorageOSCluster::new("example", StorageOSClusterSpec::default());
        cluster.metadata.namespace = Some("default".to_string());
        cluster
    }

    fn running() -> StorageOSClusterStatus {
        StorageOSClusterStatus {
            phase: ClusterPhase::Running,
            ready: Some("1/1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_status_changed() {
        assert!(!status_changed::<StorageOSClusterStatus>(None, &Default::default()));
        assert!(status_changed(None, &running()));
        assert!(!status_changed(Some(&running()), &running()));
        assert!(status_changed(
            Some(&StorageOSClusterStatus::default()),
            &running()
        ));
    }

    #[tokio::test]
    async fn test_equal_status_is_not_written() {
        let client = MemoryClient::new();
        let mut stored = cluster();
        stored.status = Some(running());
        client.insert(&stored);

        let patched = patch_status_if_changed(&client, &stored, stored.status.as_ref(), &running())
            .await
            .unwrap();
        assert!(!patched);
        assert!(client.calls_with("patch_status").is_empty());
    }

    #[tokio::test]
    async fn test_changed_status_is_written() {
        let client = MemoryClient::new();
        let stored = cluster();
        client.insert(&stored);

        let patched = patch_status_if_changed(&client, &stored, None, &running())
            .await
            .unwrap();
        assert!(patched);

        let read: StorageOSCluster = client.read(Some("default"), "example").unwrap();
        assert_eq!(read.status, Some(running()));
    }
}
