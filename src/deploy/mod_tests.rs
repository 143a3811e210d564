// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `deploy/mod.rs`

#[cfg(test)]
mod tests {
    use crate::capabilities::Capabilities;
    use crate::constants::{
        API_MANAGER_METRICS_NAME, API_MANAGER_NAME, CSI_DRIVER_NAME, CSI_HELPER_DEPLOYMENT_NAME,
        CSI_HELPER_STATEFULSET_NAME, CSI_PROVISION_SECRET_NAME, DAEMONSET_NAME,
        FENCING_CLUSTER_BINDING, INIT_SECRET_NAME, MUTATING_WEBHOOK_CONFIG_NAME,
        NODE_CONFIGMAP_NAME, OPENSHIFT_SCC_CLUSTER_BINDING, SCHEDULER_NAME,
        SECRET_API_ADDRESS_KEY, SECRET_API_PASSWORD_KEY, SECRET_API_USERNAME_KEY,
        SECRET_USERNAME_KEY, TLS_ETCD_SECRET_NAME,
    };
    use crate::crd::{StorageOSCluster, StorageOSClusterSpec};
    use crate::deploy::api_manager::ServiceMonitor;
    use crate::deploy::StorageOSDeployment;
    use crate::errors::Error;
    use crate::testing::{Failure, MemoryClient, Verb};
    use k8s_openapi::api::admissionregistration::v1::MutatingWebhookConfiguration;
    use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
    use k8s_openapi::api::core::v1::{
        ConfigMap, Namespace, Secret, Service, ServicePort, ServiceSpec,
    };
    use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
    use k8s_openapi::api::storage::v1::{CSIDriver, StorageClass};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    const NS: &str = "kube-system";
    const VERSION: &str = "v1.20.4";

    fn cluster(spec: StorageOSClusterSpec) -> StorageOSCluster {
        let mut cluster = StorageOSCluster::new("example", spec);
        cluster.metadata.namespace = Some("default".to_string());
        cluster
    }

    fn caps(spec: &StorageOSClusterSpec) -> Capabilities {
        Capabilities::from_parts(VERSION, true, false, spec)
    }

    fn csi_spec() -> StorageOSClusterSpec {
        let mut spec = StorageOSClusterSpec::default();
        spec.csi.enable = true;
        spec.csi.enable_provision_creds = true;
        spec
    }

    fn admin_secret() -> Secret {
        let mut data = BTreeMap::new();
        data.insert(
            SECRET_API_USERNAME_KEY.to_string(),
            ByteString(b"admin".to_vec()),
        );
        data.insert(
            SECRET_API_PASSWORD_KEY.to_string(),
            ByteString(b"s3cret".to_vec()),
        );
        Secret {
            metadata: ObjectMeta {
                name: Some("storageos-api".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        }
    }

    fn with_admin_secret(mut spec: StorageOSClusterSpec) -> StorageOSClusterSpec {
        spec.secret_ref_name = Some("storageos-api".to_string());
        spec.secret_ref_namespace = Some("default".to_string());
        spec
    }

    async fn deploy(client: &MemoryClient, cluster: &StorageOSCluster, allow_updates: bool) {
        StorageOSDeployment::new(client, cluster, caps(&cluster.spec), allow_updates)
            .deploy()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deploy_creates_core_objects() {
        let client = MemoryClient::new();
        let cluster = cluster(StorageOSClusterSpec::default());
        deploy(&client, &cluster, false).await;

        assert!(client.exists::<Namespace>(None, NS));
        assert!(client.exists::<DaemonSet>(Some(NS), DAEMONSET_NAME));
        assert!(client.exists::<ConfigMap>(Some(NS), NODE_CONFIGMAP_NAME));
        assert!(client.exists::<Service>(Some(NS), "storageos"));
        assert!(client.exists::<Secret>(Some(NS), INIT_SECRET_NAME));
        assert!(client.exists::<Deployment>(Some(NS), API_MANAGER_NAME));
        assert!(client.exists::<Deployment>(Some(NS), SCHEDULER_NAME));
        assert!(client.exists::<MutatingWebhookConfiguration>(
            None,
            MUTATING_WEBHOOK_CONFIG_NAME
        ));
        assert!(client.exists::<ClusterRoleBinding>(None, FENCING_CLUSTER_BINDING));

        let class = client.read::<StorageClass>(None, "fast").unwrap();
        assert_eq!(class.provisioner, "kubernetes.io/storageos");
    }

    #[tokio::test]
    async fn test_deploy_without_csi_skips_csi_objects() {
        let client = MemoryClient::new();
        let cluster = cluster(StorageOSClusterSpec::default());
        deploy(&client, &cluster, false).await;

        assert_eq!(client.count::<CSIDriver>(), 0);
        assert_eq!(client.count::<StatefulSet>(), 0);
        assert!(!client.exists::<Deployment>(Some(NS), CSI_HELPER_DEPLOYMENT_NAME));
    }

    #[tokio::test]
    async fn test_deploy_is_idempotent() {
        let client = MemoryClient::new();
        let cluster = cluster(csi_spec());
        deploy(&client, &cluster, false).await;
        let daemonsets = client.count::<DaemonSet>();
        let bindings = client.count::<ClusterRoleBinding>();
        client.clear_calls();

        deploy(&client, &cluster, false).await;

        assert_eq!(client.count::<DaemonSet>(), daemonsets);
        assert_eq!(client.count::<ClusterRoleBinding>(), bindings);
        // Only the node ConfigMap is rewritten when updates are off.
        assert_eq!(
            client.calls_with("replace"),
            vec![format!("replace ConfigMap {NS}/{NODE_CONFIGMAP_NAME}")]
        );
    }

    #[tokio::test]
    async fn test_deploy_csi_statefulset_helper() {
        let client = MemoryClient::new();
        let cluster = cluster(csi_spec());
        deploy(&client, &cluster, false).await;

        assert!(client.exists::<CSIDriver>(None, CSI_DRIVER_NAME));
        assert!(client.exists::<StatefulSet>(Some(NS), CSI_HELPER_STATEFULSET_NAME));
        assert!(client.exists::<Secret>(Some(NS), CSI_PROVISION_SECRET_NAME));

        let class = client.read::<StorageClass>(None, "fast").unwrap();
        assert_eq!(class.provisioner, CSI_DRIVER_NAME);
        let params = class.parameters.unwrap();
        assert_eq!(
            params.get("csi.storage.k8s.io/provisioner-secret-name"),
            Some(&CSI_PROVISION_SECRET_NAME.to_string())
        );
    }

    #[tokio::test]
    async fn test_deploy_csi_deployment_helper() {
        let client = MemoryClient::new();
        let mut spec = csi_spec();
        spec.csi.deployment_strategy = Some("deployment".to_string());
        let cluster = cluster(spec);
        deploy(&client, &cluster, false).await;

        assert!(client.exists::<Deployment>(Some(NS), CSI_HELPER_DEPLOYMENT_NAME));
        assert_eq!(client.count::<StatefulSet>(), 0);
    }

    #[tokio::test]
    async fn test_deploy_v2_node_image_forces_csi() {
        let client = MemoryClient::new();
        let mut spec = StorageOSClusterSpec::default();
        spec.images.node_container = Some("storageos/node:v2.2.0".to_string());
        let cluster = cluster(spec);
        deploy(&client, &cluster, false).await;

        assert!(client.exists::<StatefulSet>(Some(NS), CSI_HELPER_STATEFULSET_NAME));
        let config = client
            .read::<ConfigMap>(Some(NS), NODE_CONFIGMAP_NAME)
            .unwrap();
        let data = config.data.unwrap();
        assert_eq!(data.get("K8S_NAMESPACE"), Some(&NS.to_string()));
        assert!(!data.contains_key("JOIN"));
    }

    #[tokio::test]
    async fn test_deploy_copies_admin_credentials_into_init_secret() {
        let client = MemoryClient::new();
        client.insert(&admin_secret());
        let cluster = cluster(with_admin_secret(StorageOSClusterSpec::default()));
        deploy(&client, &cluster, false).await;

        let init = client.read::<Secret>(Some(NS), INIT_SECRET_NAME).unwrap();
        assert_eq!(
            init.data.unwrap().get(SECRET_USERNAME_KEY),
            Some(&ByteString(b"admin".to_vec()))
        );
    }

    #[tokio::test]
    async fn test_deploy_missing_admin_secret_is_invalid() {
        let client = MemoryClient::new();
        let cluster = cluster(with_admin_secret(StorageOSClusterSpec::default()));
        let err = StorageOSDeployment::new(&client, &cluster, caps(&cluster.spec), false)
            .deploy()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidSpec(_)));
        assert!(!client.exists::<DaemonSet>(Some(NS), DAEMONSET_NAME));
    }

    #[tokio::test]
    async fn test_deploy_sets_api_address_without_csi() {
        let client = MemoryClient::new();
        client.insert(&admin_secret());
        client.insert(&Service {
            metadata: ObjectMeta {
                name: Some("storageos".to_string()),
                namespace: Some(NS.to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                cluster_ip: Some("10.96.0.10".to_string()),
                ports: Some(vec![ServicePort {
                    port: 5705,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        });
        let cluster = cluster(with_admin_secret(StorageOSClusterSpec::default()));
        deploy(&client, &cluster, false).await;

        let admin = client
            .read::<Secret>(Some("default"), "storageos-api")
            .unwrap();
        assert_eq!(
            admin.data.unwrap().get(SECRET_API_ADDRESS_KEY),
            Some(&ByteString(b"tcp://10.96.0.10:5705".to_vec()))
        );

        // Already up to date: no second write.
        client.clear_calls();
        deploy(&client, &cluster, false).await;
        assert!(!client
            .calls_with("replace")
            .iter()
            .any(|c| c.ends_with("Secret default/storageos-api")));
    }

    #[tokio::test]
    async fn test_deploy_copies_etcd_tls_secret() {
        let client = MemoryClient::new();
        let mut source = admin_secret();
        source.metadata.name = Some("etcd-client-tls".to_string());
        client.insert(&source);

        let mut spec = StorageOSClusterSpec::default();
        spec.tls_etcd_secret_ref_name = Some("etcd-client-tls".to_string());
        spec.tls_etcd_secret_ref_namespace = Some("default".to_string());
        deploy(&client, &cluster(spec), false).await;

        assert!(client.exists::<Secret>(Some(NS), TLS_ETCD_SECRET_NAME));
    }

    #[tokio::test]
    async fn test_deploy_respects_disabled_components() {
        let client = MemoryClient::new();
        let spec = StorageOSClusterSpec {
            disable_scheduler: true,
            disable_fencing: true,
            ..Default::default()
        };
        deploy(&client, &cluster(spec), false).await;

        assert!(!client.exists::<Deployment>(Some(NS), SCHEDULER_NAME));
        assert!(!client.exists::<ClusterRoleBinding>(None, FENCING_CLUSTER_BINDING));
    }

    #[tokio::test]
    async fn test_deploy_openshift_and_service_monitor() {
        let client = MemoryClient::new();
        let spec = StorageOSClusterSpec {
            k8s_distro: Some("openshift".to_string()),
            ..Default::default()
        };
        let cluster = cluster(spec);
        let caps = Capabilities::from_parts(VERSION, true, true, &cluster.spec);
        StorageOSDeployment::new(&client, &cluster, caps, false)
            .deploy()
            .await
            .unwrap();

        assert!(client.exists::<ClusterRoleBinding>(None, OPENSHIFT_SCC_CLUSTER_BINDING));
        assert!(client.exists::<ServiceMonitor>(Some(NS), API_MANAGER_METRICS_NAME));
    }

    #[tokio::test]
    async fn test_deploy_updates_api_manager_only_when_allowed() {
        let client = MemoryClient::new();
        let cluster = cluster(StorageOSClusterSpec::default());
        deploy(&client, &cluster, false).await;

        let scale_up = |d: &mut Deployment| {
            d.spec.as_mut().unwrap().replicas = Some(5);
        };
        client.mutate::<Deployment>(Some(NS), API_MANAGER_NAME, scale_up);

        deploy(&client, &cluster, false).await;
        let live = client.read::<Deployment>(Some(NS), API_MANAGER_NAME).unwrap();
        assert_eq!(live.spec.unwrap().replicas, Some(5));

        deploy(&client, &cluster, true).await;
        let live = client.read::<Deployment>(Some(NS), API_MANAGER_NAME).unwrap();
        assert_eq!(live.spec.unwrap().replicas, Some(2));
    }

    #[tokio::test]
    async fn test_deploy_stops_at_first_failure() {
        let client = MemoryClient::new();
        client.fail(Verb::Create, "DaemonSet", "", Failure::Server);
        let cluster = cluster(StorageOSClusterSpec::default());

        let result = StorageOSDeployment::new(&client, &cluster, caps(&cluster.spec), false)
            .deploy()
            .await;

        assert!(result.is_err());
        assert!(client.exists::<ConfigMap>(Some(NS), NODE_CONFIGMAP_NAME));
        assert!(!client.exists::<Service>(Some(NS), "storageos"));
    }

    #[tokio::test]
    async fn test_delete_removes_everything_but_namespace() {
        let client = MemoryClient::new();
        let spec = StorageOSClusterSpec {
            k8s_distro: Some("openshift".to_string()),
            ..csi_spec()
        };
        let cluster = cluster(spec);
        let deployment = StorageOSDeployment::new(&client, &cluster, caps(&cluster.spec), false);
        deployment.deploy().await.unwrap();
        deployment.delete().await.unwrap();

        assert!(client.exists::<Namespace>(None, NS));
        assert_eq!(client.count::<DaemonSet>(), 0);
        assert_eq!(client.count::<Deployment>(), 0);
        assert_eq!(client.count::<StatefulSet>(), 0);
        assert_eq!(client.count::<Service>(), 0);
        assert_eq!(client.count::<Secret>(), 0);
        assert_eq!(client.count::<ConfigMap>(), 0);
        assert_eq!(client.count::<ClusterRoleBinding>(), 0);
        assert_eq!(client.count::<CSIDriver>(), 0);
        assert_eq!(client.count::<StorageClass>(), 0);
    }

    #[tokio::test]
    async fn test_delete_of_missing_objects_succeeds() {
        let client = MemoryClient::new();
        let cluster = cluster(StorageOSClusterSpec::default());
        StorageOSDeployment::new(&client, &cluster, caps(&cluster.spec), false)
            .delete()
            .await
            .unwrap();
        assert!(client.calls_with("create").is_empty());
    }
}
