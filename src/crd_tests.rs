// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `crd.rs`

#[cfg(test)]
mod tests {
    use crate::constants::{
        CSI_V0_DRIVER_REGISTRAR_IMAGE, CSI_V1_EXTERNAL_ATTACHER_V3_IMAGE,
        CSI_V1_NODE_DRIVER_REGISTRAR_IMAGE, DEFAULT_CSI_ENDPOINT_V0, DEFAULT_CSI_ENDPOINT_V1,
        DEFAULT_NODE_IMAGE,
    };
    use crate::crd::{
        ExportSpec, NFSServerSpec, ServerSpec, StorageOSCluster, StorageOSClusterSpec,
        StorageOSJobSpec,
    };
    use k8s_openapi::api::core::v1::ResourceRequirements;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use kube::CustomResourceExt;
    use std::collections::BTreeMap;

    #[test]
    fn test_unset_fields_return_defaults() {
        let spec = StorageOSClusterSpec::default();

        assert_eq!(spec.resource_namespace(), "kube-system");
        assert_eq!(spec.service_name(), "storageos");
        assert_eq!(spec.service_type(), "ClusterIP");
        assert_eq!(spec.service_external_port(), 5705);
        assert_eq!(spec.service_internal_port(), 5705);
        assert_eq!(spec.ingress_hostname(), "storageos.local");
        assert_eq!(spec.storage_class_name(), "fast");
        assert_eq!(spec.kv_backend(), "embedded");
        assert_eq!(spec.node_container_image(), DEFAULT_NODE_IMAGE);
        assert_eq!(spec.csi_deployment_strategy(), "statefulset");
        assert!(spec.secret_ref().is_none());
        assert_eq!(spec.join(), "");
    }

    #[test]
    fn test_empty_strings_count_as_unset() {
        let mut spec = StorageOSClusterSpec::default();
        spec.namespace = Some(String::new());
        spec.service.name = Some(String::new());
        spec.images.node_container = Some(String::new());

        assert_eq!(spec.resource_namespace(), "kube-system");
        assert_eq!(spec.service_name(), "storageos");
        assert_eq!(spec.node_container_image(), DEFAULT_NODE_IMAGE);
    }

    #[test]
    fn test_explicit_values_win() {
        let mut spec = StorageOSClusterSpec::default();
        spec.namespace = Some("storageos".to_string());
        spec.service.external_port = Some(8080);
        spec.images.node_container = Some("storageos/node:2.3.0".to_string());

        assert_eq!(spec.resource_namespace(), "storageos");
        assert_eq!(spec.service_external_port(), 8080);
        assert_eq!(spec.node_container_image(), "storageos/node:2.3.0");
    }

    #[test]
    fn test_csi_defaults_follow_csi_version() {
        let spec = StorageOSClusterSpec::default();

        assert_eq!(spec.csi_endpoint(true), DEFAULT_CSI_ENDPOINT_V1);
        assert_eq!(spec.csi_endpoint(false), DEFAULT_CSI_ENDPOINT_V0);
        assert_eq!(
            spec.csi_node_driver_registrar_image(true),
            CSI_V1_NODE_DRIVER_REGISTRAR_IMAGE
        );
        assert_eq!(
            spec.csi_node_driver_registrar_image(false),
            CSI_V0_DRIVER_REGISTRAR_IMAGE
        );
        assert_eq!(
            spec.csi_registration_dir(true),
            "/var/lib/kubelet/plugins_registry"
        );
        assert_eq!(spec.csi_registration_dir(false), "/var/lib/kubelet/plugins");
        assert_eq!(
            spec.csi_external_attacher_image(true, true, true),
            CSI_V1_EXTERNAL_ATTACHER_V3_IMAGE
        );
    }

    #[test]
    fn test_accessors_are_pure() {
        let spec = StorageOSClusterSpec::default();
        let before = spec.clone();
        let _ = spec.service_name();
        let _ = spec.csi_plugin_dir(true);
        assert_eq!(spec, before);
    }

    #[test]
    fn test_with_defaults_is_idempotent() {
        let mut spec = StorageOSClusterSpec::default();
        spec.csi.enable = true;

        let once = spec.with_defaults(true);
        let twice = once.with_defaults(true);

        assert_eq!(once, twice);
        assert_eq!(once.namespace.as_deref(), Some("kube-system"));
        assert_eq!(once.service.type_.as_deref(), Some("ClusterIP"));
        assert_eq!(
            once.images.csi_node_driver_registrar_container.as_deref(),
            Some(CSI_V1_NODE_DRIVER_REGISTRAR_IMAGE)
        );
        assert!(once.images.csi_liveness_probe_container.is_some());
    }

    #[test]
    fn test_with_defaults_skips_csi_images_when_disabled() {
        let spec = StorageOSClusterSpec::default().with_defaults(true);
        assert!(spec.images.csi_node_driver_registrar_container.is_none());
        assert!(spec.ingress.hostname.is_none());
    }

    #[test]
    fn test_spec_deserializes_from_camel_case() {
        let spec: StorageOSClusterSpec = serde_json::from_value(serde_json::json!({
            "secretRefName": "storageos-api",
            "secretRefNamespace": "default",
            "disableTCMU": true,
            "csi": { "enable": true, "deploymentStrategy": "deployment" },
            "service": { "type": "NodePort" }
        }))
        .unwrap();

        assert_eq!(spec.secret_ref(), Some(("storageos-api", "default")));
        assert!(spec.disable_tcmu);
        assert_eq!(spec.csi_deployment_strategy(), "deployment");
        assert_eq!(spec.service_type(), "NodePort");
    }

    #[test]
    fn test_nfs_defaults() {
        let spec = NFSServerSpec::default();
        assert_eq!(spec.export_name("share"), "share");
        assert_eq!(spec.access_mode(), "ReadWrite");
        assert_eq!(spec.access_modes(), "ReadWriteMany");
        assert_eq!(spec.squash(), "none");
        assert_eq!(spec.capacity(), "1Gi");
        assert_eq!(spec.storage_class_name("fast"), "fast");
    }

    #[test]
    fn test_nfs_read_only_and_capacity() {
        let mut requests = BTreeMap::new();
        requests.insert("storage".to_string(), Quantity("5Gi".to_string()));
        let spec = NFSServerSpec {
            export: ExportSpec {
                name: Some("data".to_string()),
                server: ServerSpec {
                    access_mode: Some("ReadOnly".to_string()),
                    squash: Some("root".to_string()),
                },
            },
            resources: Some(ResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(spec.export_name("share"), "data");
        assert_eq!(spec.access_modes(), "ReadOnlyMany");
        assert_eq!(spec.capacity(), "5Gi");
    }

    #[test]
    fn test_job_pod_labels() {
        let spec = StorageOSJobSpec::default();
        let labels = spec.pod_labels();
        assert_eq!(labels.get("daemonset-job").map(String::as_str), Some("true"));

        let spec = StorageOSJobSpec {
            label_selector: Some("app=cleanup, tier=node,bogus".to_string()),
            ..Default::default()
        };
        let labels = spec.pod_labels();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get("tier").map(String::as_str), Some("node"));
        assert_eq!(spec.completion_word(), "done");
    }

    #[test]
    fn test_crd_metadata() {
        let crd = StorageOSCluster::crd();
        assert_eq!(crd.spec.group, "storageos.com");
        assert_eq!(crd.spec.names.kind, "StorageOSCluster");
        assert_eq!(
            crd.spec.names.short_names,
            Some(vec!["stos".to_string()])
        );
    }
}
