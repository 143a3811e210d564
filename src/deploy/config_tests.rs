// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `deploy/config.rs`

#[cfg(test)]
mod tests {
    use crate::capabilities::Capabilities;
    use crate::constants::NODE_CONFIGMAP_NAME;
    use crate::crd::StorageOSClusterSpec;
    use crate::deploy::config::{build_node_configmap, csi_version, node_env};

    fn caps(spec: &StorageOSClusterSpec, version: &str) -> Capabilities {
        Capabilities::from_parts(version, false, false, spec)
    }

    #[test]
    fn test_v1_env_defaults() {
        let spec = StorageOSClusterSpec {
            join: Some("10.0.0.1,10.0.0.2".to_string()),
            ..Default::default()
        };
        let env = node_env(&spec, &caps(&spec, "v1.18.0"));

        assert_eq!(env["JOIN"], "10.0.0.1,10.0.0.2");
        assert_eq!(env["NAMESPACE"], "kube-system");
        assert_eq!(env["KV_BACKEND"], "embedded");
        assert_eq!(env["DISABLE_FENCING"], "false");
        assert_eq!(env["K8S_ENABLE_SCHEDULER_EXTENDER"], "true");
        assert_eq!(env["LOG_LEVEL"], "info");
        assert_eq!(env["LOG_FORMAT"], "text");
        assert!(!env.contains_key("KV_ADDR"));
        assert!(!env.contains_key("CSI_ENDPOINT"));
        assert!(!env.contains_key("K8S_DISTRO"));
    }

    #[test]
    fn test_v1_env_with_csi_and_options() {
        let mut spec = StorageOSClusterSpec {
            debug: true,
            disable_scheduler: true,
            shared_dir: Some("/var/lib/kubelet/plugins/kubernetes.io~storageos/".to_string()),
            k8s_distro: Some("openshift".to_string()),
            ..Default::default()
        };
        spec.csi.enable = true;
        spec.kv_backend.address = Some("10.0.0.5:2379".to_string());
        spec.kv_backend.backend = Some("etcd".to_string());

        let env = node_env(&spec, &caps(&spec, "v1.18.0"));

        assert_eq!(env["KV_ADDR"], "10.0.0.5:2379");
        assert_eq!(env["KV_BACKEND"], "etcd");
        assert_eq!(env["LOG_LEVEL"], "debug");
        assert_eq!(env["K8S_ENABLE_SCHEDULER_EXTENDER"], "false");
        assert_eq!(env["CSI_VERSION"], "v1");
        assert!(env.contains_key("CSI_ENDPOINT"));
        assert_eq!(
            env["DEVICE_DIR"],
            "/var/lib/kubelet/plugins/kubernetes.io~storageos/devices"
        );
        assert_eq!(env["K8S_DISTRO"], "openshift");
    }

    #[test]
    fn test_v2_env_uses_v2_names() {
        let mut spec = StorageOSClusterSpec::default();
        spec.images.node_container = Some("storageos/node:v2.3.0".to_string());
        spec.kv_backend.address = Some("etcd.storageos:2379".to_string());

        let env = node_env(&spec, &caps(&spec, "v1.18.0"));

        assert_eq!(env["K8S_NAMESPACE"], "kube-system");
        assert_eq!(env["ETCD_ENDPOINTS"], "etcd.storageos:2379");
        assert_eq!(env["CSI_VERSION"], "v1");
        assert_eq!(env["LOG_FORMAT"], "json");
        assert!(!env.contains_key("JOIN"));
        assert!(!env.contains_key("KV_BACKEND"));
    }

    #[test]
    fn test_etcd_tls_paths() {
        let mut spec = StorageOSClusterSpec {
            tls_etcd_secret_ref_name: Some("etcd-tls".to_string()),
            tls_etcd_secret_ref_namespace: Some("default".to_string()),
            ..Default::default()
        };
        let env = node_env(&spec, &caps(&spec, "v1.18.0"));
        assert!(env["KV_TLS_CA"].starts_with("/run/storageos/pki/"));

        spec.images.node_container = Some("storageos/node:v2.3.0".to_string());
        let env = node_env(&spec, &caps(&spec, "v1.18.0"));
        assert!(env.contains_key("ETCD_TLS_CLIENT_CERT"));
        assert!(!env.contains_key("KV_TLS_CA"));
    }

    #[test]
    fn test_csi_version_follows_server() {
        let spec = StorageOSClusterSpec::default();
        assert_eq!(csi_version(&caps(&spec, "v1.12.3")), "v0");
        assert_eq!(csi_version(&caps(&spec, "v1.13.0")), "v1");
    }

    #[test]
    fn test_build_node_configmap() {
        let spec = StorageOSClusterSpec {
            namespace: Some("storageos".to_string()),
            ..Default::default()
        };
        let cm = build_node_configmap(&spec, &caps(&spec, "v1.18.0"));

        assert_eq!(cm.metadata.name.as_deref(), Some(NODE_CONFIGMAP_NAME));
        assert_eq!(cm.metadata.namespace.as_deref(), Some("storageos"));
        assert_eq!(cm.data.unwrap()["NAMESPACE"], "storageos");
    }
}
