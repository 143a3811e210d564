// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Node agent `DaemonSet` builder.
//!
//! One pod per selected node, on the host network, with:
//! - an init container preparing kernel modules and the state directory
//! - the node agent, configured from `storageos-node-config` and `init-secret`
//! - the CSI node driver registrar and, on CSI v1, the liveness probe sidecar

use crate::capabilities::Capabilities;
use crate::constants::{
    CSI_SIDECAR_ADDRESS, DAEMONSET_NAME, DAEMONSET_SERVICE_ACCOUNT, INIT_SECRET_NAME,
    NODE_CONFIGMAP_NAME, NODE_PRIORITY_CLASS, SECRET_PASSWORD_KEY, SECRET_USERNAME_KEY,
    SYSTEM_NAMESPACE, TLS_ETCD_SECRET_NAME,
};
use crate::crd::StorageOSClusterSpec;
use crate::deploy::config::ETCD_TLS_MOUNT_PATH;
use crate::labels::{kind_labels, selector_labels, KIND_DAEMONSET};
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec, DaemonSetUpdateStrategy};
use k8s_openapi::api::core::v1::{
    Affinity, Capabilities as LinuxCapabilities, ConfigMapEnvSource, Container, ContainerPort,
    EnvFromSource, EnvVar, EnvVarSource, HostPathVolumeSource, NodeAffinity, NodeSelector,
    NodeSelectorTerm, ObjectFieldSelector, PodSpec, PodTemplateSpec, SecretKeySelector,
    SecretVolumeSource, SecurityContext, Toleration, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use tracing::debug;

/// State directory of the node agent on the host.
const STATE_DIR: &str = "/var/lib/storageos";

pub(crate) fn env_value(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

pub(crate) fn env_field(name: &str, path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: path.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(crate) fn env_secret(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(crate) fn host_path_volume(name: &str, path: &str, type_: Option<&str>) -> Volume {
    Volume {
        name: name.to_string(),
        host_path: Some(HostPathVolumeSource {
            path: path.to_string(),
            type_: type_.map(ToString::to_string),
        }),
        ..Default::default()
    }
}

pub(crate) fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

fn bidirectional_mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        mount_propagation: Some("Bidirectional".to_string()),
        ..mount(name, path)
    }
}

pub(crate) fn privileged() -> SecurityContext {
    SecurityContext {
        privileged: Some(true),
        allow_privilege_escalation: Some(true),
        capabilities: Some(LinuxCapabilities {
            add: Some(vec!["SYS_ADMIN".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Required node affinity from the cluster's node selector terms.
#[must_use]
pub fn node_affinity(terms: &[NodeSelectorTerm]) -> Option<Affinity> {
    if terms.is_empty() {
        return None;
    }
    Some(Affinity {
        node_affinity: Some(NodeAffinity {
            required_during_scheduling_ignored_during_execution: Some(NodeSelector {
                node_selector_terms: terms.to_vec(),
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Tolerations, or `None` when there are none.
pub(crate) fn tolerations(tolerations: &[Toleration]) -> Option<Vec<Toleration>> {
    (!tolerations.is_empty()).then(|| tolerations.to_vec())
}

/// Priority class for system-critical pods. Only honoured in `kube-system`.
pub(crate) fn priority_class(namespace: &str, class: &str) -> Option<String> {
    (namespace == SYSTEM_NAMESPACE).then(|| class.to_string())
}

fn init_container(spec: &StorageOSClusterSpec) -> Container {
    Container {
        name: "storageos-init".to_string(),
        image: Some(spec.init_container_image()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        env: Some(vec![
            env_value("DAEMONSET_NAME", DAEMONSET_NAME),
            env_value("DAEMONSET_NAMESPACE", &spec.resource_namespace()),
        ]),
        volume_mounts: Some(vec![
            mount("kernel-modules", "/lib/modules"),
            bidirectional_mount("sys", "/sys"),
            bidirectional_mount("state", STATE_DIR),
        ]),
        security_context: Some(privileged()),
        ..Default::default()
    }
}

fn node_container(spec: &StorageOSClusterSpec, caps: &Capabilities) -> Container {
    let mut mounts = vec![
        mount("fuse", "/dev/fuse"),
        bidirectional_mount("sys", "/sys"),
        bidirectional_mount("state", STATE_DIR),
    ];
    if let Some(shared) = spec.shared_dir() {
        mounts.push(bidirectional_mount("shared", shared));
    }
    if caps.csi_enabled {
        mounts.push(mount("plugin-dir", &spec.csi_plugin_dir(caps.csi_v1)));
        mounts.push(bidirectional_mount("mountpoint-dir", &spec.csi_kubelet_dir()));
        mounts.push(mount("device-dir", &spec.csi_device_dir()));
    }
    if spec.tls_etcd_secret_ref().is_some() {
        mounts.push(mount("etcd-certs", ETCD_TLS_MOUNT_PATH));
    }

    let port = spec.service_internal_port();

    Container {
        name: "storageos".to_string(),
        image: Some(spec.node_container_image()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        args: Some(vec!["server".to_string()]),
        ports: Some(vec![ContainerPort {
            name: Some("api".to_string()),
            container_port: port,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env_from: Some(vec![EnvFromSource {
            config_map_ref: Some(ConfigMapEnvSource {
                name: NODE_CONFIGMAP_NAME.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        env: Some(vec![
            env_field("HOSTNAME", "spec.nodeName"),
            env_field("ADVERTISE_IP", "status.podIP"),
            env_secret("ADMIN_USERNAME", INIT_SECRET_NAME, SECRET_USERNAME_KEY),
            env_secret("ADMIN_PASSWORD", INIT_SECRET_NAME, SECRET_PASSWORD_KEY),
        ]),
        resources: spec.resources.clone(),
        volume_mounts: Some(mounts),
        security_context: Some(privileged()),
        ..Default::default()
    }
}

fn registrar_container(spec: &StorageOSClusterSpec, caps: &Capabilities) -> Container {
    let mut args = vec![
        "--v=5".to_string(),
        "--csi-address=$(ADDRESS)".to_string(),
    ];
    if !caps.csi_v1 {
        args.push(format!("--mode={}", spec.csi_driver_registration_mode()));
    }
    let mut env = vec![env_value("ADDRESS", CSI_SIDECAR_ADDRESS)];
    if caps.kubelet_plugin_watcher {
        args.push("--kubelet-registration-path=$(DRIVER_REG_SOCK_PATH)".to_string());
        env.push(env_value(
            "DRIVER_REG_SOCK_PATH",
            &spec.csi_kubelet_registration_path(caps.csi_v1),
        ));
    }
    env.push(env_field("KUBE_NODE_NAME", "spec.nodeName"));

    Container {
        name: "csi-driver-registrar".to_string(),
        image: Some(spec.csi_node_driver_registrar_image(caps.csi_v1)),
        image_pull_policy: Some("IfNotPresent".to_string()),
        args: Some(args),
        env: Some(env),
        volume_mounts: Some(vec![
            mount("plugin-dir", "/csi"),
            mount("registrar-socket-dir", "/var/lib/csi/sockets/"),
            mount("registration-dir", "/registration"),
        ]),
        ..Default::default()
    }
}

fn liveness_probe_container(spec: &StorageOSClusterSpec) -> Container {
    Container {
        name: "csi-liveness-probe".to_string(),
        image: Some(spec.csi_liveness_probe_image()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        args: Some(vec![format!("--csi-address={CSI_SIDECAR_ADDRESS}")]),
        volume_mounts: Some(vec![mount("plugin-dir", "/csi")]),
        ..Default::default()
    }
}

fn volumes(spec: &StorageOSClusterSpec, caps: &Capabilities) -> Vec<Volume> {
    let mut volumes = vec![
        host_path_volume("kernel-modules", "/lib/modules", None),
        host_path_volume("fuse", "/dev/fuse", None),
        host_path_volume("sys", "/sys", None),
        host_path_volume("state", STATE_DIR, None),
    ];
    if let Some(shared) = spec.shared_dir() {
        volumes.push(host_path_volume("shared", shared, None));
    }
    if caps.csi_enabled {
        volumes.push(host_path_volume(
            "registrar-socket-dir",
            &spec.csi_registrar_socket_dir(),
            Some("DirectoryOrCreate"),
        ));
        volumes.push(host_path_volume(
            "mountpoint-dir",
            &spec.csi_kubelet_dir(),
            Some("Directory"),
        ));
        volumes.push(host_path_volume(
            "registration-dir",
            &spec.csi_registration_dir(caps.kubelet_plugin_watcher),
            Some("Directory"),
        ));
        volumes.push(host_path_volume(
            "plugin-dir",
            &spec.csi_plugin_dir(caps.csi_v1),
            Some("DirectoryOrCreate"),
        ));
        volumes.push(host_path_volume(
            "device-dir",
            &spec.csi_device_dir(),
            Some("Directory"),
        ));
    }
    if spec.tls_etcd_secret_ref().is_some() {
        volumes.push(Volume {
            name: "etcd-certs".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(TLS_ETCD_SECRET_NAME.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
    }
    volumes
}

/// The node agent `DaemonSet`.
#[must_use]
pub fn build_daemonset(spec: &StorageOSClusterSpec, caps: &Capabilities) -> DaemonSet {
    let namespace = spec.resource_namespace();
    debug!(
        namespace = %namespace,
        node_v2 = caps.node_v2,
        csi = caps.csi_enabled,
        "Building node DaemonSet"
    );

    let mut containers = vec![node_container(spec, caps)];
    if caps.csi_enabled {
        containers.push(registrar_container(spec, caps));
        if caps.csi_v1 {
            containers.push(liveness_probe_container(spec));
        }
    }

    DaemonSet {
        metadata: ObjectMeta {
            name: Some(DAEMONSET_NAME.to_string()),
            namespace: Some(namespace.clone()),
            labels: Some(kind_labels(KIND_DAEMONSET)),
            ..Default::default()
        },
        spec: Some(DaemonSetSpec {
            selector: LabelSelector {
                match_labels: Some(selector_labels(KIND_DAEMONSET)),
                ..Default::default()
            },
            update_strategy: Some(DaemonSetUpdateStrategy {
                type_: Some("OnDelete".to_string()),
                ..Default::default()
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(kind_labels(KIND_DAEMONSET)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(DAEMONSET_SERVICE_ACCOUNT.to_string()),
                    host_network: Some(true),
                    host_pid: Some(true),
                    dns_policy: Some("ClusterFirstWithHostNet".to_string()),
                    priority_class_name: priority_class(&namespace, NODE_PRIORITY_CLASS),
                    init_containers: Some(vec![init_container(spec)]),
                    containers,
                    volumes: Some(volumes(spec, caps)),
                    tolerations: tolerations(spec.tolerations()),
                    affinity: node_affinity(spec.node_selector_terms()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod node_tests;
