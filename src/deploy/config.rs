// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Node agent configuration (`storageos-node-config`).
//!
//! The node containers load this `ConfigMap` with `envFrom`. v1 and v2 agents
//! use different variable names:
//!
//! | Concern      | v1 agent                  | v2 agent                 |
//! |--------------|---------------------------|--------------------------|
//! | Namespace    | `NAMESPACE`               | `K8S_NAMESPACE`          |
//! | Peers        | `JOIN`                    | n/a                      |
//! | KV store     | `KV_BACKEND`, `KV_ADDR`   | `ETCD_ENDPOINTS`         |
//! | Log format   | `text`                    | `json`                   |
//! | CSI          | only when enabled         | always on, `v1`          |

use crate::capabilities::Capabilities;
use crate::constants::NODE_CONFIGMAP_NAME;
use crate::crd::StorageOSClusterSpec;
use crate::labels::{kind_labels, KIND_DAEMONSET};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Mount path of the etcd TLS secret in the node container.
pub const ETCD_TLS_MOUNT_PATH: &str = "/run/storageos/pki";

fn flag(value: bool) -> String {
    value.to_string()
}

fn log_level(spec: &StorageOSClusterSpec) -> String {
    if spec.debug { "debug" } else { "info" }.to_string()
}

/// CSI version string handed to the agents.
#[must_use]
pub fn csi_version(caps: &Capabilities) -> &'static str {
    if caps.csi_v1 {
        "v1"
    } else {
        "v0"
    }
}

fn v1_env(spec: &StorageOSClusterSpec, caps: &Capabilities) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("JOIN".to_string(), spec.join().to_string());
    env.insert("NAMESPACE".to_string(), spec.resource_namespace());
    env.insert("KV_BACKEND".to_string(), spec.kv_backend());
    if let Some(addr) = spec.kv_address() {
        env.insert("KV_ADDR".to_string(), addr.to_string());
    }
    env.insert("DISABLE_FENCING".to_string(), flag(spec.disable_fencing));
    env.insert("DISABLE_TELEMETRY".to_string(), flag(spec.disable_telemetry));
    env.insert("DISABLE_TCMU".to_string(), flag(spec.disable_tcmu));
    env.insert("FORCE_TCMU".to_string(), flag(spec.force_tcmu));
    env.insert(
        "K8S_ENABLE_SCHEDULER_EXTENDER".to_string(),
        flag(!spec.disable_scheduler),
    );
    env.insert("LOG_LEVEL".to_string(), log_level(spec));
    env.insert("LOG_FORMAT".to_string(), "text".to_string());

    if caps.csi_enabled {
        env.insert("CSI_ENDPOINT".to_string(), spec.csi_endpoint(caps.csi_v1));
        env.insert("CSI_VERSION".to_string(), csi_version(caps).to_string());
    }
    if let Some(shared) = spec.shared_dir() {
        env.insert(
            "DEVICE_DIR".to_string(),
            format!("{}/devices", shared.trim_end_matches('/')),
        );
    }
    if !spec.k8s_distro().is_empty() {
        env.insert("K8S_DISTRO".to_string(), spec.k8s_distro().to_string());
    }
    if spec.tls_etcd_secret_ref().is_some() {
        env.insert(
            "KV_TLS_CA".to_string(),
            format!("{ETCD_TLS_MOUNT_PATH}/etcd-client-ca.crt"),
        );
        env.insert(
            "KV_TLS_CERT".to_string(),
            format!("{ETCD_TLS_MOUNT_PATH}/etcd-client.crt"),
        );
        env.insert(
            "KV_TLS_KEY".to_string(),
            format!("{ETCD_TLS_MOUNT_PATH}/etcd-client.key"),
        );
    }
    env
}

fn v2_env(spec: &StorageOSClusterSpec, caps: &Capabilities) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("K8S_NAMESPACE".to_string(), spec.resource_namespace());
    if let Some(addr) = spec.kv_address() {
        env.insert("ETCD_ENDPOINTS".to_string(), addr.to_string());
    }
    env.insert("DISABLE_TELEMETRY".to_string(), flag(spec.disable_telemetry));
    env.insert("CSI_ENDPOINT".to_string(), spec.csi_endpoint(caps.csi_v1));
    env.insert("CSI_VERSION".to_string(), "v1".to_string());
    env.insert("LOG_LEVEL".to_string(), log_level(spec));
    env.insert("LOG_FORMAT".to_string(), "json".to_string());
    if !spec.k8s_distro().is_empty() {
        env.insert("K8S_DISTRO".to_string(), spec.k8s_distro().to_string());
    }
    if spec.tls_etcd_secret_ref().is_some() {
        env.insert(
            "ETCD_TLS_CLIENT_CA".to_string(),
            format!("{ETCD_TLS_MOUNT_PATH}/etcd-client-ca.crt"),
        );
        env.insert(
            "ETCD_TLS_CLIENT_CERT".to_string(),
            format!("{ETCD_TLS_MOUNT_PATH}/etcd-client.crt"),
        );
        env.insert(
            "ETCD_TLS_CLIENT_KEY".to_string(),
            format!("{ETCD_TLS_MOUNT_PATH}/etcd-client.key"),
        );
    }
    env
}

/// Environment of the node agent for the detected agent version.
#[must_use]
pub fn node_env(spec: &StorageOSClusterSpec, caps: &Capabilities) -> BTreeMap<String, String> {
    if caps.node_v2 {
        v2_env(spec, caps)
    } else {
        v1_env(spec, caps)
    }
}

/// The node agent `ConfigMap`.
#[must_use]
pub fn build_node_configmap(spec: &StorageOSClusterSpec, caps: &Capabilities) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(NODE_CONFIGMAP_NAME.to_string()),
            namespace: Some(spec.resource_namespace()),
            labels: Some(kind_labels(KIND_DAEMONSET)),
            ..Default::default()
        },
        data: Some(node_env(spec, caps)),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
