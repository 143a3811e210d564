// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CSI driver registration and controller-side helper pods.
//!
//! The helper runs the external provisioner and attacher sidecars (plus the
//! resizer on 1.16+, and the cluster driver registrar on 1.13 clusters that do
//! not serve `CSIDriver`). It is a `StatefulSet` by default and a `Deployment`
//! when `csi.deploymentStrategy` is `deployment`.

use crate::capabilities::Capabilities;
use crate::constants::{
    CLUSTER_PRIORITY_CLASS, CSI_CONTROLLER_EXPAND_SECRET_NAME, CSI_CONTROLLER_PUBLISH_SECRET_NAME,
    CSI_DRIVER_NAME, CSI_HELPER_DEPLOYMENT, CSI_HELPER_DEPLOYMENT_NAME,
    CSI_HELPER_DEPLOYMENT_SERVICE_ACCOUNT, CSI_HELPER_STATEFULSET_NAME,
    CSI_HELPER_STATEFULSET_SERVICE_ACCOUNT, CSI_NODE_PUBLISH_SECRET_NAME, CSI_PROVISION_SECRET_NAME,
    CSI_SIDECAR_ADDRESS,
};
use crate::crd::StorageOSClusterSpec;
use crate::deploy::node::{
    env_value, host_path_volume, mount, node_affinity, priority_class, tolerations,
};
use crate::labels::{kind_labels, selector_labels, KIND_CSI_HELPER};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::api::storage::v1::{CSIDriver, CSIDriverSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

/// Helper workload kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HelperKind {
    StatefulSet,
    Deployment,
}

impl HelperKind {
    #[must_use]
    pub fn from_spec(spec: &StorageOSClusterSpec) -> Self {
        if spec
            .csi_deployment_strategy()
            .eq_ignore_ascii_case(CSI_HELPER_DEPLOYMENT)
        {
            Self::Deployment
        } else {
            Self::StatefulSet
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::StatefulSet => CSI_HELPER_STATEFULSET_NAME,
            Self::Deployment => CSI_HELPER_DEPLOYMENT_NAME,
        }
    }

    #[must_use]
    pub fn service_account(self) -> &'static str {
        match self {
            Self::StatefulSet => CSI_HELPER_STATEFULSET_SERVICE_ACCOUNT,
            Self::Deployment => CSI_HELPER_DEPLOYMENT_SERVICE_ACCOUNT,
        }
    }
}

/// A CSI credential secret and the `StorageClass` parameter prefixes that point to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CredentialSecret {
    pub name: &'static str,
    /// Parameter prefix on CSI v1, e.g. `csi.storage.k8s.io/provisioner-secret`
    pub v1_prefix: &'static str,
    /// Parameter prefix on CSI v0, e.g. `csiProvisionerSecret`
    pub v0_prefix: &'static str,
}

/// Credential secrets enabled in the spec, in a fixed order.
#[must_use]
pub fn credential_secrets(spec: &StorageOSClusterSpec) -> Vec<CredentialSecret> {
    let all = [
        (
            spec.csi.enable_provision_creds,
            CredentialSecret {
                name: CSI_PROVISION_SECRET_NAME,
                v1_prefix: "csi.storage.k8s.io/provisioner-secret",
                v0_prefix: "csiProvisionerSecret",
            },
        ),
        (
            spec.csi.enable_controller_publish_creds,
            CredentialSecret {
                name: CSI_CONTROLLER_PUBLISH_SECRET_NAME,
                v1_prefix: "csi.storage.k8s.io/controller-publish-secret",
                v0_prefix: "csiControllerPublishSecret",
            },
        ),
        (
            spec.csi.enable_node_publish_creds,
            CredentialSecret {
                name: CSI_NODE_PUBLISH_SECRET_NAME,
                v1_prefix: "csi.storage.k8s.io/node-publish-secret",
                v0_prefix: "csiNodePublishSecret",
            },
        ),
        (
            spec.csi.enable_controller_expand_creds,
            CredentialSecret {
                name: CSI_CONTROLLER_EXPAND_SECRET_NAME,
                v1_prefix: "csi.storage.k8s.io/controller-expand-secret",
                v0_prefix: "csiControllerExpandSecret",
            },
        ),
    ];
    all.into_iter()
        .filter_map(|(enabled, secret)| enabled.then_some(secret))
        .collect()
}

/// Cluster-scoped `CSIDriver` registration.
#[must_use]
pub fn build_csi_driver(spec: &StorageOSClusterSpec) -> CSIDriver {
    CSIDriver {
        metadata: ObjectMeta {
            name: Some(CSI_DRIVER_NAME.to_string()),
            labels: Some(kind_labels(KIND_CSI_HELPER)),
            ..Default::default()
        },
        spec: CSIDriverSpec {
            attach_required: Some(
                spec.csi_driver_requires_attachment()
                    .eq_ignore_ascii_case("true"),
            ),
            pod_info_on_mount: Some(true),
            ..Default::default()
        },
    }
}

fn sidecar(name: &str, image: String, args: Vec<String>) -> Container {
    Container {
        name: name.to_string(),
        image: Some(image),
        image_pull_policy: Some("IfNotPresent".to_string()),
        args: Some(args),
        env: Some(vec![env_value("ADDRESS", CSI_SIDECAR_ADDRESS)]),
        volume_mounts: Some(vec![mount("plugin-dir", "/csi")]),
        ..Default::default()
    }
}

/// Sidecar containers of the helper pod.
#[must_use]
pub fn helper_containers(spec: &StorageOSClusterSpec, caps: &Capabilities) -> Vec<Container> {
    let csi_address = "--csi-address=$(ADDRESS)".to_string();
    let mut containers = vec![
        sidecar(
            "csi-external-provisioner",
            spec.csi_external_provisioner_image(caps.csi_v1),
            vec![
                "--v=5".to_string(),
                format!("--provisioner={CSI_DRIVER_NAME}"),
                csi_address.clone(),
            ],
        ),
        sidecar(
            "csi-external-attacher",
            spec.csi_external_attacher_image(
                caps.csi_v1,
                caps.csi_attacher_v2,
                caps.csi_attacher_v3,
            ),
            vec!["--v=5".to_string(), csi_address.clone()],
        ),
    ];
    if caps.csi_v1 && !caps.csi_driver_kind {
        containers.push(sidecar(
            "csi-driver-k8s-registrar",
            spec.csi_cluster_driver_registrar_image(),
            vec![
                "--v=5".to_string(),
                csi_address.clone(),
                format!("--driver-requires-attachment={}", spec.csi_driver_requires_attachment()),
                "--pod-info-mount-version=v1".to_string(),
            ],
        ));
    }
    if caps.csi_resizer {
        containers.push(sidecar(
            "csi-external-resizer",
            spec.csi_external_resizer_image(),
            vec!["--v=5".to_string(), csi_address],
        ));
    }
    containers
}

fn helper_template(
    spec: &StorageOSClusterSpec,
    caps: &Capabilities,
    kind: HelperKind,
) -> PodTemplateSpec {
    let namespace = spec.resource_namespace();
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(kind_labels(KIND_CSI_HELPER)),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            service_account_name: Some(kind.service_account().to_string()),
            priority_class_name: priority_class(&namespace, CLUSTER_PRIORITY_CLASS),
            containers: helper_containers(spec, caps),
            volumes: Some(vec![host_path_volume(
                "plugin-dir",
                &spec.csi_plugin_dir(caps.csi_v1),
                Some("DirectoryOrCreate"),
            )]),
            tolerations: tolerations(spec.tolerations()),
            affinity: node_affinity(spec.node_selector_terms()),
            ..Default::default()
        }),
    }
}

fn helper_metadata(spec: &StorageOSClusterSpec, kind: HelperKind) -> ObjectMeta {
    ObjectMeta {
        name: Some(kind.name().to_string()),
        namespace: Some(spec.resource_namespace()),
        labels: Some(kind_labels(KIND_CSI_HELPER)),
        ..Default::default()
    }
}

fn helper_selector() -> LabelSelector {
    LabelSelector {
        match_labels: Some(selector_labels(KIND_CSI_HELPER)),
        ..Default::default()
    }
}

#[must_use]
pub fn build_helper_statefulset(spec: &StorageOSClusterSpec, caps: &Capabilities) -> StatefulSet {
    StatefulSet {
        metadata: helper_metadata(spec, HelperKind::StatefulSet),
        spec: Some(StatefulSetSpec {
            replicas: Some(1),
            service_name: spec.service_name().into(),
            selector: helper_selector(),
            template: helper_template(spec, caps, HelperKind::StatefulSet),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[must_use]
pub fn build_helper_deployment(spec: &StorageOSClusterSpec, caps: &Capabilities) -> Deployment {
    Deployment {
        metadata: helper_metadata(spec, HelperKind::Deployment),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: helper_selector(),
            template: helper_template(spec, caps, HelperKind::Deployment),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "csi_tests.rs"]
mod csi_tests;
