// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for StorageOS.
//!
//! # Resource Types
//!
//! - [`StorageOSCluster`] - A StorageOS cluster: node `DaemonSet`, CSI helpers,
//!   api-manager, scheduler extender and `StorageClass`
//! - [`NFSServer`] - An NFS export backed by a StorageOS volume
//! - [`StorageOSUpgrade`] - A one-shot node image upgrade
//! - [`StorageOSJob`] - A `DaemonSet` job whose completion is read from pod logs
//!
//! # Defaults
//!
//! Every optional field has an accessor that returns the effective value. Empty
//! strings count as unset, so clearing a field in the manifest resets it to the
//! default on the next reconcile. [`StorageOSClusterSpec::with_defaults`]
//! returns a copy with all defaults written out, which the cluster reconciler
//! persists.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: storageos.com/v1
//! kind: StorageOSCluster
//! metadata:
//!   name: example-storageos
//!   namespace: default
//! spec:
//!   secretRefName: storageos-api
//!   secretRefNamespace: default
//!   csi:
//!     enable: true
//!   kvBackend:
//!     address: etcd-client.etcd:2379
//! ```

use crate::constants::{
    CSI_HELPER_STATEFULSET, CSI_V0_DRIVER_REGISTRAR_IMAGE, CSI_V0_EXTERNAL_ATTACHER_IMAGE,
    CSI_V0_EXTERNAL_PROVISIONER_IMAGE, CSI_V1_CLUSTER_DRIVER_REGISTRAR_IMAGE,
    CSI_V1_EXTERNAL_ATTACHER_IMAGE, CSI_V1_EXTERNAL_ATTACHER_V2_IMAGE,
    CSI_V1_EXTERNAL_ATTACHER_V3_IMAGE, CSI_V1_EXTERNAL_PROVISIONER_IMAGE,
    CSI_V1_EXTERNAL_RESIZER_IMAGE, CSI_V1_LIVENESS_PROBE_IMAGE,
    CSI_V1_NODE_DRIVER_REGISTRAR_IMAGE, DEFAULT_API_MANAGER_IMAGE,
    DEFAULT_CSI_DEVICE_DIR, DEFAULT_CSI_DRIVER_REGISTRATION_MODE,
    DEFAULT_CSI_DRIVER_REQUIRES_ATTACHMENT, DEFAULT_CSI_ENDPOINT_V0, DEFAULT_CSI_ENDPOINT_V1,
    DEFAULT_CSI_KUBELET_DIR, DEFAULT_CSI_KUBELET_REGISTRATION_PATH_V0,
    DEFAULT_CSI_KUBELET_REGISTRATION_PATH_V1, DEFAULT_CSI_PLUGIN_DIR_V0,
    DEFAULT_CSI_PLUGIN_DIR_V1, DEFAULT_CSI_REGISTRAR_SOCKET_DIR, DEFAULT_CSI_REGISTRATION_DIR,
    DEFAULT_INGRESS_HOSTNAME, DEFAULT_INIT_IMAGE, DEFAULT_JOB_COMPLETION_WORD,
    DEFAULT_JOB_LABEL_SELECTOR, DEFAULT_KUBE_SCHEDULER_IMAGE, DEFAULT_KV_BACKEND,
    DEFAULT_NAMESPACE, DEFAULT_NFS_IMAGE, DEFAULT_NODE_IMAGE, DEFAULT_SERVICE_EXTERNAL_PORT,
    DEFAULT_SERVICE_INTERNAL_PORT, DEFAULT_SERVICE_NAME, DEFAULT_SERVICE_TYPE,
    DEFAULT_STORAGE_CLASS_NAME, NFS_DEFAULT_ACCESS_MODE, NFS_DEFAULT_CAPACITY,
    NFS_DEFAULT_SQUASH, OLD_CSI_REGISTRATION_DIR,
};
use k8s_openapi::api::core::v1::{
    NodeSelectorTerm, PersistentVolumeClaimVolumeSource, ResourceRequirements, Toleration,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Returns the string if it is set and non-empty.
fn set(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// Effective string value: the field when set and non-empty, else the default.
fn or_default(value: Option<&String>, default: &str) -> String {
    set(value).unwrap_or(default).to_string()
}

// ============================================================================
// StorageOSCluster
// ============================================================================

/// `StorageOSCluster` describes a StorageOS installation.
///
/// Only one `StorageOSCluster` is managed at a time. Additional objects are
/// rejected with a `FailedCreation` event until the active one is deleted.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "storageos.com",
    version = "v1",
    kind = "StorageOSCluster",
    namespaced,
    shortname = "stos",
    doc = "StorageOSCluster deploys and manages a StorageOS cluster: node agents, CSI helpers, api-manager, scheduler extender and the default StorageClass."
)]
#[kube(status = "StorageOSClusterStatus")]
#[kube(printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.ready"}"#)]
#[kube(printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
#[serde(rename_all = "camelCase")]
pub struct StorageOSClusterSpec {
    /// Comma separated list of node addresses used by nodes to find peers.
    ///
    /// Computed by the operator from node selection and tolerations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,

    /// CSI configuration
    #[serde(default)]
    pub csi: StorageOSClusterCSI,

    /// Namespace the cluster resources are deployed into (default `kube-system`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// StorageOS API `Service` configuration
    #[serde(default)]
    pub service: StorageOSClusterService,

    /// Name of the secret holding the admin credentials (`apiUsername` / `apiPassword`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref_name: Option<String>,

    /// Namespace of the admin credential secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref_namespace: Option<String>,

    /// Host directory shared with containerised kubelets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_dir: Option<String>,

    /// Ingress configuration for the StorageOS API
    #[serde(default)]
    pub ingress: StorageOSClusterIngress,

    /// Container image overrides
    #[serde(default)]
    pub images: ContainerImages,

    /// KV store backend
    #[serde(default)]
    pub kv_backend: StorageOSClusterKVBackend,

    /// Stop reconciling this cluster
    #[serde(default)]
    pub pause: bool,

    /// Enable debug logging on the nodes
    #[serde(default)]
    pub debug: bool,

    /// Node selection, only `In` and `NotIn` operators are supported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector_terms: Option<Vec<NodeSelectorTerm>>,

    /// Tolerations applied to the node pods and used for node selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,

    /// Resource requirements of the node container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Disable pod fencing
    #[serde(default)]
    pub disable_fencing: bool,

    /// Disable telemetry reports
    #[serde(default)]
    pub disable_telemetry: bool,

    /// Disable TCMU and use FUSE for the device presentation
    #[serde(default, rename = "disableTCMU")]
    pub disable_tcmu: bool,

    /// Fail node startup when TCMU is not available
    #[serde(default, rename = "forceTCMU")]
    pub force_tcmu: bool,

    /// Do not deploy the scheduler extender
    #[serde(default)]
    pub disable_scheduler: bool,

    /// Name of the secret holding etcd client TLS material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_etcd_secret_ref_name: Option<String>,

    /// Namespace of the etcd TLS secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_etcd_secret_ref_namespace: Option<String>,

    /// Kubernetes distribution hint (e.g. `openshift`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k8s_distro: Option<String>,

    /// Name of the default `StorageClass` (default `fast`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
}

/// CSI settings of a `StorageOSCluster`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageOSClusterCSI {
    /// Enable CSI (always on for v2 node images)
    #[serde(default)]
    pub enable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub enable_provision_creds: bool,
    #[serde(default)]
    pub enable_controller_publish_creds: bool,
    #[serde(default)]
    pub enable_node_publish_creds: bool,
    #[serde(default)]
    pub enable_controller_expand_creds: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrar_socket_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelet_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelet_registration_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_registration_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_requires_attachment: Option<String>,
    /// `statefulset` (default) or `deployment`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_strategy: Option<String>,
}

/// StorageOS API `Service` settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageOSClusterService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Ingress settings for the StorageOS API.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageOSClusterIngress {
    #[serde(default)]
    pub enable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Serve TLS using the certificate in the admin secret
    #[serde(default)]
    pub tls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Container image overrides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerImages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csi_node_driver_registrar_container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csi_cluster_driver_registrar_container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csi_external_provisioner_container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csi_external_attacher_container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csi_external_resizer_container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csi_liveness_probe_container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_scheduler_container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfs_container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_manager_container: Option<String>,
}

/// KV store backend settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageOSClusterKVBackend {
    /// Address of the external KV store (etcd endpoints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Backend name (`embedded` or `etcd`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

/// Phase of a `StorageOSCluster`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ClusterPhase {
    #[default]
    Initial,
    Creating,
    Running,
}

/// Ready and unready member addresses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MembersStatus {
    #[serde(default)]
    pub ready: Vec<String>,
    #[serde(default)]
    pub unready: Vec<String>,
}

/// Legacy per-node health report, kept for compatibility with older clients.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeHealth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directfs_initiator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kv_write: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nats: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdb: Option<String>,
}

/// `StorageOSCluster` status
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageOSClusterStatus {
    #[serde(default)]
    pub phase: ClusterPhase,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_health_status: BTreeMap<String, NodeHealth>,
    /// Names of the nodes selected for the cluster
    #[serde(default)]
    pub nodes: Vec<String>,
    /// `ready/total` display string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<String>,
    #[serde(default)]
    pub members: MembersStatus,
}

impl StorageOSClusterSpec {
    /// Namespace the cluster resources live in.
    #[must_use]
    pub fn resource_namespace(&self) -> String {
        or_default(self.namespace.as_ref(), DEFAULT_NAMESPACE)
    }

    #[must_use]
    pub fn service_name(&self) -> String {
        or_default(self.service.name.as_ref(), DEFAULT_SERVICE_NAME)
    }

    #[must_use]
    pub fn service_type(&self) -> String {
        or_default(self.service.type_.as_ref(), DEFAULT_SERVICE_TYPE)
    }

    #[must_use]
    pub fn service_external_port(&self) -> i32 {
        match self.service.external_port {
            Some(port) if port > 0 => port,
            _ => DEFAULT_SERVICE_EXTERNAL_PORT,
        }
    }

    #[must_use]
    pub fn service_internal_port(&self) -> i32 {
        match self.service.internal_port {
            Some(port) if port > 0 => port,
            _ => DEFAULT_SERVICE_INTERNAL_PORT,
        }
    }

    #[must_use]
    pub fn ingress_hostname(&self) -> String {
        or_default(self.ingress.hostname.as_ref(), DEFAULT_INGRESS_HOSTNAME)
    }

    #[must_use]
    pub fn storage_class_name(&self) -> String {
        or_default(self.storage_class_name.as_ref(), DEFAULT_STORAGE_CLASS_NAME)
    }

    #[must_use]
    pub fn kv_backend(&self) -> String {
        or_default(self.kv_backend.backend.as_ref(), DEFAULT_KV_BACKEND)
    }

    #[must_use]
    pub fn kv_address(&self) -> Option<&str> {
        set(self.kv_backend.address.as_ref())
    }

    /// Admin credential secret reference, when both name and namespace are set.
    #[must_use]
    pub fn secret_ref(&self) -> Option<(&str, &str)> {
        Some((
            set(self.secret_ref_name.as_ref())?,
            set(self.secret_ref_namespace.as_ref())?,
        ))
    }

    /// etcd TLS secret reference, when both name and namespace are set.
    #[must_use]
    pub fn tls_etcd_secret_ref(&self) -> Option<(&str, &str)> {
        Some((
            set(self.tls_etcd_secret_ref_name.as_ref())?,
            set(self.tls_etcd_secret_ref_namespace.as_ref())?,
        ))
    }

    #[must_use]
    pub fn shared_dir(&self) -> Option<&str> {
        set(self.shared_dir.as_ref())
    }

    #[must_use]
    pub fn k8s_distro(&self) -> &str {
        set(self.k8s_distro.as_ref()).unwrap_or_default()
    }

    #[must_use]
    pub fn join(&self) -> &str {
        set(self.join.as_ref()).unwrap_or_default()
    }

    #[must_use]
    pub fn tolerations(&self) -> &[Toleration] {
        self.tolerations.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn node_selector_terms(&self) -> &[NodeSelectorTerm] {
        self.node_selector_terms.as_deref().unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn node_container_image(&self) -> String {
        or_default(self.images.node_container.as_ref(), DEFAULT_NODE_IMAGE)
    }

    #[must_use]
    pub fn init_container_image(&self) -> String {
        or_default(self.images.init_container.as_ref(), DEFAULT_INIT_IMAGE)
    }

    #[must_use]
    pub fn csi_node_driver_registrar_image(&self, csi_v1: bool) -> String {
        let default = if csi_v1 {
            CSI_V1_NODE_DRIVER_REGISTRAR_IMAGE
        } else {
            CSI_V0_DRIVER_REGISTRAR_IMAGE
        };
        or_default(self.images.csi_node_driver_registrar_container.as_ref(), default)
    }

    #[must_use]
    pub fn csi_cluster_driver_registrar_image(&self) -> String {
        or_default(
            self.images.csi_cluster_driver_registrar_container.as_ref(),
            CSI_V1_CLUSTER_DRIVER_REGISTRAR_IMAGE,
        )
    }

    #[must_use]
    pub fn csi_external_provisioner_image(&self, csi_v1: bool) -> String {
        let default = if csi_v1 {
            CSI_V1_EXTERNAL_PROVISIONER_IMAGE
        } else {
            CSI_V0_EXTERNAL_PROVISIONER_IMAGE
        };
        or_default(self.images.csi_external_provisioner_container.as_ref(), default)
    }

    /// External attacher image. Newer attachers are picked by server version.
    #[must_use]
    pub fn csi_external_attacher_image(&self, csi_v1: bool, v2: bool, v3: bool) -> String {
        let default = match (csi_v1, v2, v3) {
            (false, _, _) => CSI_V0_EXTERNAL_ATTACHER_IMAGE,
            (true, _, true) => CSI_V1_EXTERNAL_ATTACHER_V3_IMAGE,
            (true, true, false) => CSI_V1_EXTERNAL_ATTACHER_V2_IMAGE,
            (true, false, false) => CSI_V1_EXTERNAL_ATTACHER_IMAGE,
        };
        or_default(self.images.csi_external_attacher_container.as_ref(), default)
    }

    #[must_use]
    pub fn csi_external_resizer_image(&self) -> String {
        or_default(
            self.images.csi_external_resizer_container.as_ref(),
            CSI_V1_EXTERNAL_RESIZER_IMAGE,
        )
    }

    #[must_use]
    pub fn csi_liveness_probe_image(&self) -> String {
        or_default(
            self.images.csi_liveness_probe_container.as_ref(),
            CSI_V1_LIVENESS_PROBE_IMAGE,
        )
    }

    #[must_use]
    pub fn kube_scheduler_image(&self) -> String {
        or_default(
            self.images.kube_scheduler_container.as_ref(),
            DEFAULT_KUBE_SCHEDULER_IMAGE,
        )
    }

    #[must_use]
    pub fn nfs_container_image(&self) -> String {
        or_default(self.images.nfs_container.as_ref(), DEFAULT_NFS_IMAGE)
    }

    #[must_use]
    pub fn api_manager_image(&self) -> String {
        or_default(
            self.images.api_manager_container.as_ref(),
            DEFAULT_API_MANAGER_IMAGE,
        )
    }

    // ------------------------------------------------------------------------
    // CSI paths
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn csi_endpoint(&self, csi_v1: bool) -> String {
        let default = if csi_v1 {
            DEFAULT_CSI_ENDPOINT_V1
        } else {
            DEFAULT_CSI_ENDPOINT_V0
        };
        or_default(self.csi.endpoint.as_ref(), default)
    }

    #[must_use]
    pub fn csi_registrar_socket_dir(&self) -> String {
        or_default(
            self.csi.registrar_socket_dir.as_ref(),
            DEFAULT_CSI_REGISTRAR_SOCKET_DIR,
        )
    }

    #[must_use]
    pub fn csi_kubelet_dir(&self) -> String {
        or_default(self.csi.kubelet_dir.as_ref(), DEFAULT_CSI_KUBELET_DIR)
    }

    #[must_use]
    pub fn csi_plugin_dir(&self, csi_v1: bool) -> String {
        let default = if csi_v1 {
            DEFAULT_CSI_PLUGIN_DIR_V1
        } else {
            DEFAULT_CSI_PLUGIN_DIR_V0
        };
        or_default(self.csi.plugin_dir.as_ref(), default)
    }

    #[must_use]
    pub fn csi_device_dir(&self) -> String {
        or_default(self.csi.device_dir.as_ref(), DEFAULT_CSI_DEVICE_DIR)
    }

    /// Kubelet plugin registration directory. Kubelets without the plugin
    /// watcher use the old `plugins` directory.
    #[must_use]
    pub fn csi_registration_dir(&self, plugin_watcher: bool) -> String {
        let default = if plugin_watcher {
            DEFAULT_CSI_REGISTRATION_DIR
        } else {
            OLD_CSI_REGISTRATION_DIR
        };
        or_default(self.csi.registration_dir.as_ref(), default)
    }

    #[must_use]
    pub fn csi_kubelet_registration_path(&self, csi_v1: bool) -> String {
        let default = if csi_v1 {
            DEFAULT_CSI_KUBELET_REGISTRATION_PATH_V1
        } else {
            DEFAULT_CSI_KUBELET_REGISTRATION_PATH_V0
        };
        or_default(self.csi.kubelet_registration_path.as_ref(), default)
    }

    #[must_use]
    pub fn csi_driver_registration_mode(&self) -> String {
        or_default(
            self.csi.driver_registration_mode.as_ref(),
            DEFAULT_CSI_DRIVER_REGISTRATION_MODE,
        )
    }

    #[must_use]
    pub fn csi_driver_requires_attachment(&self) -> String {
        or_default(
            self.csi.driver_requires_attachment.as_ref(),
            DEFAULT_CSI_DRIVER_REQUIRES_ATTACHMENT,
        )
    }

    /// CSI helper workload kind, `statefulset` unless set otherwise.
    #[must_use]
    pub fn csi_deployment_strategy(&self) -> String {
        or_default(
            self.csi.deployment_strategy.as_ref(),
            CSI_HELPER_STATEFULSET,
        )
    }

    /// Returns a copy with every defaultable field written out.
    ///
    /// The result is a pure function of `self` and `csi_v1`, and applying it
    /// twice gives the same value. Attacher and resizer images are left alone
    /// because their defaults depend on the server version, not only on CSI v1.
    ///
    /// # Arguments
    ///
    /// * `csi_v1` - Whether the API server supports CSI v1
    #[must_use]
    pub fn with_defaults(&self, csi_v1: bool) -> Self {
        let mut spec = self.clone();

        spec.namespace = Some(self.resource_namespace());
        spec.storage_class_name = Some(self.storage_class_name());

        spec.service.name = Some(self.service_name());
        spec.service.type_ = Some(self.service_type());
        spec.service.external_port = Some(self.service_external_port());
        spec.service.internal_port = Some(self.service_internal_port());

        if spec.ingress.enable {
            spec.ingress.hostname = Some(self.ingress_hostname());
        }

        spec.images.node_container = Some(self.node_container_image());
        spec.images.init_container = Some(self.init_container_image());
        spec.images.kube_scheduler_container = Some(self.kube_scheduler_image());
        spec.images.api_manager_container = Some(self.api_manager_image());
        spec.images.nfs_container = Some(self.nfs_container_image());

        if spec.csi.enable {
            spec.images.csi_node_driver_registrar_container =
                Some(self.csi_node_driver_registrar_image(csi_v1));
            spec.images.csi_external_provisioner_container =
                Some(self.csi_external_provisioner_image(csi_v1));
            if csi_v1 {
                spec.images.csi_cluster_driver_registrar_container =
                    Some(self.csi_cluster_driver_registrar_image());
                spec.images.csi_liveness_probe_container = Some(self.csi_liveness_probe_image());
            }
        }

        spec
    }
}

// ============================================================================
// NFSServer
// ============================================================================

/// `NFSServer` exports a StorageOS volume over NFS.
///
/// The server runs as a single replica `StatefulSet` fronted by a `Service`.
/// It requires a `StorageOSCluster` in the `Running` phase.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "storageos.com",
    version = "v1",
    kind = "NFSServer",
    namespaced,
    doc = "NFSServer runs an NFS export backed by a StorageOS volume."
)]
#[kube(status = "NFSServerStatus")]
#[kube(printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#)]
#[kube(printcolumn = r#"{"name":"Capacity","type":"string","jsonPath":".spec.resources.requests.storage"}"#)]
#[kube(printcolumn = r#"{"name":"Target","type":"string","jsonPath":".status.remoteTarget"}"#)]
#[kube(printcolumn = r#"{"name":"Access Modes","type":"string","jsonPath":".status.accessModes"}"#)]
#[serde(rename_all = "camelCase")]
pub struct NFSServerSpec {
    /// `StorageClass` of the backing volume, inherited from the cluster if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,

    /// Resource requirements; `requests.storage` sizes the dynamic volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// NFS server container image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfs_container: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub export: ExportSpec,

    /// Existing claim to export instead of a dynamically provisioned one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_options: Option<Vec<String>>,
}

/// A single NFS export.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub server: ServerSpec,
}

/// Export access settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerSpec {
    /// `ReadWrite` (default) or `ReadOnly`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_mode: Option<String>,
    /// `none` (default), `rootid`, `root` or `all`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squash: Option<String>,
}

/// Phase of an `NFSServer`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum NFSServerPhase {
    #[default]
    Unknown,
    Pending,
    Running,
}

/// `NFSServer` status
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NFSServerStatus {
    #[serde(default)]
    pub phase: NFSServerPhase,
    /// Cluster IP of the NFS `Service`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_target: Option<String>,
    /// `ReadWriteMany` or `ReadOnlyMany`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_modes: Option<String>,
}

impl NFSServerSpec {
    #[must_use]
    pub fn export_name(&self, server_name: &str) -> String {
        or_default(self.export.name.as_ref(), server_name)
    }

    #[must_use]
    pub fn access_mode(&self) -> String {
        or_default(self.export.server.access_mode.as_ref(), NFS_DEFAULT_ACCESS_MODE)
    }

    /// Kubernetes access mode string matching the export access mode.
    #[must_use]
    pub fn access_modes(&self) -> String {
        if self.access_mode().eq_ignore_ascii_case("readonly") {
            "ReadOnlyMany".to_string()
        } else {
            "ReadWriteMany".to_string()
        }
    }

    #[must_use]
    pub fn squash(&self) -> String {
        or_default(self.export.server.squash.as_ref(), NFS_DEFAULT_SQUASH)
    }

    #[must_use]
    pub fn container_image(&self, cluster_default: &str) -> String {
        or_default(self.nfs_container.as_ref(), cluster_default)
    }

    /// `StorageClass` of the backing volume, falling back to the cluster's.
    #[must_use]
    pub fn storage_class_name(&self, cluster_default: &str) -> String {
        or_default(self.storage_class_name.as_ref(), cluster_default)
    }

    /// Requested size of the dynamically provisioned volume.
    #[must_use]
    pub fn capacity(&self) -> String {
        self.resources
            .as_ref()
            .and_then(|r| r.requests.as_ref())
            .and_then(|req| req.get("storage"))
            .map(|q| q.0.clone())
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| NFS_DEFAULT_CAPACITY.to_string())
    }

    #[must_use]
    pub fn tolerations(&self) -> &[Toleration] {
        self.tolerations.as_deref().unwrap_or_default()
    }
}

// ============================================================================
// StorageOSUpgrade
// ============================================================================

/// `StorageOSUpgrade` upgrades the node image of the running cluster.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "storageos.com",
    version = "v1",
    kind = "StorageOSUpgrade",
    namespaced,
    doc = "StorageOSUpgrade pauses the active StorageOS cluster, runs the upgrader job and switches the cluster to the new node image."
)]
#[kube(status = "StorageOSUpgradeStatus")]
#[kube(printcolumn = r#"{"name":"Completed","type":"boolean","jsonPath":".status.completed"}"#)]
#[serde(rename_all = "camelCase")]
pub struct StorageOSUpgradeSpec {
    /// Node container image to upgrade to
    pub new_image: String,
}

/// `StorageOSUpgrade` status
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageOSUpgradeStatus {
    #[serde(default)]
    pub completed: bool,
}

// ============================================================================
// Job
// ============================================================================

/// StorageOS `Job` runs a command on every selected node through a `DaemonSet`.
///
/// The job is complete once every pod's log contains the completion word.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "storageos.com",
    version = "v1",
    kind = "Job",
    root = "StorageOSJob",
    namespaced,
    doc = "Job runs a container on every selected node and completes when all pod logs contain the completion word."
)]
#[kube(status = "StorageOSJobStatus")]
#[kube(printcolumn = r#"{"name":"Completed","type":"boolean","jsonPath":".status.completed"}"#)]
#[serde(rename_all = "camelCase")]
pub struct StorageOSJobSpec {
    /// Container image of the job
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// Mount path of the host directory inside the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,

    /// Host directory mounted into the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_path: Option<String>,

    /// Log marker that signals completion (default `done`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_word: Option<String>,

    /// `key=value` labels applied to the job pods (default `daemonset-job=true`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector_terms: Option<Vec<NodeSelectorTerm>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,
}

/// StorageOS `Job` status
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageOSJobStatus {
    #[serde(default)]
    pub completed: bool,
}

impl StorageOSJobSpec {
    #[must_use]
    pub fn completion_word(&self) -> String {
        or_default(self.completion_word.as_ref(), DEFAULT_JOB_COMPLETION_WORD)
    }

    #[must_use]
    pub fn label_selector(&self) -> String {
        or_default(self.label_selector.as_ref(), DEFAULT_JOB_LABEL_SELECTOR)
    }

    /// Pod labels parsed from the comma separated `key=value` selector.
    ///
    /// Entries without `=` are ignored.
    #[must_use]
    pub fn pod_labels(&self) -> BTreeMap<String, String> {
        self.label_selector()
            .split(',')
            .filter_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                let key = key.trim();
                (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
