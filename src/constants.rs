// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the StorageOS operator.
//!
//! Resource names in this module are part of the upgrade contract with
//! existing installations: objects created by earlier operator releases are
//! found, updated and deleted by these exact names.

// ============================================================================
// Kinds
// ============================================================================

/// Kind name for `StorageOSCluster` resource
pub const KIND_STORAGEOS_CLUSTER: &str = "StorageOSCluster";

/// Kind name for `NFSServer` resource
pub const KIND_NFS_SERVER: &str = "NFSServer";

/// Kind name for `StorageOSUpgrade` resource
pub const KIND_STORAGEOS_UPGRADE: &str = "StorageOSUpgrade";

/// Kind name for the StorageOS `Job` resource
pub const KIND_STORAGEOS_JOB: &str = "Job";

/// Field manager / reporting controller name
pub const CONTROLLER_NAME: &str = "storageos-operator";

// ============================================================================
// Controller Timing Constants
// ============================================================================

/// Fixed requeue period applied after every reconcile
pub const DEFAULT_REQUEUE_SECS: u64 = 15;

/// Upper bound for the startup webhook migration
pub const MIGRATION_TIMEOUT_SECS: u64 = 20;

/// TCP dial timeout for node health probes
pub const HEALTH_PROBE_TIMEOUT_SECS: u64 = 1;

/// Default namespace the operator itself runs in
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "storageos-operator";

// ============================================================================
// Cluster Defaults
// ============================================================================

/// Namespace the cluster resources are deployed into when unset
pub const DEFAULT_NAMESPACE: &str = "kube-system";

/// Default StorageClass name
pub const DEFAULT_STORAGE_CLASS_NAME: &str = "fast";

/// Default Service name
pub const DEFAULT_SERVICE_NAME: &str = "storageos";

/// Default Service type
pub const DEFAULT_SERVICE_TYPE: &str = "ClusterIP";

/// Default Service external port
pub const DEFAULT_SERVICE_EXTERNAL_PORT: i32 = 5705;

/// Default Service internal port
pub const DEFAULT_SERVICE_INTERNAL_PORT: i32 = 5705;

/// Default ingress hostname
pub const DEFAULT_INGRESS_HOSTNAME: &str = "storageos.local";

/// StorageOS API port on every node
pub const STORAGEOS_API_PORT: u16 = 5705;

/// Default KV backend for v1 nodes
pub const DEFAULT_KV_BACKEND: &str = "embedded";

/// Admin username used when no credential secret is referenced
pub const DEFAULT_ADMIN_USERNAME: &str = "storageos";

/// Admin password used when no credential secret is referenced
pub const DEFAULT_ADMIN_PASSWORD: &str = "storageos";

/// Namespace name whose pods get the node-critical priority class
pub const SYSTEM_NAMESPACE: &str = "kube-system";

/// Priority class applied to node pods in the system namespace
pub const NODE_PRIORITY_CLASS: &str = "system-node-critical";

/// Priority class applied to cluster-level helper pods in the system namespace
pub const CLUSTER_PRIORITY_CLASS: &str = "system-cluster-critical";

// ============================================================================
// CSI Defaults
// ============================================================================

/// CSI driver name registered with the kubelet
pub const CSI_DRIVER_NAME: &str = "storageos";

/// Default CSI endpoint for CSI v0
pub const DEFAULT_CSI_ENDPOINT_V0: &str = "unix://var/lib/kubelet/plugins/storageos/csi.sock";

/// Default CSI endpoint for CSI v1
pub const DEFAULT_CSI_ENDPOINT_V1: &str =
    "unix://var/lib/kubelet/plugins_registry/storageos/csi.sock";

/// Default registrar socket directory
pub const DEFAULT_CSI_REGISTRAR_SOCKET_DIR: &str = "/var/lib/kubelet/device-plugins/";

/// Default kubelet directory
pub const DEFAULT_CSI_KUBELET_DIR: &str = "/var/lib/kubelet";

/// Default plugin directory for CSI v0
pub const DEFAULT_CSI_PLUGIN_DIR_V0: &str = "/var/lib/kubelet/plugins/storageos/";

/// Default plugin directory for CSI v1
pub const DEFAULT_CSI_PLUGIN_DIR_V1: &str = "/var/lib/kubelet/plugins_registry/storageos/";

/// Default device directory
pub const DEFAULT_CSI_DEVICE_DIR: &str = "/dev";

/// Plugin registration directory for kubelets with the plugin watcher
pub const DEFAULT_CSI_REGISTRATION_DIR: &str = "/var/lib/kubelet/plugins_registry";

/// Plugin registration directory for kubelets before the plugin watcher
pub const OLD_CSI_REGISTRATION_DIR: &str = "/var/lib/kubelet/plugins";

/// Default kubelet registration path for CSI v0
pub const DEFAULT_CSI_KUBELET_REGISTRATION_PATH_V0: &str =
    "/var/lib/kubelet/plugins/storageos/csi.sock";

/// Default kubelet registration path for CSI v1
pub const DEFAULT_CSI_KUBELET_REGISTRATION_PATH_V1: &str =
    "/var/lib/kubelet/plugins_registry/storageos/csi.sock";

/// Default driver registration mode
pub const DEFAULT_CSI_DRIVER_REGISTRATION_MODE: &str = "node-register";

/// Default driver-requires-attachment flag
pub const DEFAULT_CSI_DRIVER_REQUIRES_ATTACHMENT: &str = "true";

/// CSI helper deployed as a `StatefulSet` (backwards compatible default)
pub const CSI_HELPER_STATEFULSET: &str = "statefulset";

/// CSI helper deployed as a `Deployment`
pub const CSI_HELPER_DEPLOYMENT: &str = "deployment";

/// Socket address inside CSI sidecar containers
pub const CSI_SIDECAR_ADDRESS: &str = "/csi/csi.sock";

// ============================================================================
// Default Images
// ============================================================================

pub const DEFAULT_NODE_IMAGE: &str = "storageos/node:1.5.3";
pub const DEFAULT_INIT_IMAGE: &str = "storageos/init:1.0.0";
pub const DEFAULT_NFS_IMAGE: &str = "storageos/nfs:1.0.0";
pub const DEFAULT_API_MANAGER_IMAGE: &str = "storageos/api-manager:v1.0.0";
pub const DEFAULT_UPGRADER_IMAGE: &str = "storageos/upgrader:v0.1.0";
pub const DEFAULT_KUBE_SCHEDULER_IMAGE: &str = "k8s.gcr.io/kube-scheduler:v1.17.0";

pub const CSI_V0_DRIVER_REGISTRAR_IMAGE: &str = "quay.io/k8scsi/driver-registrar:v0.4.2";
pub const CSI_V0_EXTERNAL_PROVISIONER_IMAGE: &str = "storageos/csi-provisioner:v0.4.3";
pub const CSI_V0_EXTERNAL_ATTACHER_IMAGE: &str = "quay.io/k8scsi/csi-attacher:v0.4.2";

pub const CSI_V1_CLUSTER_DRIVER_REGISTRAR_IMAGE: &str =
    "quay.io/k8scsi/csi-cluster-driver-registrar:v1.0.1";
pub const CSI_V1_NODE_DRIVER_REGISTRAR_IMAGE: &str =
    "quay.io/k8scsi/csi-node-driver-registrar:v1.0.1";
pub const CSI_V1_EXTERNAL_PROVISIONER_IMAGE: &str = "storageos/csi-provisioner:v1.4.0";
pub const CSI_V1_EXTERNAL_ATTACHER_IMAGE: &str = "quay.io/k8scsi/csi-attacher:v1.0.1";
pub const CSI_V1_EXTERNAL_ATTACHER_V2_IMAGE: &str = "quay.io/k8scsi/csi-attacher:v2.2.0";
pub const CSI_V1_EXTERNAL_ATTACHER_V3_IMAGE: &str = "quay.io/k8scsi/csi-attacher:v3.1.0";
pub const CSI_V1_EXTERNAL_RESIZER_IMAGE: &str = "quay.io/k8scsi/csi-resizer:v0.5.0";
pub const CSI_V1_LIVENESS_PROBE_IMAGE: &str = "quay.io/k8scsi/livenessprobe:v1.0.1";

// ============================================================================
// Generated Resource Names
// ============================================================================

pub const DAEMONSET_NAME: &str = "storageos-daemonset";
pub const DAEMONSET_SERVICE_ACCOUNT: &str = "storageos-daemonset-sa";

pub const CSI_HELPER_STATEFULSET_NAME: &str = "storageos-statefulset";
pub const CSI_HELPER_STATEFULSET_SERVICE_ACCOUNT: &str = "storageos-statefulset-sa";
pub const CSI_HELPER_DEPLOYMENT_NAME: &str = "storageos-csi-helper";
pub const CSI_HELPER_DEPLOYMENT_SERVICE_ACCOUNT: &str = "storageos-csi-helper-sa";

pub const API_MANAGER_NAME: &str = "storageos-api-manager";
pub const API_MANAGER_SERVICE_ACCOUNT: &str = "storageos-api-manager-sa";
pub const API_MANAGER_METRICS_NAME: &str = "storageos-api-manager-metrics";
pub const API_MANAGER_METRICS_PORT: i32 = 8080;
pub const API_MANAGER_WEBHOOK_PORT: i32 = 9443;

pub const WEBHOOK_SERVICE_NAME: &str = "storageos-webhook";
pub const MUTATING_WEBHOOK_CONFIG_NAME: &str = "storageos-mutating-webhook";
pub const POD_MUTATOR_WEBHOOK_NAME: &str = "pod-mutator.storageos.com";
pub const POD_MUTATOR_WEBHOOK_PATH: &str = "/mutate-pods";

pub const SCHEDULER_NAME: &str = "storageos-scheduler";
pub const SCHEDULER_SERVICE_ACCOUNT: &str = "storageos-scheduler-sa";
pub const SCHEDULER_POLICY_CONFIGMAP: &str = "storageos-scheduler-policy";
pub const SCHEDULER_CONFIG_CONFIGMAP: &str = "storageos-scheduler-config";

pub const NODE_CONFIGMAP_NAME: &str = "storageos-node-config";
pub const INIT_SECRET_NAME: &str = "init-secret";
pub const TLS_ETCD_SECRET_NAME: &str = "storageos-tls-etcd";
pub const INGRESS_NAME: &str = "storageos-ingress";
pub const INGRESS_TLS_SECRET_NAME: &str = "storageos-tls";

pub const CSI_PROVISION_SECRET_NAME: &str = "csi-provisioner-secret";
pub const CSI_CONTROLLER_PUBLISH_SECRET_NAME: &str = "csi-controller-publish-secret";
pub const CSI_NODE_PUBLISH_SECRET_NAME: &str = "csi-node-publish-secret";
pub const CSI_CONTROLLER_EXPAND_SECRET_NAME: &str = "csi-controller-expand-secret";

// Legacy webhook objects removed by the startup migration.
pub const LEGACY_SCHEDULER_WEBHOOK_NAME: &str = "storageos-scheduler-webhook";

// ============================================================================
// RBAC Names
// ============================================================================

pub const KEY_MANAGEMENT_ROLE: &str = "key-management-role";
pub const KEY_MANAGEMENT_BINDING: &str = "key-management-binding";

pub const CSI_PROVISIONER_CLUSTER_ROLE: &str = "storageos:csi-provisioner";
pub const CSI_PROVISIONER_CLUSTER_BINDING: &str = "storageos:csi-provisioner";
pub const CSI_ATTACHER_CLUSTER_ROLE: &str = "storageos:csi-attacher";
pub const CSI_ATTACHER_CLUSTER_BINDING: &str = "storageos:csi-attacher";
pub const CSI_RESIZER_CLUSTER_ROLE: &str = "storageos:csi-resizer";
pub const CSI_RESIZER_CLUSTER_BINDING: &str = "storageos:csi-resizer";
pub const CSI_DRIVER_REGISTRAR_CLUSTER_ROLE: &str = "storageos:driver-registrar";
pub const CSI_DRIVER_REGISTRAR_CLUSTER_BINDING: &str = "storageos:driver-registrar";
pub const CSI_K8S_DRIVER_REGISTRAR_CLUSTER_BINDING: &str = "storageos:k8s-driver-registrar";

pub const SCHEDULER_CLUSTER_ROLE: &str = "storageos:scheduler-extender";
pub const SCHEDULER_CLUSTER_BINDING: &str = "storageos:scheduler-extender";
pub const NFS_CLUSTER_ROLE: &str = "storageos:nfs-provisioner";
pub const NFS_CLUSTER_BINDING: &str = "storageos:nfs-provisioner";
pub const INIT_CLUSTER_ROLE: &str = "storageos:init";
pub const INIT_CLUSTER_BINDING: &str = "storageos:init";
pub const FENCING_CLUSTER_ROLE: &str = "storageos:pod-fencer";
pub const FENCING_CLUSTER_BINDING: &str = "storageos:pod-fencer";
pub const OPENSHIFT_SCC_CLUSTER_ROLE: &str = "storageos:openshift-scc";
pub const OPENSHIFT_SCC_CLUSTER_BINDING: &str = "storageos:openshift-scc";
pub const API_MANAGER_CLUSTER_ROLE: &str = "storageos:api-manager";
pub const API_MANAGER_CLUSTER_BINDING: &str = "storageos:api-manager";

pub const UPGRADER_NAME: &str = "storageos-upgrader";
pub const UPGRADER_SERVICE_ACCOUNT: &str = "storageos-upgrader-sa";
pub const UPGRADER_CLUSTER_ROLE: &str = "storageos:upgrader";
pub const UPGRADER_CLUSTER_BINDING: &str = "storageos:upgrader";

// ============================================================================
// Secret Keys
// ============================================================================

/// Admin username key in a referenced credential secret
pub const SECRET_API_USERNAME_KEY: &str = "apiUsername";

/// Admin password key in a referenced credential secret
pub const SECRET_API_PASSWORD_KEY: &str = "apiPassword";

/// API address key patched into the admin secret for pre-CSI setups
pub const SECRET_API_ADDRESS_KEY: &str = "apiAddress";

/// Username key in operator generated secrets
pub const SECRET_USERNAME_KEY: &str = "username";

/// Password key in operator generated secrets
pub const SECRET_PASSWORD_KEY: &str = "password";

pub const TLS_CERT_KEY: &str = "tls.crt";
pub const TLS_KEY_KEY: &str = "tls.key";

// ============================================================================
// NFS Constants
// ============================================================================

pub const NFS_PORT: i32 = 2049;
pub const NFS_RPCBIND_PORT: i32 = 111;
pub const NFS_METRICS_PORT: i32 = 9587;
pub const NFS_EXPORT_PATH: &str = "/export";
pub const NFS_CONFIG_PATH: &str = "/nfs-ganesha-config";
pub const NFS_CONFIG_FILENAME: &str = "nfs-ganesha.conf";
pub const NFS_DEFAULT_CAPACITY: &str = "1Gi";
pub const NFS_DEFAULT_ACCESS_MODE: &str = "ReadWrite";
pub const NFS_DEFAULT_SQUASH: &str = "none";

// ============================================================================
// Job Constants
// ============================================================================

pub const DEFAULT_JOB_LABEL_SELECTOR: &str = "daemonset-job=true";
pub const DEFAULT_JOB_COMPLETION_WORD: &str = "done";

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;
