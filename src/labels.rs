// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and finalizer constants.
//!
//! Every object the operator creates carries `app=storageos` plus a
//! kind-specific label so objects can be grouped and cleaned up by selector.

use std::collections::BTreeMap;

// ============================================================================
// Labels
// ============================================================================

/// Application label present on every generated object
pub const APP_LABEL: &str = "app";

/// Value of the application label
pub const APP_STORAGEOS: &str = "storageos";

/// Kind-specific label (daemonset, csi-helper, scheduler, ...)
pub const KIND_LABEL: &str = "kind";

/// Label carried by NFS server pods and services
pub const NFS_SERVER_LABEL: &str = "nfsserver";

/// Label that opts a pod into StorageOS fencing
pub const FENCED_LABEL: &str = "storageos.com/fenced";

/// Standard label for the tool managing the resource
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of `app.kubernetes.io/managed-by`
pub const MANAGED_BY_OPERATOR: &str = "storageos-operator";

// ============================================================================
// Kind label values
// ============================================================================

pub const KIND_DAEMONSET: &str = "daemonset";
pub const KIND_CSI_HELPER: &str = "csi-helper";
pub const KIND_API_MANAGER: &str = "api-manager";
pub const KIND_SCHEDULER: &str = "storageos-scheduler";
pub const KIND_UPGRADER: &str = "upgrader";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer for `NFSServer` resources
pub const FINALIZER_NFS_SERVER: &str = "finalizer.nfsserver.storageos.com";

/// Base label set for objects owned by a StorageOS cluster.
#[must_use]
pub fn base_labels() -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(APP_LABEL.into(), APP_STORAGEOS.into());
    labels.insert(K8S_MANAGED_BY.into(), MANAGED_BY_OPERATOR.into());
    labels
}

/// Base labels plus the kind-specific label.
#[must_use]
pub fn kind_labels(kind: &str) -> BTreeMap<String, String> {
    let mut labels = base_labels();
    labels.insert(KIND_LABEL.into(), kind.into());
    labels
}

/// Selector labels for pods of a given kind. Only immutable keys are used.
#[must_use]
pub fn selector_labels(kind: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(APP_LABEL.into(), APP_STORAGEOS.into());
    labels.insert(KIND_LABEL.into(), kind.into());
    labels
}
