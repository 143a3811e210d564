// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Default `StorageClass` of the cluster.

use crate::capabilities::Capabilities;
use crate::constants::CSI_DRIVER_NAME;
use crate::crd::StorageOSClusterSpec;
use crate::deploy::csi::credential_secrets;
use crate::labels::{kind_labels, KIND_DAEMONSET};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// In-tree provisioner used when CSI is off.
pub const INTREE_PROVISIONER: &str = "kubernetes.io/storageos";

/// `StorageClass` parameters for the active provisioner.
///
/// CSI classes reference the enabled credential secrets, using the v1 or v0
/// parameter names. In-tree classes reference the admin secret.
#[must_use]
pub fn parameters(spec: &StorageOSClusterSpec, caps: &Capabilities) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("fsType".to_string(), "ext4".to_string());

    if caps.csi_enabled {
        let namespace = spec.resource_namespace();
        for secret in credential_secrets(spec) {
            let (name_key, namespace_key) = if caps.csi_v1 {
                (format!("{}-name", secret.v1_prefix), format!("{}-namespace", secret.v1_prefix))
            } else {
                (format!("{}Name", secret.v0_prefix), format!("{}Namespace", secret.v0_prefix))
            };
            params.insert(name_key, secret.name.to_string());
            params.insert(namespace_key, namespace.clone());
        }
    } else {
        params.insert("pool".to_string(), "default".to_string());
        if let Some((name, namespace)) = spec.secret_ref() {
            params.insert("adminSecretName".to_string(), name.to_string());
            params.insert("adminSecretNamespace".to_string(), namespace.to_string());
        }
    }
    params
}

#[must_use]
pub fn build_storage_class(spec: &StorageOSClusterSpec, caps: &Capabilities) -> StorageClass {
    let provisioner = if caps.csi_enabled {
        CSI_DRIVER_NAME
    } else {
        INTREE_PROVISIONER
    };

    StorageClass {
        metadata: ObjectMeta {
            name: Some(spec.storage_class_name()),
            labels: Some(kind_labels(KIND_DAEMONSET)),
            ..Default::default()
        },
        provisioner: provisioner.to_string(),
        parameters: Some(parameters(spec, caps)),
        allow_volume_expansion: (caps.csi_enabled && caps.csi_resizer).then_some(true),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "storageclass_tests.rs"]
mod storageclass_tests;
