// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! NFS-Ganesha configuration for an `NFSServer`.

use crate::constants::{NFS_CONFIG_FILENAME, NFS_EXPORT_PATH};
use crate::crd::NFSServer;
use crate::nfs::server_labels;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

const GANESHA_TEMPLATE: &str = include_str!("../../templates/nfs-ganesha.conf.tmpl");

/// Ganesha `Access_Type` for an export access mode.
fn access_type(access_mode: &str) -> &'static str {
    if access_mode.eq_ignore_ascii_case("readonly") {
        "RO"
    } else {
        "RW"
    }
}

/// Ganesha `Squash` value. Unknown values fall back to no squashing.
fn squash(value: &str) -> &'static str {
    match value.to_lowercase().as_str() {
        "root" | "rootsquash" | "root_squash" => "root_squash",
        "rootid" | "root_id_squash" => "root_id_squash",
        "all" | "allsquash" | "all_squash" => "all_squash",
        _ => "no_root_squash",
    }
}

/// Rendered `nfs-ganesha.conf`.
#[must_use]
pub fn render(server: &NFSServer) -> String {
    let name = server.metadata.name.as_deref().unwrap_or_default();
    GANESHA_TEMPLATE
        .replace("{{EXPORT_PATH}}", NFS_EXPORT_PATH)
        .replace("{{EXPORT_NAME}}", &server.spec.export_name(name))
        .replace("{{ACCESS_TYPE}}", access_type(&server.spec.access_mode()))
        .replace("{{SQUASH}}", squash(&server.spec.squash()))
}

/// `ConfigMap` holding the Ganesha config, named after the server.
#[must_use]
pub fn build_configmap(server: &NFSServer) -> ConfigMap {
    let mut data = BTreeMap::new();
    data.insert(NFS_CONFIG_FILENAME.to_string(), render(server));

    ConfigMap {
        metadata: ObjectMeta {
            name: server.metadata.name.clone(),
            namespace: server.metadata.namespace.clone(),
            labels: Some(server_labels(server)),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
