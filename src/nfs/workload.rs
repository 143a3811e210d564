// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! NFS server `Service`, backing claim and `StatefulSet`.

use crate::constants::{
    NFS_CONFIG_PATH, NFS_EXPORT_PATH, NFS_METRICS_PORT, NFS_PORT, NFS_RPCBIND_PORT,
};
use crate::crd::NFSServer;
use crate::nfs::server_labels;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, ConfigMapVolumeSource, Container, ContainerPort, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec,
    SecurityContext, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

fn metadata(server: &NFSServer) -> ObjectMeta {
    ObjectMeta {
        name: server.metadata.name.clone(),
        namespace: server.metadata.namespace.clone(),
        labels: Some(server_labels(server)),
        annotations: server.spec.annotations.clone(),
        ..Default::default()
    }
}

fn port(name: &str, port: i32, protocol: &str) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        protocol: Some(protocol.to_string()),
        target_port: Some(IntOrString::Int(port)),
        ..Default::default()
    }
}

fn container_port(name: &str, port: i32, protocol: &str) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        protocol: Some(protocol.to_string()),
        ..Default::default()
    }
}

/// `Service` exposing NFS, rpcbind and metrics.
///
/// The selector uses the same merged label set as the pod template.
#[must_use]
pub fn build_service(server: &NFSServer) -> Service {
    Service {
        metadata: metadata(server),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(server_labels(server)),
            ports: Some(vec![
                port("nfs", NFS_PORT, "TCP"),
                port("rpcbind-tcp", NFS_RPCBIND_PORT, "TCP"),
                port("rpcbind-udp", NFS_RPCBIND_PORT, "UDP"),
                port("metrics", NFS_METRICS_PORT, "TCP"),
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Name of the claim the server exports: the user's claim, else one named after the server.
#[must_use]
pub fn claim_name(server: &NFSServer) -> String {
    server
        .spec
        .persistent_volume_claim
        .as_ref()
        .map(|claim| claim.claim_name.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| server.metadata.name.clone().unwrap_or_default())
}

/// Whether the operator provisions the backing claim itself.
#[must_use]
pub fn uses_dynamic_claim(server: &NFSServer) -> bool {
    server
        .spec
        .persistent_volume_claim
        .as_ref()
        .is_none_or(|claim| claim.claim_name.is_empty())
}

/// Dynamically provisioned claim backing the export.
///
/// # Arguments
///
/// * `server` - The NFS server
/// * `cluster_storage_class` - Default `StorageClass` of the running cluster
#[must_use]
pub fn build_claim(server: &NFSServer, cluster_storage_class: &str) -> PersistentVolumeClaim {
    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), Quantity(server.spec.capacity()));

    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(claim_name(server)),
            ..metadata(server)
        },
        spec: Some(PersistentVolumeClaimSpec {
            storage_class_name: Some(server.spec.storage_class_name(cluster_storage_class)),
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn nfs_container(server: &NFSServer, cluster_nfs_image: &str) -> Container {
    let config_file = format!("{NFS_CONFIG_PATH}/{}", crate::constants::NFS_CONFIG_FILENAME);
    Container {
        name: "nfsd".to_string(),
        image: Some(server.spec.container_image(cluster_nfs_image)),
        image_pull_policy: Some("IfNotPresent".to_string()),
        args: Some(vec!["-c".to_string(), config_file]),
        ports: Some(vec![
            container_port("nfs", NFS_PORT, "TCP"),
            container_port("rpcbind-tcp", NFS_RPCBIND_PORT, "TCP"),
            container_port("rpcbind-udp", NFS_RPCBIND_PORT, "UDP"),
            container_port("metrics", NFS_METRICS_PORT, "TCP"),
        ]),
        volume_mounts: Some(vec![
            VolumeMount {
                name: "nfs-export".to_string(),
                mount_path: NFS_EXPORT_PATH.to_string(),
                ..Default::default()
            },
            VolumeMount {
                name: "nfs-config".to_string(),
                mount_path: NFS_CONFIG_PATH.to_string(),
                ..Default::default()
            },
        ]),
        resources: server.spec.resources.clone(),
        security_context: Some(SecurityContext {
            capabilities: Some(Capabilities {
                add: Some(vec!["SYS_ADMIN".to_string(), "DAC_READ_SEARCH".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Single replica `StatefulSet` running NFS-Ganesha.
///
/// # Arguments
///
/// * `server` - The NFS server
/// * `cluster_nfs_image` - NFS image configured on the running cluster
#[must_use]
pub fn build_statefulset(server: &NFSServer, cluster_nfs_image: &str) -> StatefulSet {
    let name = server.metadata.name.clone().unwrap_or_default();
    let labels = server_labels(server);
    let tolerations = server.spec.tolerations();

    StatefulSet {
        metadata: metadata(server),
        spec: Some(StatefulSetSpec {
            replicas: Some(1),
            service_name: name.clone().into(),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![nfs_container(server, cluster_nfs_image)],
                    volumes: Some(vec![
                        Volume {
                            name: "nfs-export".to_string(),
                            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                                claim_name: claim_name(server),
                                read_only: None,
                            }),
                            ..Default::default()
                        },
                        Volume {
                            name: "nfs-config".to_string(),
                            config_map: Some(ConfigMapVolumeSource {
                                name,
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                    ]),
                    tolerations: (!tolerations.is_empty()).then(|| tolerations.to_vec()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "workload_tests.rs"]
mod workload_tests;
