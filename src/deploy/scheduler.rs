// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Scheduler extender builders.
//!
//! A second kube-scheduler named `storageos-scheduler` runs with a policy that
//! calls the StorageOS API to prefer nodes holding a pod's volumes.

use crate::constants::{
    CLUSTER_PRIORITY_CLASS, SCHEDULER_CONFIG_CONFIGMAP, SCHEDULER_NAME,
    SCHEDULER_POLICY_CONFIGMAP, SCHEDULER_SERVICE_ACCOUNT,
};
use crate::crd::StorageOSClusterSpec;
use crate::deploy::node::{mount, priority_class, tolerations};
use crate::labels::{kind_labels, selector_labels, KIND_SCHEDULER};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, PodSpec, PodTemplateSpec, Volume,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

const POLICY_TEMPLATE: &str = include_str!("../../templates/scheduler-policy.json.tmpl");
const CONFIG_TEMPLATE: &str = include_str!("../../templates/scheduler-config.yaml.tmpl");

const POLICY_KEY: &str = "policy.cfg";
const CONFIG_KEY: &str = "config.yaml";
const CONFIG_MOUNT_PATH: &str = "/storageos-scheduler";

fn metadata(name: &str, namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(kind_labels(KIND_SCHEDULER)),
        ..Default::default()
    }
}

/// Extender policy pointing at the StorageOS API service.
#[must_use]
pub fn render_policy(spec: &StorageOSClusterSpec) -> String {
    POLICY_TEMPLATE
        .replace("{{SERVICE_NAME}}", &spec.service_name())
        .replace("{{NAMESPACE}}", &spec.resource_namespace())
        .replace("{{SERVICE_PORT}}", &spec.service_external_port().to_string())
}

#[must_use]
pub fn render_config(spec: &StorageOSClusterSpec) -> String {
    CONFIG_TEMPLATE
        .replace("{{SCHEDULER_NAME}}", SCHEDULER_NAME)
        .replace("{{NAMESPACE}}", &spec.resource_namespace())
        .replace("{{POLICY_CONFIGMAP}}", SCHEDULER_POLICY_CONFIGMAP)
}

#[must_use]
pub fn build_policy_configmap(spec: &StorageOSClusterSpec) -> ConfigMap {
    ConfigMap {
        metadata: metadata(SCHEDULER_POLICY_CONFIGMAP, &spec.resource_namespace()),
        data: Some(BTreeMap::from([(POLICY_KEY.to_string(), render_policy(spec))])),
        ..Default::default()
    }
}

#[must_use]
pub fn build_config_configmap(spec: &StorageOSClusterSpec) -> ConfigMap {
    ConfigMap {
        metadata: metadata(SCHEDULER_CONFIG_CONFIGMAP, &spec.resource_namespace()),
        data: Some(BTreeMap::from([(CONFIG_KEY.to_string(), render_config(spec))])),
        ..Default::default()
    }
}

#[must_use]
pub fn build_deployment(spec: &StorageOSClusterSpec) -> Deployment {
    let namespace = spec.resource_namespace();
    let container = Container {
        name: SCHEDULER_NAME.to_string(),
        image: Some(spec.kube_scheduler_image()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        args: Some(vec![
            format!("--config={CONFIG_MOUNT_PATH}/{CONFIG_KEY}"),
            "--v=4".to_string(),
        ]),
        volume_mounts: Some(vec![mount("config", CONFIG_MOUNT_PATH)]),
        ..Default::default()
    };

    Deployment {
        metadata: metadata(SCHEDULER_NAME, &namespace),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(selector_labels(KIND_SCHEDULER)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(kind_labels(KIND_SCHEDULER)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(SCHEDULER_SERVICE_ACCOUNT.to_string()),
                    priority_class_name: priority_class(&namespace, CLUSTER_PRIORITY_CLASS),
                    containers: vec![container],
                    volumes: Some(vec![Volume {
                        name: "config".to_string(),
                        config_map: Some(ConfigMapVolumeSource {
                            name: SCHEDULER_CONFIG_CONFIGMAP.to_string(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    tolerations: tolerations(spec.tolerations()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod scheduler_tests;
