// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! api-manager builders.
//!
//! The api-manager keeps StorageOS in sync with Kubernetes objects and serves
//! the pod mutating webhook. It gets its own `Deployment`, a metrics `Service`
//! (scraped through a `ServiceMonitor` when the Prometheus operator is
//! installed), a webhook `Service` and the `MutatingWebhookConfiguration`.
//! The api-manager injects the webhook CA bundle itself.

use crate::constants::{
    API_MANAGER_METRICS_NAME, API_MANAGER_METRICS_PORT, API_MANAGER_NAME,
    API_MANAGER_SERVICE_ACCOUNT, API_MANAGER_WEBHOOK_PORT, CLUSTER_PRIORITY_CLASS,
    INIT_SECRET_NAME, MUTATING_WEBHOOK_CONFIG_NAME, POD_MUTATOR_WEBHOOK_NAME,
    POD_MUTATOR_WEBHOOK_PATH, SECRET_PASSWORD_KEY, SECRET_USERNAME_KEY, WEBHOOK_SERVICE_NAME,
};
use crate::crd::StorageOSClusterSpec;
use crate::deploy::node::{env_field, env_secret, env_value, priority_class, tolerations};
use crate::labels::{kind_labels, selector_labels, KIND_API_MANAGER};
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    WebhookClientConfig,
};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const API_MANAGER_REPLICAS: i32 = 2;

/// Prometheus operator `ServiceMonitor`, reduced to the fields the operator sets.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "monitoring.coreos.com",
    version = "v1",
    kind = "ServiceMonitor",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMonitorSpec {
    pub selector: LabelSelector,
    #[serde(default)]
    pub endpoints: Vec<MonitorEndpoint>,
}

/// A scrape endpoint of a `ServiceMonitor`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitorEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

fn metadata(name: &str, namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(kind_labels(KIND_API_MANAGER)),
        ..Default::default()
    }
}

#[must_use]
pub fn build_deployment(spec: &StorageOSClusterSpec) -> Deployment {
    let namespace = spec.resource_namespace();
    let container = Container {
        name: "api-manager".to_string(),
        image: Some(spec.api_manager_image()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        args: Some(vec![
            format!("-metrics-addr=:{API_MANAGER_METRICS_PORT}"),
            "-enable-leader-election".to_string(),
            format!("-webhook-service-name={WEBHOOK_SERVICE_NAME}"),
            format!("-webhook-service-namespace={namespace}"),
            format!("-webhook-config-mutating={MUTATING_WEBHOOK_CONFIG_NAME}"),
        ]),
        ports: Some(vec![
            ContainerPort {
                name: Some("metrics".to_string()),
                container_port: API_MANAGER_METRICS_PORT,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            },
            ContainerPort {
                name: Some("webhook".to_string()),
                container_port: API_MANAGER_WEBHOOK_PORT,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            },
        ]),
        env: Some(vec![
            env_secret("API_USERNAME", INIT_SECRET_NAME, SECRET_USERNAME_KEY),
            env_secret("API_PASSWORD", INIT_SECRET_NAME, SECRET_PASSWORD_KEY),
            env_value("API_ENDPOINT", &spec.service_name()),
            env_field("POD_NAMESPACE", "metadata.namespace"),
        ]),
        ..Default::default()
    };

    Deployment {
        metadata: metadata(API_MANAGER_NAME, &namespace),
        spec: Some(DeploymentSpec {
            replicas: Some(API_MANAGER_REPLICAS),
            selector: LabelSelector {
                match_labels: Some(selector_labels(KIND_API_MANAGER)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(kind_labels(KIND_API_MANAGER)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(API_MANAGER_SERVICE_ACCOUNT.to_string()),
                    priority_class_name: priority_class(&namespace, CLUSTER_PRIORITY_CLASS),
                    containers: vec![container],
                    tolerations: tolerations(spec.tolerations()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn service(name: &str, namespace: &str, port_name: &str, port: i32, target: i32) -> Service {
    Service {
        metadata: metadata(name, namespace),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(selector_labels(KIND_API_MANAGER)),
            ports: Some(vec![ServicePort {
                name: Some(port_name.to_string()),
                protocol: Some("TCP".to_string()),
                port,
                target_port: Some(IntOrString::Int(target)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[must_use]
pub fn build_metrics_service(spec: &StorageOSClusterSpec) -> Service {
    service(
        API_MANAGER_METRICS_NAME,
        &spec.resource_namespace(),
        "metrics",
        API_MANAGER_METRICS_PORT,
        API_MANAGER_METRICS_PORT,
    )
}

#[must_use]
pub fn build_webhook_service(spec: &StorageOSClusterSpec) -> Service {
    service(
        WEBHOOK_SERVICE_NAME,
        &spec.resource_namespace(),
        "webhook",
        443,
        API_MANAGER_WEBHOOK_PORT,
    )
}

#[must_use]
pub fn build_service_monitor(spec: &StorageOSClusterSpec) -> ServiceMonitor {
    let mut monitor = ServiceMonitor::new(
        API_MANAGER_METRICS_NAME,
        ServiceMonitorSpec {
            selector: LabelSelector {
                match_labels: Some(kind_labels(KIND_API_MANAGER)),
                ..Default::default()
            },
            endpoints: vec![MonitorEndpoint {
                port: Some("metrics".to_string()),
                path: Some("/metrics".to_string()),
                interval: Some("30s".to_string()),
            }],
        },
    );
    monitor.metadata = metadata(API_MANAGER_METRICS_NAME, &spec.resource_namespace());
    monitor
}

/// Pod mutating webhook, served by the api-manager.
#[must_use]
pub fn build_mutating_webhook_configuration(
    spec: &StorageOSClusterSpec,
) -> MutatingWebhookConfiguration {
    MutatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(MUTATING_WEBHOOK_CONFIG_NAME.to_string()),
            labels: Some(kind_labels(KIND_API_MANAGER)),
            ..Default::default()
        },
        webhooks: Some(vec![MutatingWebhook {
            name: POD_MUTATOR_WEBHOOK_NAME.to_string(),
            admission_review_versions: vec!["v1".to_string(), "v1beta1".to_string()],
            side_effects: "None".to_string(),
            failure_policy: Some("Ignore".to_string()),
            client_config: WebhookClientConfig {
                service: Some(ServiceReference {
                    name: WEBHOOK_SERVICE_NAME.to_string(),
                    namespace: spec.resource_namespace(),
                    path: Some(POD_MUTATOR_WEBHOOK_PATH.to_string()),
                    port: Some(443),
                }),
                ..Default::default()
            },
            rules: Some(vec![RuleWithOperations {
                api_groups: Some(vec![String::new()]),
                api_versions: Some(vec!["v1".to_string()]),
                operations: Some(vec!["CREATE".to_string()]),
                resources: Some(vec!["pods".to_string()]),
                ..Default::default()
            }]),
            ..Default::default()
        }]),
    }
}

#[cfg(test)]
#[path = "api_manager_tests.rs"]
mod api_manager_tests;
