// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! StorageOS API `Service` and `Ingress` builders.

use crate::constants::{INGRESS_NAME, INGRESS_TLS_SECRET_NAME};
use crate::crd::StorageOSClusterSpec;
use crate::labels::{kind_labels, selector_labels, KIND_DAEMONSET};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// The StorageOS API `Service`, selecting the node pods.
#[must_use]
pub fn build_service(spec: &StorageOSClusterSpec) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(spec.service_name()),
            namespace: Some(spec.resource_namespace()),
            labels: Some(kind_labels(KIND_DAEMONSET)),
            annotations: spec.service.annotations.clone(),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some(spec.service_type()),
            selector: Some(selector_labels(KIND_DAEMONSET)),
            ports: Some(vec![ServicePort {
                name: Some(spec.service_name()),
                protocol: Some("TCP".to_string()),
                port: spec.service_external_port(),
                target_port: Some(IntOrString::Int(spec.service_internal_port())),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// `tcp://<clusterIP>:<port>` for a created API service.
///
/// `None` until the service has a cluster IP.
#[must_use]
pub fn api_address(service: &Service) -> Option<String> {
    let spec = service.spec.as_ref()?;
    let ip = spec
        .cluster_ip
        .as_deref()
        .filter(|ip| !ip.is_empty() && *ip != "None")?;
    let port = spec.ports.as_ref()?.first()?.port;
    Some(format!("tcp://{ip}:{port}"))
}

/// `Ingress` routing the configured hostname to the API service.
#[must_use]
pub fn build_ingress(spec: &StorageOSClusterSpec) -> Ingress {
    let hostname = spec.ingress_hostname();
    let tls = spec.ingress.tls.then(|| {
        vec![IngressTLS {
            hosts: Some(vec![hostname.clone()]),
            secret_name: Some(INGRESS_TLS_SECRET_NAME.to_string()),
        }]
    });

    Ingress {
        metadata: ObjectMeta {
            name: Some(INGRESS_NAME.to_string()),
            namespace: Some(spec.resource_namespace()),
            labels: Some(kind_labels(KIND_DAEMONSET)),
            annotations: spec.ingress.annotations.clone(),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: Some(hostname),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: spec.service_name(),
                                port: Some(ServiceBackendPort {
                                    number: Some(spec.service_external_port()),
                                    ..Default::default()
                                }),
                            }),
                            ..Default::default()
                        },
                    }],
                }),
            }]),
            tls,
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod service_tests;
