// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Service accounts, roles and bindings for a StorageOS cluster.
//!
//! The rule tables are static data. Builders here only decide names and
//! subjects; which ones are applied is decided in `deploy::StorageOSDeployment`.

use crate::labels::{kind_labels, KIND_DAEMONSET};
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{
    ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, Subject,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

fn rule(api_groups: &[&str], resources: &[&str], verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(api_groups.iter().map(ToString::to_string).collect()),
        resources: Some(resources.iter().map(ToString::to_string).collect()),
        verbs: verbs.iter().map(ToString::to_string).collect(),
        ..Default::default()
    }
}

const READ: &[&str] = &["get", "list", "watch"];
const READ_WRITE: &[&str] = &["get", "list", "watch", "create", "update", "patch", "delete"];

/// Rule set of a cluster role, by name.
///
/// Unknown names yield an empty rule set.
#[must_use]
pub fn cluster_role_rules(name: &str) -> Vec<PolicyRule> {
    use crate::constants::{
        API_MANAGER_CLUSTER_ROLE, CSI_ATTACHER_CLUSTER_ROLE, CSI_DRIVER_REGISTRAR_CLUSTER_ROLE,
        CSI_PROVISIONER_CLUSTER_ROLE, CSI_RESIZER_CLUSTER_ROLE, FENCING_CLUSTER_ROLE,
        INIT_CLUSTER_ROLE, NFS_CLUSTER_ROLE, OPENSHIFT_SCC_CLUSTER_ROLE, SCHEDULER_CLUSTER_ROLE,
        UPGRADER_CLUSTER_ROLE,
    };

    match name {
        CSI_PROVISIONER_CLUSTER_ROLE => vec![
            rule(&[""], &["persistentvolumes"], &["get", "list", "watch", "create", "delete"]),
            rule(&[""], &["persistentvolumeclaims"], &["get", "list", "watch", "update"]),
            rule(&["storage.k8s.io"], &["storageclasses"], READ),
            rule(&[""], &["events"], &["list", "watch", "create", "update", "patch"]),
            rule(&[""], &["secrets"], &["get", "list"]),
            rule(&[""], &["nodes"], READ),
            rule(&["storage.k8s.io"], &["csinodes"], READ),
            rule(
                &["snapshot.storage.k8s.io"],
                &["volumesnapshots", "volumesnapshotcontents"],
                &["get", "list"],
            ),
        ],
        CSI_ATTACHER_CLUSTER_ROLE => vec![
            rule(&[""], &["persistentvolumes"], &["get", "list", "watch", "update", "patch"]),
            rule(&[""], &["nodes"], READ),
            rule(
                &["storage.k8s.io"],
                &["volumeattachments"],
                &["get", "list", "watch", "update", "patch"],
            ),
            rule(&["storage.k8s.io"], &["csinodes"], READ),
            rule(&[""], &["events"], &["list", "watch", "create", "update", "patch"]),
        ],
        CSI_RESIZER_CLUSTER_ROLE => vec![
            rule(&[""], &["persistentvolumes"], &["get", "list", "watch", "update", "patch"]),
            rule(&[""], &["persistentvolumeclaims"], READ),
            rule(&[""], &["persistentvolumeclaims/status"], &["update", "patch"]),
            rule(&["storage.k8s.io"], &["storageclasses"], READ),
            rule(&[""], &["events"], &["list", "watch", "create", "update", "patch"]),
            rule(&[""], &["secrets"], &["get", "list"]),
        ],
        CSI_DRIVER_REGISTRAR_CLUSTER_ROLE => vec![
            rule(&["storage.k8s.io"], &["csidrivers"], &["create", "delete"]),
            rule(
                &["apiextensions.k8s.io"],
                &["customresourcedefinitions"],
                &["create", "list", "watch", "delete"],
            ),
            rule(&[""], &["events"], &["get", "list", "watch", "create", "update", "patch"]),
            rule(&[""], &["nodes"], &["get", "update", "patch"]),
        ],
        SCHEDULER_CLUSTER_ROLE => vec![
            rule(&[""], &["events"], &["create", "patch", "update"]),
            rule(&[""], &["endpoints"], &["create", "get", "update"]),
            rule(&["coordination.k8s.io"], &["leases"], &["create", "get", "update"]),
            rule(
                &[""],
                &[
                    "nodes",
                    "pods",
                    "services",
                    "persistentvolumes",
                    "persistentvolumeclaims",
                    "replicationcontrollers",
                ],
                READ,
            ),
            rule(&[""], &["pods/binding", "bindings"], &["create"]),
            rule(&[""], &["pods/status"], &["patch", "update"]),
            rule(&["apps", "extensions"], &["replicasets", "statefulsets"], READ),
            rule(&["policy"], &["poddisruptionbudgets"], READ),
            rule(&["storage.k8s.io"], &["storageclasses", "csinodes"], READ),
            rule(&[""], &["configmaps"], READ),
        ],
        NFS_CLUSTER_ROLE => vec![
            rule(&[""], &["persistentvolumes"], &["get", "list", "watch", "create", "delete"]),
            rule(&[""], &["persistentvolumeclaims"], &["get", "list", "watch", "update"]),
            rule(&["storage.k8s.io"], &["storageclasses"], READ),
            rule(&[""], &["events"], &["list", "watch", "create", "update", "patch"]),
            rule(&[""], &["services", "endpoints"], &["get"]),
            rule(&["extensions", "policy"], &["podsecuritypolicies"], &["use"]),
        ],
        INIT_CLUSTER_ROLE => vec![rule(&["apps"], &["daemonsets"], &["get"])],
        FENCING_CLUSTER_ROLE => vec![
            rule(&[""], &["pods"], &["get", "list", "delete"]),
            rule(&[""], &["persistentvolumes", "persistentvolumeclaims", "nodes"], READ),
            rule(&["storage.k8s.io"], &["volumeattachments"], &["get", "list", "watch", "delete"]),
            rule(&[""], &["events"], &["create", "patch"]),
        ],
        OPENSHIFT_SCC_CLUSTER_ROLE => vec![PolicyRule {
            api_groups: Some(vec!["security.openshift.io".to_string()]),
            resources: Some(vec!["securitycontextconstraints".to_string()]),
            resource_names: Some(vec!["privileged".to_string()]),
            verbs: vec!["use".to_string()],
            ..Default::default()
        }],
        API_MANAGER_CLUSTER_ROLE => vec![
            rule(
                &[""],
                &[
                    "pods",
                    "nodes",
                    "persistentvolumeclaims",
                    "persistentvolumes",
                    "services",
                    "endpoints",
                ],
                READ_WRITE,
            ),
            rule(&["storage.k8s.io"], &["storageclasses", "volumeattachments"], READ),
            rule(
                &["admissionregistration.k8s.io"],
                &["mutatingwebhookconfigurations"],
                &["get", "list", "watch", "update", "patch"],
            ),
            rule(&[""], &["secrets"], READ_WRITE),
            rule(&["coordination.k8s.io"], &["leases"], READ_WRITE),
            rule(&[""], &["events"], &["create", "patch"]),
        ],
        UPGRADER_CLUSTER_ROLE => vec![
            rule(&["apps"], &["daemonsets", "deployments", "statefulsets"], READ_WRITE),
            rule(&[""], &["pods", "persistentvolumeclaims", "persistentvolumes"], READ_WRITE),
            rule(&[RBAC_API_GROUP], &["clusterroles", "clusterrolebindings"], READ),
            rule(&[""], &["nodes"], READ),
        ],
        _ => Vec::new(),
    }
}

/// A service account in `namespace`.
#[must_use]
pub fn service_account(name: &str, namespace: &str) -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(kind_labels(KIND_DAEMONSET)),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// `ServiceAccount` subject in `namespace`.
#[must_use]
pub fn service_account_subject(name: &str, namespace: &str) -> Subject {
    Subject {
        kind: "ServiceAccount".to_string(),
        name: name.to_string(),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

/// A cluster role with the rules from [`cluster_role_rules`].
#[must_use]
pub fn cluster_role(name: &str) -> ClusterRole {
    ClusterRole {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(kind_labels(KIND_DAEMONSET)),
            ..Default::default()
        },
        rules: Some(cluster_role_rules(name)),
        ..Default::default()
    }
}

/// A cluster role binding granting `role` to `subjects`.
#[must_use]
pub fn cluster_role_binding(name: &str, role: &str, subjects: Vec<Subject>) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(kind_labels(KIND_DAEMONSET)),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "ClusterRole".to_string(),
            name: role.to_string(),
        },
        subjects: Some(subjects),
    }
}

/// Namespaced role letting the node agents manage encryption key secrets.
#[must_use]
pub fn key_management_role(name: &str, namespace: &str) -> Role {
    Role {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(kind_labels(KIND_DAEMONSET)),
            ..Default::default()
        },
        rules: Some(vec![rule(&[""], &["secrets"], &["get", "list", "create", "delete"])]),
    }
}

#[must_use]
pub fn role_binding(
    name: &str,
    namespace: &str,
    role: &str,
    subjects: Vec<Subject>,
) -> RoleBinding {
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(kind_labels(KIND_DAEMONSET)),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "Role".to_string(),
            name: role.to_string(),
        },
        subjects: Some(subjects),
    }
}
