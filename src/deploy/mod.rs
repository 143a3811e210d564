// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! StorageOS cluster deployment.
//!
//! [`StorageOSDeployment`] turns a `StorageOSCluster` into the Kubernetes
//! objects that run it. It is built for a single reconcile from the cluster,
//! the discovered [`Capabilities`] and the update policy, and holds no state.
//!
//! # Deploy order
//!
//! 1. Namespace
//! 2. Service accounts (node, api-manager, CSI helper)
//! 3. Key management, NFS and init RBAC
//! 4. `init-secret` and the etcd TLS secret copy
//! 5. Node `ConfigMap` (always updated)
//! 6. Node `DaemonSet`
//! 7. API `Service`, then the admin secret `apiAddress` when CSI is off
//! 8. `Ingress` and its TLS secret
//! 9. CSI: `CSIDriver`, credential secrets, RBAC, helper workload
//! 10. api-manager: RBAC, `Deployment`, services, `ServiceMonitor`, webhook
//! 11. Scheduler extender
//! 12. OpenShift SCC and fencing RBAC
//! 13. `StorageClass`
//!
//! Any failing step aborts the deploy. There is no rollback: every step is
//! idempotent and the next reconcile starts again from the top.
//!
//! # Teardown
//!
//! [`StorageOSDeployment::delete`] removes the same object set in reverse
//! order and does not rely on owner references. Garbage collection has been
//! seen to remove children of a live `StorageOSCluster` during node reboots,
//! so nothing created here carries an owner reference. The namespace is left
//! in place.

pub mod api_manager;
pub mod config;
pub mod csi;
pub mod node;
pub mod rbac;
pub mod scheduler;
pub mod secrets;
pub mod service;
pub mod storageclass;

use crate::capabilities::Capabilities;
use crate::constants::{
    API_MANAGER_CLUSTER_BINDING, API_MANAGER_CLUSTER_ROLE, API_MANAGER_METRICS_NAME,
    API_MANAGER_NAME, API_MANAGER_SERVICE_ACCOUNT, CSI_ATTACHER_CLUSTER_BINDING,
    CSI_ATTACHER_CLUSTER_ROLE, CSI_DRIVER_NAME, CSI_DRIVER_REGISTRAR_CLUSTER_BINDING,
    CSI_DRIVER_REGISTRAR_CLUSTER_ROLE, CSI_K8S_DRIVER_REGISTRAR_CLUSTER_BINDING,
    CSI_PROVISIONER_CLUSTER_BINDING, CSI_PROVISIONER_CLUSTER_ROLE, CSI_RESIZER_CLUSTER_BINDING,
    CSI_RESIZER_CLUSTER_ROLE, DAEMONSET_NAME, DAEMONSET_SERVICE_ACCOUNT, FENCING_CLUSTER_BINDING,
    FENCING_CLUSTER_ROLE, INGRESS_NAME, INGRESS_TLS_SECRET_NAME, INIT_CLUSTER_BINDING,
    INIT_CLUSTER_ROLE, INIT_SECRET_NAME, KEY_MANAGEMENT_BINDING, KEY_MANAGEMENT_ROLE,
    MUTATING_WEBHOOK_CONFIG_NAME, NFS_CLUSTER_BINDING, NFS_CLUSTER_ROLE, NODE_CONFIGMAP_NAME,
    OPENSHIFT_SCC_CLUSTER_BINDING, OPENSHIFT_SCC_CLUSTER_ROLE, SCHEDULER_CLUSTER_BINDING,
    SCHEDULER_CLUSTER_ROLE, SCHEDULER_CONFIG_CONFIGMAP, SCHEDULER_NAME,
    SCHEDULER_POLICY_CONFIGMAP, SCHEDULER_SERVICE_ACCOUNT, SECRET_API_ADDRESS_KEY,
    TLS_ETCD_SECRET_NAME, WEBHOOK_SERVICE_NAME,
};
use crate::crd::{StorageOSCluster, StorageOSClusterSpec};
use crate::deploy::csi::HelperKind;
use crate::deploy::rbac::{
    cluster_role, cluster_role_binding, key_management_role, role_binding, service_account,
    service_account_subject,
};
use crate::deploy::secrets::Credentials;
use crate::errors::{Error, Result};
use crate::kube_api::{self, display_name, ObjectClient};
use crate::labels::{kind_labels, KIND_DAEMONSET};
use crate::reconcilers::resources::{
    apply, create_if_absent, create_or_update, delete_if_present, UpdatePolicy,
};
use k8s_openapi::api::admissionregistration::v1::MutatingWebhookConfiguration;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding, Subject};
use k8s_openapi::api::storage::v1::{CSIDriver, StorageClass};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use tracing::{debug, info};

/// Deployment plan for one `StorageOSCluster`.
pub struct StorageOSDeployment<'a> {
    client: &'a dyn ObjectClient,
    cluster: &'a StorageOSCluster,
    caps: Capabilities,
    allow_updates: bool,
}

impl<'a> StorageOSDeployment<'a> {
    /// # Arguments
    ///
    /// * `client` - Kubernetes access
    /// * `cluster` - Cluster to deploy, with defaults already applied
    /// * `caps` - Capabilities discovered for this reconcile
    /// * `allow_updates` - Update api-manager, scheduler and ingress objects in place
    #[must_use]
    pub fn new(
        client: &'a dyn ObjectClient,
        cluster: &'a StorageOSCluster,
        caps: Capabilities,
        allow_updates: bool,
    ) -> Self {
        Self {
            client,
            cluster,
            caps,
            allow_updates,
        }
    }

    fn spec(&self) -> &StorageOSClusterSpec {
        &self.cluster.spec
    }

    fn namespace(&self) -> String {
        self.spec().resource_namespace()
    }

    fn policy(&self) -> UpdatePolicy {
        UpdatePolicy::updates_if(self.allow_updates)
    }

    fn csi_helper(&self) -> HelperKind {
        HelperKind::from_spec(self.spec())
    }

    fn subject(&self, service_account: &str) -> Subject {
        service_account_subject(service_account, &self.namespace())
    }

    /// Create or converge every object the cluster needs.
    ///
    /// Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    pub async fn deploy(&self) -> Result<()> {
        info!(
            cluster = %self.cluster.metadata.name.as_deref().unwrap_or_default(),
            namespace = %self.namespace(),
            csi = self.caps.csi_enabled,
            csi_v1 = self.caps.csi_v1,
            node_v2 = self.caps.node_v2,
            "Deploying StorageOS cluster"
        );

        self.create_namespace().await?;
        self.create_service_accounts().await?;
        self.create_node_rbac().await?;

        let credentials = self.admin_credentials().await?;
        create_if_absent(
            self.client,
            &secrets::build_credentials_secret(INIT_SECRET_NAME, &self.namespace(), &credentials),
        )
        .await?;
        self.create_tls_etcd_secret().await?;

        create_or_update(
            self.client,
            &config::build_node_configmap(self.spec(), &self.caps),
        )
        .await?;
        create_if_absent(self.client, &node::build_daemonset(self.spec(), &self.caps)).await?;

        self.create_service().await?;
        if self.spec().ingress.enable {
            self.create_ingress().await?;
        }

        if self.caps.csi_enabled {
            self.create_csi(&credentials).await?;
        }

        self.create_api_manager().await?;

        if !self.spec().disable_scheduler {
            self.create_scheduler().await?;
        }
        if self.caps.openshift {
            self.create_cluster_binding(
                OPENSHIFT_SCC_CLUSTER_ROLE,
                OPENSHIFT_SCC_CLUSTER_BINDING,
                self.scc_subjects(),
            )
            .await?;
        }
        if !self.spec().disable_fencing {
            self.create_cluster_binding(
                FENCING_CLUSTER_ROLE,
                FENCING_CLUSTER_BINDING,
                vec![self.subject(DAEMONSET_SERVICE_ACCOUNT)],
            )
            .await?;
        }

        create_if_absent(
            self.client,
            &storageclass::build_storage_class(self.spec(), &self.caps),
        )
        .await?;

        debug!(namespace = %self.namespace(), "StorageOS cluster deployed");
        Ok(())
    }

    /// Remove every object [`deploy`](Self::deploy) creates, except the namespace.
    ///
    /// # Errors
    ///
    /// Returns the first delete error other than `NotFound`.
    pub async fn delete(&self) -> Result<()> {
        let ns = self.namespace();
        let ns = Some(ns.as_str());
        info!(namespace = ?ns, "Deleting StorageOS cluster");

        delete_if_present::<StorageClass>(self.client, None, &self.spec().storage_class_name())
            .await?;
        self.delete_cluster_binding(FENCING_CLUSTER_ROLE, FENCING_CLUSTER_BINDING)
            .await?;
        self.delete_cluster_binding(OPENSHIFT_SCC_CLUSTER_ROLE, OPENSHIFT_SCC_CLUSTER_BINDING)
            .await?;

        // Scheduler
        delete_if_present::<Deployment>(self.client, ns, SCHEDULER_NAME).await?;
        delete_if_present::<ConfigMap>(self.client, ns, SCHEDULER_CONFIG_CONFIGMAP).await?;
        delete_if_present::<ConfigMap>(self.client, ns, SCHEDULER_POLICY_CONFIGMAP).await?;
        self.delete_cluster_binding(SCHEDULER_CLUSTER_ROLE, SCHEDULER_CLUSTER_BINDING)
            .await?;
        delete_if_present::<ServiceAccount>(self.client, ns, SCHEDULER_SERVICE_ACCOUNT).await?;

        // api-manager
        delete_if_present::<MutatingWebhookConfiguration>(
            self.client,
            None,
            MUTATING_WEBHOOK_CONFIG_NAME,
        )
        .await?;
        delete_if_present::<Service>(self.client, ns, WEBHOOK_SERVICE_NAME).await?;
        if self.caps.service_monitor_kind {
            delete_if_present::<api_manager::ServiceMonitor>(
                self.client,
                ns,
                API_MANAGER_METRICS_NAME,
            )
            .await?;
        }
        delete_if_present::<Service>(self.client, ns, API_MANAGER_METRICS_NAME).await?;
        delete_if_present::<Deployment>(self.client, ns, API_MANAGER_NAME).await?;
        self.delete_cluster_binding(API_MANAGER_CLUSTER_ROLE, API_MANAGER_CLUSTER_BINDING)
            .await?;

        // CSI. Both helper kinds are removed in case the strategy changed.
        delete_if_present::<StatefulSet>(self.client, ns, HelperKind::StatefulSet.name()).await?;
        delete_if_present::<Deployment>(self.client, ns, HelperKind::Deployment.name()).await?;
        delete_if_present::<ClusterRoleBinding>(
            self.client,
            None,
            CSI_K8S_DRIVER_REGISTRAR_CLUSTER_BINDING,
        )
        .await?;
        for (role, binding) in [
            (CSI_DRIVER_REGISTRAR_CLUSTER_ROLE, CSI_DRIVER_REGISTRAR_CLUSTER_BINDING),
            (CSI_RESIZER_CLUSTER_ROLE, CSI_RESIZER_CLUSTER_BINDING),
            (CSI_ATTACHER_CLUSTER_ROLE, CSI_ATTACHER_CLUSTER_BINDING),
            (CSI_PROVISIONER_CLUSTER_ROLE, CSI_PROVISIONER_CLUSTER_BINDING),
        ] {
            self.delete_cluster_binding(role, binding).await?;
        }
        for secret in csi::credential_secrets(self.spec()) {
            delete_if_present::<Secret>(self.client, ns, secret.name).await?;
        }
        if self.caps.csi_driver_kind {
            delete_if_present::<CSIDriver>(self.client, None, CSI_DRIVER_NAME).await?;
        }

        delete_if_present::<Secret>(self.client, ns, INGRESS_TLS_SECRET_NAME).await?;
        delete_if_present::<Ingress>(self.client, ns, INGRESS_NAME).await?;
        delete_if_present::<Service>(self.client, ns, &self.spec().service_name()).await?;
        delete_if_present::<DaemonSet>(self.client, ns, DAEMONSET_NAME).await?;
        delete_if_present::<ConfigMap>(self.client, ns, NODE_CONFIGMAP_NAME).await?;
        delete_if_present::<Secret>(self.client, ns, TLS_ETCD_SECRET_NAME).await?;
        delete_if_present::<Secret>(self.client, ns, INIT_SECRET_NAME).await?;

        self.delete_cluster_binding(INIT_CLUSTER_ROLE, INIT_CLUSTER_BINDING)
            .await?;
        self.delete_cluster_binding(NFS_CLUSTER_ROLE, NFS_CLUSTER_BINDING)
            .await?;
        delete_if_present::<RoleBinding>(self.client, ns, KEY_MANAGEMENT_BINDING).await?;
        delete_if_present::<Role>(self.client, ns, KEY_MANAGEMENT_ROLE).await?;

        for account in [
            HelperKind::Deployment.service_account(),
            HelperKind::StatefulSet.service_account(),
            API_MANAGER_SERVICE_ACCOUNT,
            DAEMONSET_SERVICE_ACCOUNT,
        ] {
            delete_if_present::<ServiceAccount>(self.client, ns, account).await?;
        }

        info!(namespace = ?ns, "StorageOS cluster deleted");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Deploy steps
    // ------------------------------------------------------------------------

    async fn create_namespace(&self) -> Result<()> {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(self.namespace()),
                labels: Some(kind_labels(KIND_DAEMONSET)),
                ..Default::default()
            },
            ..Default::default()
        };
        create_if_absent(self.client, &namespace).await
    }

    async fn create_service_accounts(&self) -> Result<()> {
        let ns = self.namespace();
        let mut accounts = vec![DAEMONSET_SERVICE_ACCOUNT, API_MANAGER_SERVICE_ACCOUNT];
        if self.caps.csi_enabled {
            accounts.push(self.csi_helper().service_account());
        }
        for name in accounts {
            create_if_absent(self.client, &service_account(name, &ns)).await?;
        }
        Ok(())
    }

    async fn create_node_rbac(&self) -> Result<()> {
        let ns = self.namespace();
        create_if_absent(self.client, &key_management_role(KEY_MANAGEMENT_ROLE, &ns)).await?;
        create_if_absent(
            self.client,
            &role_binding(
                KEY_MANAGEMENT_BINDING,
                &ns,
                KEY_MANAGEMENT_ROLE,
                vec![self.subject(DAEMONSET_SERVICE_ACCOUNT)],
            ),
        )
        .await?;
        self.create_cluster_binding(
            NFS_CLUSTER_ROLE,
            NFS_CLUSTER_BINDING,
            vec![self.subject(DAEMONSET_SERVICE_ACCOUNT)],
        )
        .await?;
        self.create_cluster_binding(
            INIT_CLUSTER_ROLE,
            INIT_CLUSTER_BINDING,
            vec![self.subject(DAEMONSET_SERVICE_ACCOUNT)],
        )
        .await
    }

    async fn create_cluster_binding(
        &self,
        role: &str,
        binding: &str,
        subjects: Vec<Subject>,
    ) -> Result<()> {
        create_if_absent(self.client, &cluster_role(role)).await?;
        create_if_absent(self.client, &cluster_role_binding(binding, role, subjects)).await
    }

    async fn delete_cluster_binding(&self, role: &str, binding: &str) -> Result<()> {
        delete_if_present::<ClusterRoleBinding>(self.client, None, binding).await?;
        delete_if_present::<ClusterRole>(self.client, None, role).await
    }

    /// The referenced admin secret, if any.
    ///
    /// # Errors
    ///
    /// A configured reference to a missing secret is an [`Error::InvalidSpec`].
    async fn admin_secret(&self) -> Result<Option<Secret>> {
        let Some((name, namespace)) = self.spec().secret_ref() else {
            return Ok(None);
        };
        match kube_api::get_opt::<Secret>(self.client, Some(namespace), name).await? {
            Some(secret) => Ok(Some(secret)),
            None => Err(Error::InvalidSpec(format!(
                "admin secret {} not found",
                display_name(Some(namespace), name)
            ))),
        }
    }

    async fn admin_credentials(&self) -> Result<Credentials> {
        Ok(Credentials::from_secret(self.admin_secret().await?.as_ref()))
    }

    async fn create_tls_etcd_secret(&self) -> Result<()> {
        let Some((name, namespace)) = self.spec().tls_etcd_secret_ref() else {
            return Ok(());
        };
        let Some(source) = kube_api::get_opt::<Secret>(self.client, Some(namespace), name).await?
        else {
            return Err(Error::InvalidSpec(format!(
                "etcd TLS secret {} not found",
                display_name(Some(namespace), name)
            )));
        };
        create_if_absent(
            self.client,
            &secrets::copy_secret(&source, TLS_ETCD_SECRET_NAME, &self.namespace()),
        )
        .await
    }

    /// Create the API service. Without CSI, the service address is written
    /// into the admin secret as `apiAddress` for the in-tree driver.
    async fn create_service(&self) -> Result<()> {
        create_if_absent(self.client, &service::build_service(self.spec())).await?;
        if self.caps.csi_enabled {
            return Ok(());
        }

        let Some(mut admin) = self.admin_secret().await? else {
            return Ok(());
        };
        let live: Service = kube_api::get(
            self.client,
            Some(&self.namespace()),
            &self.spec().service_name(),
        )
        .await?;
        let Some(address) = service::api_address(&live) else {
            debug!("API service has no cluster IP yet");
            return Ok(());
        };

        let value = ByteString(address.clone().into_bytes());
        let data = admin.data.get_or_insert_with(Default::default);
        if data.get(SECRET_API_ADDRESS_KEY) == Some(&value) {
            return Ok(());
        }
        data.insert(SECRET_API_ADDRESS_KEY.to_string(), value);
        kube_api::replace(self.client, &admin).await?;
        info!(address = %address, "Set apiAddress on admin secret");
        Ok(())
    }

    async fn create_ingress(&self) -> Result<()> {
        if self.spec().ingress.tls {
            let admin = self.admin_secret().await?.ok_or_else(|| Error::MissingField {
                kind: "StorageOSCluster".to_string(),
                field: "spec.secretRefName".to_string(),
            })?;
            let tls = secrets::build_ingress_tls_secret(
                &admin,
                INGRESS_TLS_SECRET_NAME,
                &self.namespace(),
            )
            .ok_or_else(|| Error::MissingField {
                kind: "Secret".to_string(),
                field: "data.tls.crt".to_string(),
            })?;
            create_if_absent(self.client, &tls).await?;
        }
        apply(self.client, &service::build_ingress(self.spec()), self.policy()).await
    }

    async fn create_csi(&self, credentials: &Credentials) -> Result<()> {
        let ns = self.namespace();
        let helper = self.csi_helper();

        if self.caps.csi_driver_kind {
            create_if_absent(self.client, &csi::build_csi_driver(self.spec())).await?;
        }

        for secret in csi::credential_secrets(self.spec()) {
            create_if_absent(
                self.client,
                &secrets::build_credentials_secret(secret.name, &ns, credentials),
            )
            .await?;
        }

        let helper_subject = self.subject(helper.service_account());
        self.create_cluster_binding(
            CSI_PROVISIONER_CLUSTER_ROLE,
            CSI_PROVISIONER_CLUSTER_BINDING,
            vec![helper_subject.clone()],
        )
        .await?;
        self.create_cluster_binding(
            CSI_ATTACHER_CLUSTER_ROLE,
            CSI_ATTACHER_CLUSTER_BINDING,
            vec![helper_subject.clone()],
        )
        .await?;
        if self.caps.csi_resizer {
            self.create_cluster_binding(
                CSI_RESIZER_CLUSTER_ROLE,
                CSI_RESIZER_CLUSTER_BINDING,
                vec![helper_subject.clone()],
            )
            .await?;
        }
        self.create_cluster_binding(
            CSI_DRIVER_REGISTRAR_CLUSTER_ROLE,
            CSI_DRIVER_REGISTRAR_CLUSTER_BINDING,
            vec![helper_subject],
        )
        .await?;
        create_if_absent(
            self.client,
            &cluster_role_binding(
                CSI_K8S_DRIVER_REGISTRAR_CLUSTER_BINDING,
                CSI_DRIVER_REGISTRAR_CLUSTER_ROLE,
                vec![self.subject(DAEMONSET_SERVICE_ACCOUNT)],
            ),
        )
        .await?;

        match helper {
            HelperKind::StatefulSet => {
                create_if_absent(
                    self.client,
                    &csi::build_helper_statefulset(self.spec(), &self.caps),
                )
                .await
            }
            HelperKind::Deployment => {
                create_if_absent(
                    self.client,
                    &csi::build_helper_deployment(self.spec(), &self.caps),
                )
                .await
            }
        }
    }

    async fn create_api_manager(&self) -> Result<()> {
        let spec = self.spec();
        self.create_cluster_binding(
            API_MANAGER_CLUSTER_ROLE,
            API_MANAGER_CLUSTER_BINDING,
            vec![self.subject(API_MANAGER_SERVICE_ACCOUNT)],
        )
        .await?;
        apply(self.client, &api_manager::build_deployment(spec), self.policy()).await?;
        create_if_absent(self.client, &api_manager::build_metrics_service(spec)).await?;
        if self.caps.service_monitor_kind {
            create_if_absent(self.client, &api_manager::build_service_monitor(spec)).await?;
        }
        create_if_absent(self.client, &api_manager::build_webhook_service(spec)).await?;
        apply(
            self.client,
            &api_manager::build_mutating_webhook_configuration(spec),
            self.policy(),
        )
        .await
    }

    async fn create_scheduler(&self) -> Result<()> {
        let spec = self.spec();
        create_if_absent(
            self.client,
            &service_account(SCHEDULER_SERVICE_ACCOUNT, &self.namespace()),
        )
        .await?;
        self.create_cluster_binding(
            SCHEDULER_CLUSTER_ROLE,
            SCHEDULER_CLUSTER_BINDING,
            vec![self.subject(SCHEDULER_SERVICE_ACCOUNT)],
        )
        .await?;
        apply(self.client, &scheduler::build_policy_configmap(spec), self.policy()).await?;
        apply(self.client, &scheduler::build_config_configmap(spec), self.policy()).await?;
        apply(self.client, &scheduler::build_deployment(spec), self.policy()).await
    }

    fn scc_subjects(&self) -> Vec<Subject> {
        let mut accounts = vec![DAEMONSET_SERVICE_ACCOUNT, API_MANAGER_SERVICE_ACCOUNT];
        if self.caps.csi_enabled {
            accounts.push(self.csi_helper().service_account());
        }
        if !self.spec().disable_scheduler {
            accounts.push(SCHEDULER_SERVICE_ACCOUNT);
        }
        accounts.into_iter().map(|sa| self.subject(sa)).collect()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
