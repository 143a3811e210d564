// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `StorageOSUpgrade` reconciliation.
//!
//! An upgrade pauses the StorageOS cluster so the cluster reconciler stops
//! touching it, then runs the upgrader as a batch `Job`. The upgrader rolls
//! the node `DaemonSet` to the new image. Once the `Job` succeeds the new
//! image is written into the cluster spec, the cluster is resumed and the
//! upgrader objects are removed.
//!
//! Only one upgrade runs at a time.

use crate::constants::{
    DEFAULT_UPGRADER_IMAGE, UPGRADER_CLUSTER_BINDING, UPGRADER_CLUSTER_ROLE, UPGRADER_NAME,
    UPGRADER_SERVICE_ACCOUNT,
};
use crate::context::Context;
use crate::crd::{StorageOSCluster, StorageOSUpgrade, StorageOSUpgradeStatus};
use crate::deploy::node::env_value;
use crate::deploy::rbac::{
    cluster_role, cluster_role_binding, service_account, service_account_subject,
};
use crate::errors::{Error, Result};
use crate::events::{actions, reasons};
use crate::kube_api::{self, ObjectClient};
use crate::labels::{kind_labels, KIND_UPGRADER};
use crate::reconcilers::active::{admit, release, Admission, Identity};
use crate::reconcilers::resources::{create_if_absent, delete_if_present};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::events::EventType;
use kube::Resource;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// The StorageOS cluster an upgrade applies to.
///
/// # Errors
///
/// Returns [`Error::NoRunningCluster`] if no cluster exists.
async fn target_cluster(client: &dyn ObjectClient) -> Result<StorageOSCluster> {
    kube_api::list::<StorageOSCluster>(client, None, None)
        .await?
        .into_iter()
        .next()
        .ok_or(Error::NoRunningCluster)
}

/// Batch `Job` running the upgrader against `cluster`.
#[must_use]
pub fn build_upgrader_job(upgrade: &StorageOSUpgrade, cluster: &StorageOSCluster) -> Job {
    let labels = kind_labels(KIND_UPGRADER);
    Job {
        metadata: ObjectMeta {
            name: Some(UPGRADER_NAME.to_string()),
            namespace: Some(cluster.spec.resource_namespace()),
            labels: Some(labels.clone()),
            owner_references: upgrade.controller_owner_ref(&()).map(|r| vec![r]),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(3),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(UPGRADER_SERVICE_ACCOUNT.to_string()),
                    restart_policy: Some("Never".to_string()),
                    containers: vec![Container {
                        name: "upgrader".to_string(),
                        image: Some(DEFAULT_UPGRADER_IMAGE.to_string()),
                        image_pull_policy: Some("IfNotPresent".to_string()),
                        env: Some(vec![
                            env_value("NEW_IMAGE", &upgrade.spec.new_image),
                            env_value(
                                "CLUSTER_NAME",
                                cluster.metadata.name.as_deref().unwrap_or_default(),
                            ),
                            env_value(
                                "CLUSTER_NAMESPACE",
                                cluster.metadata.namespace.as_deref().unwrap_or_default(),
                            ),
                        ]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

async fn create_upgrader(
    client: &dyn ObjectClient,
    upgrade: &StorageOSUpgrade,
    cluster: &StorageOSCluster,
) -> Result<()> {
    let namespace = cluster.spec.resource_namespace();

    let mut account = service_account(UPGRADER_SERVICE_ACCOUNT, &namespace);
    account.metadata.labels = Some(kind_labels(KIND_UPGRADER));
    create_if_absent(client, &account).await?;

    let mut role = cluster_role(UPGRADER_CLUSTER_ROLE);
    role.metadata.labels = Some(kind_labels(KIND_UPGRADER));
    create_if_absent(client, &role).await?;

    let mut binding = cluster_role_binding(
        UPGRADER_CLUSTER_BINDING,
        UPGRADER_CLUSTER_ROLE,
        vec![service_account_subject(UPGRADER_SERVICE_ACCOUNT, &namespace)],
    );
    binding.metadata.labels = Some(kind_labels(KIND_UPGRADER));
    create_if_absent(client, &binding).await?;

    create_if_absent(client, &build_upgrader_job(upgrade, cluster)).await
}

async fn delete_upgrader(client: &dyn ObjectClient, namespace: &str) -> Result<()> {
    delete_if_present::<Job>(client, Some(namespace), UPGRADER_NAME).await?;
    delete_if_present::<ClusterRoleBinding>(client, None, UPGRADER_CLUSTER_BINDING).await?;
    delete_if_present::<ClusterRole>(client, None, UPGRADER_CLUSTER_ROLE).await?;
    delete_if_present::<ServiceAccount>(client, Some(namespace), UPGRADER_SERVICE_ACCOUNT).await
}

/// Reconciler for `StorageOSUpgrade`, holding the active upgrade.
#[derive(Default)]
pub struct UpgradeReconciler {
    current: Mutex<Option<Identity>>,
}

impl UpgradeReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `namespace/name` of the active upgrade, if any.
    pub async fn current(&self) -> Option<String> {
        self.current.lock().await.as_ref().map(Identity::display)
    }

    /// Reconcile the upgrade `namespace/name`.
    ///
    /// Deleting the active upgrade before it completes removes the upgrader
    /// and resumes the cluster. The upgrade stays active until that succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyActive`] while another upgrade runs, and any
    /// API error raised along the way.
    pub async fn reconcile(&self, ctx: &Context, namespace: &str, name: &str) -> Result<()> {
        let client = ctx.client.as_ref();
        let mut current = self.current.lock().await;

        let Some(upgrade) =
            kube_api::get_opt::<StorageOSUpgrade>(client, Some(namespace), name).await?
        else {
            if current.as_ref().is_some_and(|active| active.is(namespace, name)) {
                info!(upgrade = %name, "Upgrade deleted before completion, resuming cluster");
                abort(client).await?;
                release(&mut current, namespace, name);
            }
            return Ok(());
        };

        if upgrade.status.as_ref().is_some_and(|s| s.completed) {
            release(&mut current, namespace, name);
            debug!(upgrade = %name, "Upgrade already completed");
            return Ok(());
        }

        if let Admission::Rejected(active) = admit(&mut current, Identity::of(&upgrade)) {
            let err = Error::AlreadyActive {
                kind: StorageOSUpgrade::kind(&()).to_string(),
                active,
                requested: Identity::of(&upgrade).display(),
            };
            warn!("{err}");
            ctx.events
                .publish(
                    &upgrade.object_ref(&()),
                    EventType::Warning,
                    reasons::FAILED_CREATION,
                    actions::UPGRADE,
                    Some(err.to_string()),
                )
                .await;
            return Err(err);
        }

        if run(ctx, &upgrade).await? {
            release(&mut current, namespace, name);
        }
        Ok(())
    }
}

/// Drive one upgrade step. Returns `true` once the upgrade has completed.
async fn run(ctx: &Context, upgrade: &StorageOSUpgrade) -> Result<bool> {
    let client = ctx.client.as_ref();
    let mut cluster = target_cluster(client).await?;
    let namespace = cluster.spec.resource_namespace();

    if !cluster.spec.pause {
        info!(image = %upgrade.spec.new_image, "Pausing StorageOS cluster for upgrade");
        cluster.spec.pause = true;
        cluster = kube_api::replace(client, &cluster).await?;
    }

    create_upgrader(client, upgrade, &cluster).await?;

    let job: Job = kube_api::get(client, Some(&namespace), UPGRADER_NAME).await?;
    let succeeded = job.status.as_ref().and_then(|s| s.succeeded).unwrap_or(0);
    if succeeded < 1 {
        debug!("Upgrader job has not succeeded yet");
        return Ok(false);
    }

    cluster.spec.images.node_container = Some(upgrade.spec.new_image.clone());
    cluster.spec.pause = false;
    kube_api::replace(client, &cluster).await?;
    delete_upgrader(client, &namespace).await?;

    kube_api::patch_status(client, upgrade, &StorageOSUpgradeStatus { completed: true }).await?;
    info!(image = %upgrade.spec.new_image, "StorageOS upgrade completed");
    ctx.events
        .publish(
            &upgrade.object_ref(&()),
            EventType::Normal,
            reasons::UPGRADE_COMPLETED,
            actions::UPGRADE,
            Some(format!("Cluster upgraded to {}", upgrade.spec.new_image)),
        )
        .await;
    Ok(true)
}

/// Remove the upgrader and resume a paused cluster.
async fn abort(client: &dyn ObjectClient) -> Result<()> {
    let mut cluster = match target_cluster(client).await {
        Ok(cluster) => cluster,
        Err(Error::NoRunningCluster) => return Ok(()),
        Err(e) => return Err(e),
    };
    delete_upgrader(client, &cluster.spec.resource_namespace()).await?;
    if cluster.spec.pause {
        cluster.spec.pause = false;
        kube_api::replace(client, &cluster).await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "upgrade_tests.rs"]
mod upgrade_tests;
