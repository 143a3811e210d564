// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `StorageOSCluster` reconciliation.
//!
//! The operator manages a single StorageOS cluster. The first cluster seen
//! becomes the current one; any other cluster is rejected with a
//! `FailedCreation` event until the current one is deleted.
//!
//! For the current cluster each reconcile:
//!
//! 1. returns early if the cluster is paused
//! 2. recomputes the join token from the selected nodes and persists it
//! 3. persists the effective (defaulted) spec
//! 4. deploys StorageOS, or tears it down if the cluster carries finalizers
//! 5. probes the members and updates the status
//!
//! Child objects carry no owner references. Teardown is explicit.

use crate::capabilities::Capabilities;
use crate::context::Context;
use crate::crd::{StorageOSCluster, StorageOSClusterStatus};
use crate::deploy::StorageOSDeployment;
use crate::errors::{Error, Result};
use crate::events::{actions, reasons};
use crate::health::cluster_status;
use crate::kube_api::{self, display_name};
use crate::metrics;
use crate::reconcilers::active::{admit, Admission, Identity};
use crate::reconcilers::finalizers::{clear_finalizers, has_any_finalizer};
use crate::reconcilers::status::patch_status_if_changed;
use crate::selector::{join_token, select_nodes};
use k8s_openapi::api::core::v1::Node;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

fn object_name(cluster: &StorageOSCluster) -> String {
    display_name(cluster.metadata.namespace.as_deref(), &cluster.name_any())
}

/// The active cluster and the last state it was reconciled with.
#[derive(Default)]
struct Current {
    identity: Option<Identity>,
    cluster: Option<StorageOSCluster>,
}

impl Current {
    fn clear(&mut self) {
        self.identity = None;
        self.cluster = None;
    }
}

/// Reconciler for `StorageOSCluster`, holding the current cluster.
#[derive(Default)]
pub struct ClusterReconciler {
    current: Mutex<Current>,
}

impl ClusterReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `namespace/name` of the current cluster, if any.
    pub async fn current(&self) -> Option<String> {
        self.current.lock().await.identity.as_ref().map(Identity::display)
    }

    /// Reconcile the cluster `namespace/name`.
    ///
    /// A cluster that no longer exists tears down the deployment of the
    /// current cluster when it is the one that was deleted. The cluster stays
    /// current until the teardown succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyActive`] for a second cluster, and any error
    /// raised while deploying, tearing down or updating status.
    pub async fn reconcile(&self, ctx: &Context, namespace: &str, name: &str) -> Result<()> {
        let client = ctx.client.as_ref();
        let mut current = self.current.lock().await;

        let Some(cluster) =
            kube_api::get_opt::<StorageOSCluster>(client, Some(namespace), name).await?
        else {
            if !current.identity.as_ref().is_some_and(|a| a.is(namespace, name)) {
                return Ok(());
            }
            if let Some(active) = current.cluster.as_ref() {
                info!(cluster = %object_name(active), "Cluster deleted, removing StorageOS");
                let caps = Capabilities::discover(ctx.discovery.as_ref(), &active.spec).await?;
                StorageOSDeployment::new(client, active, caps, ctx.config.allow_updates)
                    .delete()
                    .await?;
            }
            current.clear();
            return Ok(());
        };

        match admit(&mut current.identity, Identity::of(&cluster)) {
            Admission::Active => {}
            Admission::Adopted => {
                info!(cluster = %object_name(&cluster), "Adopting StorageOS cluster");
                current.cluster = Some(cluster.clone());
            }
            Admission::Recreated => {
                info!(cluster = %object_name(&cluster), "Cluster was recreated");
                current.cluster = Some(cluster.clone());
            }
            Admission::Rejected(active) => {
                let err = Error::AlreadyActive {
                    kind: StorageOSCluster::kind(&()).to_string(),
                    active,
                    requested: object_name(&cluster),
                };
                warn!("{err}");
                ctx.events
                    .publish(
                        &cluster.object_ref(&()),
                        EventType::Warning,
                        reasons::FAILED_CREATION,
                        actions::RECONCILE,
                        Some(err.to_string()),
                    )
                    .await;
                return Err(err);
            }
        }

        sync(ctx, cluster, &mut current).await
    }
}

async fn sync(ctx: &Context, mut cluster: StorageOSCluster, current: &mut Current) -> Result<()> {
    let client = ctx.client.as_ref();
    let name = object_name(&cluster);

    if cluster.spec.pause {
        info!(cluster = %name, "Cluster is paused, skipping");
        return Ok(());
    }

    let nodes: Vec<Node> = kube_api::list(client, None, None).await?;
    let selected = match select_nodes(
        &nodes,
        cluster.spec.node_selector_terms(),
        cluster.spec.tolerations(),
    ) {
        Ok(selected) => selected,
        Err(e) => {
            warn!(cluster = %name, error = %e, "Unable to select nodes");
            ctx.events
                .publish(
                    &cluster.object_ref(&()),
                    EventType::Warning,
                    reasons::FAILED_CREATION,
                    actions::RECONCILE,
                    Some(e.to_string()),
                )
                .await;
            return Err(e);
        }
    };
    let join = join_token(&selected);
    let node_names: Vec<String> = selected.iter().map(|n| n.name_any()).collect();

    if join != cluster.spec.join() {
        info!(cluster = %name, join = %join, "Updating join token");
        cluster.spec.join = Some(join);
        cluster = kube_api::replace(client, &cluster).await?;
    }

    let caps = Capabilities::discover(ctx.discovery.as_ref(), &cluster.spec).await?;
    let defaulted = cluster.spec.with_defaults(caps.csi_v1);
    if defaulted != cluster.spec {
        debug!(cluster = %name, "Persisting spec defaults");
        cluster.spec = defaulted;
        cluster = kube_api::replace(client, &cluster).await?;
    }

    let deployment = StorageOSDeployment::new(client, &cluster, caps, ctx.config.allow_updates);

    if has_any_finalizer(&cluster) {
        info!(cluster = %name, "Cluster has finalizers, removing StorageOS");
        ctx.events
            .publish(
                &cluster.object_ref(&()),
                EventType::Normal,
                reasons::TERMINATING,
                actions::DELETE,
                Some("Deleting StorageOS cluster resources".to_string()),
            )
            .await;
        deployment.delete().await?;
        current.clear();
        clear_finalizers(client, &cluster).await?;
        return Ok(());
    }

    match deployment.deploy().await {
        Ok(()) => {}
        Err(e) if e.is_conflict() => {
            debug!(cluster = %name, error = %e, "Conflict during deploy, retrying next reconcile");
        }
        Err(e) => {
            warn!(cluster = %name, error = %e, "Failed to deploy StorageOS");
            metrics::record_error(&StorageOSCluster::kind(&()), e.metric_label());
            ctx.events
                .publish(
                    &cluster.object_ref(&()),
                    EventType::Warning,
                    reasons::FAILED_CREATION,
                    actions::DEPLOY,
                    Some(e.to_string()),
                )
                .await;
            return Err(e);
        }
    }

    let health = cluster_status(ctx.prober.as_ref(), cluster.spec.join()).await;
    metrics::record_cluster_members(
        &name,
        health.members.ready.len(),
        health.members.unready.len(),
    );

    let previous_phase = cluster.status.as_ref().map(|s| s.phase);
    let desired = StorageOSClusterStatus {
        phase: health.phase,
        node_health_status: cluster
            .status
            .as_ref()
            .map(|s| s.node_health_status.clone())
            .unwrap_or_default(),
        nodes: node_names,
        ready: Some(health.ready),
        members: health.members,
    };

    if patch_status_if_changed(client, &cluster, cluster.status.as_ref(), &desired).await?
        && previous_phase != Some(desired.phase)
    {
        info!(cluster = %name, phase = ?desired.phase, "Cluster phase changed");
        ctx.events
            .publish(
                &cluster.object_ref(&()),
                EventType::Normal,
                reasons::CHANGED_STATUS,
                actions::RECONCILE,
                Some(format!("Cluster phase changed to {:?}", desired.phase)),
            )
            .await;
    }

    current.cluster = Some(cluster);
    Ok(())
}

#[cfg(test)]
#[path = "storageoscluster_tests.rs"]
mod storageoscluster_tests;
