// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `NFSServer` reconciliation.
//!
//! The first reconcile of a server only adds the finalizer, so teardown runs
//! even for servers deleted before they were ever deployed. Later reconciles
//! deploy the server against the running StorageOS cluster and publish its
//! status.

use crate::context::Context;
use crate::crd::{ClusterPhase, NFSServer, StorageOSCluster};
use crate::errors::{Error, Result};
use crate::events::{actions, reasons};
use crate::kube_api::{self, display_name, ObjectClient};
use crate::labels::FINALIZER_NFS_SERVER;
use crate::nfs::NFSDeployment;
use crate::reconcilers::finalizers::{ensure_finalizer, handle_deletion, FinalizerCleanup};
use crate::reconcilers::status::patch_status_if_changed;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

#[async_trait::async_trait]
impl FinalizerCleanup for NFSServer {
    async fn cleanup(&self, ctx: &Context) -> Result<()> {
        NFSDeployment::new(ctx.client.as_ref(), self).delete().await
    }
}

/// The StorageOS cluster in the `Running` phase.
///
/// # Errors
///
/// Returns [`Error::NoRunningCluster`] if no cluster is running.
pub async fn running_cluster(client: &dyn ObjectClient) -> Result<StorageOSCluster> {
    kube_api::list::<StorageOSCluster>(client, None, None)
        .await?
        .into_iter()
        .find(|c| c.status.as_ref().is_some_and(|s| s.phase == ClusterPhase::Running))
        .ok_or(Error::NoRunningCluster)
}

/// Reconciles an `NFSServer`.
///
/// # Arguments
///
/// * `ctx` - Controller context
/// * `server` - The `NFSServer` to reconcile
///
/// # Errors
///
/// Returns [`Error::NoRunningCluster`] while no StorageOS cluster is running,
/// and any API error raised while deploying or updating status.
pub async fn reconcile_nfsserver(ctx: &Context, server: &NFSServer) -> Result<()> {
    let client = ctx.client.as_ref();
    let name = display_name(server.metadata.namespace.as_deref(), &server.name_any());

    if server.metadata.deletion_timestamp.is_some() {
        info!(server = %name, "Deleting NFS server");
        return handle_deletion(ctx, server, FINALIZER_NFS_SERVER).await;
    }

    if ensure_finalizer(client, server, FINALIZER_NFS_SERVER).await? {
        return Ok(());
    }

    let cluster = running_cluster(client).await?;
    let deployment = NFSDeployment::new(client, server);
    deployment.deploy(&cluster.spec).await?;

    let status = deployment.status().await?;
    let previous_target = server.status.as_ref().and_then(|s| s.remote_target.as_ref());
    if let Some(target) = status
        .remote_target
        .as_ref()
        .filter(|t| Some(*t) != previous_target)
    {
        info!(server = %name, target = %target, "NFS server is reachable");
        ctx.events
            .publish(
                &server.object_ref(&()),
                EventType::Normal,
                reasons::CHANGED_STATUS,
                actions::RECONCILE,
                Some(format!("NFS server available at {target}")),
            )
            .await;
    }

    if patch_status_if_changed(client, server, server.status.as_ref(), &status).await? {
        debug!(server = %name, phase = ?status.phase, "Updated NFS server status");
    }
    Ok(())
}

#[cfg(test)]
#[path = "nfsserver_tests.rs"]
mod nfsserver_tests;
