// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! NFS server deployment.
//!
//! An `NFSServer` is served by a single NFS-Ganesha pod exporting a
//! StorageOS backed volume. [`NFSDeployment`] creates, in order:
//!
//! 1. the Ganesha `ConfigMap`
//! 2. the `Service` (its cluster IP becomes the status `remoteTarget`)
//! 3. the backing `PersistentVolumeClaim`, unless the server names its own
//! 4. the `StatefulSet`
//!
//! Objects are created once and never updated.

pub mod config;
pub mod workload;

use crate::crd::{NFSServer, NFSServerPhase, NFSServerStatus, StorageOSClusterSpec};
use crate::errors::Result;
use crate::kube_api::{self, ObjectClient};
use crate::labels::{APP_LABEL, APP_STORAGEOS, FENCED_LABEL, NFS_SERVER_LABEL};
use crate::reconcilers::resources::{create_if_absent, delete_if_present};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use std::collections::BTreeMap;
use tracing::debug;

/// Labels of every object belonging to `server`.
///
/// The server's own labels are kept; the operator labels win on conflict.
#[must_use]
pub fn server_labels(server: &NFSServer) -> BTreeMap<String, String> {
    let mut labels = server.metadata.labels.clone().unwrap_or_default();
    labels.insert(APP_LABEL.into(), APP_STORAGEOS.into());
    labels.insert(
        NFS_SERVER_LABEL.into(),
        server.metadata.name.clone().unwrap_or_default(),
    );
    labels.insert(FENCED_LABEL.into(), "true".into());
    labels
}

/// Creates and removes the objects serving one `NFSServer`.
pub struct NFSDeployment<'a> {
    client: &'a dyn ObjectClient,
    server: &'a NFSServer,
}

impl<'a> NFSDeployment<'a> {
    #[must_use]
    pub fn new(client: &'a dyn ObjectClient, server: &'a NFSServer) -> Self {
        Self { client, server }
    }

    fn name(&self) -> &str {
        self.server.metadata.name.as_deref().unwrap_or_default()
    }

    fn namespace(&self) -> Option<&str> {
        self.server.metadata.namespace.as_deref()
    }

    /// Create every object of the server that does not exist yet.
    ///
    /// # Arguments
    ///
    /// * `cluster` - Spec of the running cluster, for the default image and `StorageClass`
    ///
    /// # Errors
    ///
    /// Stops at, and returns, the first failing API call.
    pub async fn deploy(&self, cluster: &StorageOSClusterSpec) -> Result<()> {
        debug!(server = %self.name(), "Deploying NFS server");

        create_if_absent(self.client, &config::build_configmap(self.server)).await?;
        create_if_absent(self.client, &workload::build_service(self.server)).await?;
        if workload::uses_dynamic_claim(self.server) {
            create_if_absent(
                self.client,
                &workload::build_claim(self.server, &cluster.storage_class_name()),
            )
            .await?;
        }
        create_if_absent(
            self.client,
            &workload::build_statefulset(self.server, &cluster.nfs_container_image()),
        )
        .await?;
        Ok(())
    }

    /// Remove every object of the server. Missing objects are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first API error other than `NotFound`.
    pub async fn delete(&self) -> Result<()> {
        let name = self.name().to_string();
        let namespace = self.namespace();

        delete_if_present::<StatefulSet>(self.client, namespace, &name).await?;
        if workload::uses_dynamic_claim(self.server) {
            delete_if_present::<PersistentVolumeClaim>(
                self.client,
                namespace,
                &workload::claim_name(self.server),
            )
            .await?;
        }
        delete_if_present::<Service>(self.client, namespace, &name).await?;
        delete_if_present::<ConfigMap>(self.client, namespace, &name).await?;
        Ok(())
    }

    /// Observed status of the server.
    ///
    /// `Unknown` until both the `StatefulSet` and the `Service` exist,
    /// `Running` once a replica is ready and `Pending` in between.
    ///
    /// # Errors
    ///
    /// Returns API errors other than `NotFound`.
    pub async fn status(&self) -> Result<NFSServerStatus> {
        let name = self.name().to_string();
        let namespace = self.namespace();

        let statefulset =
            kube_api::get_opt::<StatefulSet>(self.client, namespace, &name).await?;
        let service = kube_api::get_opt::<Service>(self.client, namespace, &name).await?;

        let (Some(statefulset), Some(service)) = (statefulset, service) else {
            return Ok(NFSServerStatus::default());
        };

        let ready_replicas = statefulset
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);
        let phase = if ready_replicas >= 1 {
            NFSServerPhase::Running
        } else {
            NFSServerPhase::Pending
        };
        let remote_target = service
            .spec
            .as_ref()
            .and_then(|s| s.cluster_ip.clone())
            .filter(|ip| !ip.is_empty() && ip != "None");

        Ok(NFSServerStatus {
            phase,
            remote_target,
            access_modes: Some(self.server.spec.access_modes()),
        })
    }
}
