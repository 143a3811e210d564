// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! StorageOS `Job` reconciliation.
//!
//! A job runs its container on every selected node through a `DaemonSet`
//! owned by the job. It is complete once the log of every pod matching the
//! job's label selector contains the completion word. Pods whose logs cannot
//! be read are skipped.

use crate::context::Context;
use crate::crd::{StorageOSJob, StorageOSJobStatus};
use crate::deploy::node::{host_path_volume, mount, node_affinity, tolerations};
use crate::errors::{Error, Result};
use crate::events::{actions, reasons};
use crate::kube_api::{self, ObjectClient};
use crate::reconcilers::active::{admit, release, Admission, Identity};
use crate::reconcilers::resources::create_if_absent;
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec};
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const JOB_VOLUME: &str = "job-host-path";

/// `DaemonSet` running the job's container on every selected node.
#[must_use]
pub fn build_job_daemonset(job: &StorageOSJob) -> DaemonSet {
    let labels = job.spec.pod_labels();
    let host_mount = job
        .spec
        .host_path
        .as_deref()
        .zip(job.spec.mount_path.as_deref())
        .filter(|(host, path)| !host.is_empty() && !path.is_empty());

    DaemonSet {
        metadata: ObjectMeta {
            name: job.metadata.name.clone(),
            namespace: job.metadata.namespace.clone(),
            labels: Some(labels.clone()),
            owner_references: job.controller_owner_ref(&()).map(|r| vec![r]),
            ..Default::default()
        },
        spec: Some(DaemonSetSpec {
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
                    containers: vec![Container {
                        name: "job".to_string(),
                        image: Some(job.spec.image.clone()),
                        args: job.spec.args.clone(),
                        volume_mounts: host_mount.map(|(_, path)| vec![mount(JOB_VOLUME, path)]),
                        ..Default::default()
                    }],
                    volumes: host_mount
                        .map(|(host, _)| vec![host_path_volume(JOB_VOLUME, host, None)]),
                    affinity: node_affinity(
                        job.spec.node_selector_terms.as_deref().unwrap_or_default(),
                    ),
                    tolerations: tolerations(
                        job.spec.tolerations.as_deref().unwrap_or_default(),
                    ),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Whether every readable pod log contains `word`.
///
/// Pods whose logs cannot be read are skipped. No pods, or no readable log
/// at all, means not done.
///
/// # Errors
///
/// Returns API errors from listing the pods. Log read failures are not errors.
pub async fn all_pods_done(
    client: &dyn ObjectClient,
    namespace: &str,
    label_selector: &str,
    word: &str,
) -> Result<bool> {
    let pods: Vec<Pod> = kube_api::list(client, Some(namespace), Some(label_selector)).await?;

    let mut checked = 0;
    for pod in &pods {
        let pod_name = pod.name_any();
        let log = match client.pod_logs(namespace, &pod_name).await {
            Ok(log) => log,
            Err(e) => {
                debug!(pod = %pod_name, error = %e, "Unable to read job pod log, skipping");
                continue;
            }
        };
        if !log.contains(word) {
            debug!(pod = %pod_name, "Job pod has not finished");
            return Ok(false);
        }
        checked += 1;
    }
    Ok(checked > 0)
}

/// Reconciler for StorageOS `Job`, holding the active job.
#[derive(Default)]
pub struct JobReconciler {
    current: Mutex<Option<Identity>>,
}

impl JobReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `namespace/name` of the active job, if any.
    pub async fn current(&self) -> Option<String> {
        self.current.lock().await.as_ref().map(Identity::display)
    }

    /// Reconcile the job `namespace/name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyActive`] while another job runs, and any API
    /// error raised along the way.
    pub async fn reconcile(&self, ctx: &Context, namespace: &str, name: &str) -> Result<()> {
        let client = ctx.client.as_ref();
        let mut current = self.current.lock().await;

        let Some(job) = kube_api::get_opt::<StorageOSJob>(client, Some(namespace), name).await?
        else {
            if release(&mut current, namespace, name) {
                debug!(job = %name, "Job deleted");
            }
            return Ok(());
        };

        if job.status.as_ref().is_some_and(|s| s.completed) {
            release(&mut current, namespace, name);
            return Ok(());
        }

        if let Admission::Rejected(active) = admit(&mut current, Identity::of(&job)) {
            let err = Error::AlreadyActive {
                kind: StorageOSJob::kind(&()).to_string(),
                active,
                requested: Identity::of(&job).display(),
            };
            warn!("{err}");
            ctx.events
                .publish(
                    &job.object_ref(&()),
                    EventType::Warning,
                    reasons::FAILED_CREATION,
                    actions::RECONCILE,
                    Some(err.to_string()),
                )
                .await;
            return Err(err);
        }

        create_if_absent(client, &build_job_daemonset(&job)).await?;

        let word = job.spec.completion_word();
        if !all_pods_done(client, namespace, &job.spec.label_selector(), &word).await? {
            return Ok(());
        }

        kube_api::patch_status(client, &job, &StorageOSJobStatus { completed: true }).await?;
        info!(job = %name, "Job completed on all nodes");
        ctx.events
            .publish(
                &job.object_ref(&()),
                EventType::Normal,
                reasons::JOB_COMPLETED,
                actions::RECONCILE,
                Some(format!("All job pods reported '{word}'")),
            )
            .await;
        release(&mut current, namespace, name);
        Ok(())
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod job_tests;
