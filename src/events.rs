// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes Event recording for StorageOS reconcilers.
//!
//! Events are the user-facing failure channel: they show up in
//! `kubectl describe` on the custom resource. Publishing is fire-and-forget,
//! a failed event is logged and never fails a reconcile.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Publishes Kubernetes Events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an Event on `resource_ref`.
    ///
    /// # Arguments
    ///
    /// * `resource_ref` - The object the event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - Machine-readable reason, see [`reasons`]
    /// * `action` - Action taken, see [`actions`]
    /// * `note` - Human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// [`EventPublisher`] backed by `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a publisher reporting as `controller_name`.
    #[must_use]
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason,
                action,
                object = ?resource_ref.name,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// Event reasons, shown in the REASON column of `kubectl get events`.
pub mod reasons {
    /// A resource could not be created or the CR was rejected
    pub const FAILED_CREATION: &str = "FailedCreation";
    /// Cluster or NFS server status changed
    pub const CHANGED_STATUS: &str = "ChangedStatus";
    /// The cluster is being torn down
    pub const TERMINATING: &str = "Terminating";
    /// Every job pod reported the completion word
    pub const JOB_COMPLETED: &str = "JobCompleted";
    /// The upgrade job succeeded and the cluster runs the new image
    pub const UPGRADE_COMPLETED: &str = "UpgradeCompleted";
}

/// Event actions.
pub mod actions {
    pub const RECONCILE: &str = "Reconcile";
    pub const DEPLOY: &str = "Deploy";
    pub const DELETE: &str = "Delete";
    pub const UPGRADE: &str = "Upgrade";
}
