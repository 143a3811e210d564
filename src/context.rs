// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all controllers.
//!
//! Every reconciler receives an `Arc<Context>` holding the collaborators it
//! talks to. Each one sits behind a trait so unit tests can swap in the
//! in-memory doubles:
//! - [`ObjectClient`] for reading and writing Kubernetes objects
//! - [`Discovery`] for the server version and installed kinds
//! - [`EventPublisher`] for Kubernetes Events
//! - [`Prober`] for node health checks

use crate::constants::{DEFAULT_OPERATOR_NAMESPACE, DEFAULT_REQUEUE_SECS, CONTROLLER_NAME};
use crate::discovery::{Discovery, KubeDiscovery};
use crate::events::{EventPublisher, KubeEventPublisher};
use crate::health::{Prober, TcpProber};
use crate::kube_api::{KubeObjectClient, ObjectClient};
use kube::Client;
use std::sync::Arc;
use std::time::Duration;

/// Operator-wide settings.
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// Namespace the operator runs in
    pub operator_namespace: String,
    /// Requeue period applied after every reconcile
    pub requeue: Duration,
    /// Let the builders update api-manager, scheduler and ingress objects in place
    pub allow_updates: bool,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            requeue: Duration::from_secs(DEFAULT_REQUEUE_SECS),
            allow_updates: false,
        }
    }
}

/// Shared context passed to all controllers.
#[derive(Clone)]
pub struct Context {
    pub client: Arc<dyn ObjectClient>,
    pub discovery: Arc<dyn Discovery>,
    pub events: Arc<dyn EventPublisher>,
    pub prober: Arc<dyn Prober>,
    pub config: OperatorConfig,
}

impl Context {
    /// Production context backed by a live API server.
    #[must_use]
    pub fn new(client: Client, config: OperatorConfig) -> Self {
        Self {
            client: Arc::new(KubeObjectClient::new(client.clone())),
            discovery: Arc::new(KubeDiscovery::new(client.clone())),
            events: Arc::new(KubeEventPublisher::new(client, CONTROLLER_NAME)),
            prober: Arc::new(TcpProber::default()),
            config,
        }
    }
}
