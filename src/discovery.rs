// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! API server discovery: server version and available kinds.

use crate::errors::{Error, Result};
use async_trait::async_trait;
use kube::Client;
use tracing::debug;

/// Group/version of the `CSIDriver` kind
pub const CSI_DRIVER_GROUP_VERSION: &str = "storage.k8s.io/v1";

/// Group/version of the Prometheus operator `ServiceMonitor` kind
pub const SERVICE_MONITOR_GROUP_VERSION: &str = "monitoring.coreos.com/v1";

/// Answers questions about what the API server offers.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Git version of the API server, e.g. `v1.18.3+k3s1`.
    async fn server_version(&self) -> Result<String>;

    /// Whether `kind` is served under `group_version` (e.g. `storage.k8s.io/v1`).
    async fn has_kind(&self, group_version: &str, kind: &str) -> Result<bool>;
}

/// [`Discovery`] backed by the discovery endpoints of a live API server.
#[derive(Clone)]
pub struct KubeDiscovery {
    client: Client,
}

impl KubeDiscovery {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Discovery for KubeDiscovery {
    async fn server_version(&self) -> Result<String> {
        let info = self.client.apiserver_version().await.map_err(Error::Kube)?;
        Ok(info.git_version)
    }

    async fn has_kind(&self, group_version: &str, kind: &str) -> Result<bool> {
        let resources = if group_version.contains('/') {
            self.client.list_api_group_resources(group_version).await
        } else {
            self.client.list_core_api_resources(group_version).await
        };

        match resources {
            Ok(list) => Ok(list.resources.iter().any(|r| r.kind == kind)),
            Err(kube::Error::Api(resp)) if resp.code == 404 => {
                debug!(group_version, kind, "API group not served");
                Ok(false)
            }
            Err(e) => Err(Error::Kube(e)),
        }
    }
}
