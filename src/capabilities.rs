// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Version and feature gates for a single reconcile.
//!
//! [`Capabilities`] is computed once per reconcile and handed to the
//! builders, so every call site sees the same answer for "is CSI v1
//! supported" or "is this OpenShift".

use crate::crd::StorageOSClusterSpec;
use crate::discovery::{Discovery, CSI_DRIVER_GROUP_VERSION, SERVICE_MONITOR_GROUP_VERSION};
use crate::errors::Result;
use crate::image::is_v2_image;
use tracing::{debug, warn};

/// Parsed `major.minor.patch` of an API server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ServerVersion {
    /// Parse versions such as `1.13.0`, `v1.18.3+k3s1` or `v1.20.4-gke.1800`.
    ///
    /// Vendor suffixes on the minor (`1.18+`) are tolerated.
    #[must_use]
    pub fn parse(version: &str) -> Option<Self> {
        let version = version.trim();
        let version = version.strip_prefix('v').unwrap_or(version);
        let core = version.split(['-', '+']).next().unwrap_or(version);
        let mut parts = core.split('.');

        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.trim_end_matches('+').parse().ok()?;
        let patch = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        Some(Self {
            major,
            minor,
            patch,
        })
    }

    #[must_use]
    pub fn at_least(&self, major: u64, minor: u64) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

/// Whether `version` is at least `major.minor`. Unparsable versions are not.
#[must_use]
pub fn version_at_least(version: &str, major: u64, minor: u64) -> bool {
    ServerVersion::parse(version).is_some_and(|v| v.at_least(major, minor))
}

/// CSI v1 needs Kubernetes 1.13 or later.
#[must_use]
pub fn csi_v1_supported(version: &str) -> bool {
    version_at_least(version, 1, 13)
}

/// Feature set of the target cluster for one reconcile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// CSI v1 images, paths and secret keys (>= 1.13)
    pub csi_v1: bool,
    /// Kubelet plugin watcher, adds `--kubelet-registration-path` (>= 1.12)
    pub kubelet_plugin_watcher: bool,
    /// external-attacher v2 (>= 1.14)
    pub csi_attacher_v2: bool,
    /// external-resizer (>= 1.16)
    pub csi_resizer: bool,
    /// external-attacher v3 (>= 1.17)
    pub csi_attacher_v3: bool,
    /// `CSIDriver` kind is served
    pub csi_driver_kind: bool,
    /// `ServiceMonitor` kind is served
    pub service_monitor_kind: bool,
    /// Distribution hint contains `openshift`
    pub openshift: bool,
    /// Node image runs the v2 agent
    pub node_v2: bool,
    /// CSI is deployed (forced on for v2 nodes)
    pub csi_enabled: bool,
}

impl Capabilities {
    /// Build the capability set from already discovered facts.
    ///
    /// # Arguments
    ///
    /// * `version` - API server git version
    /// * `csi_driver_kind` - Whether `CSIDriver` is served
    /// * `service_monitor_kind` - Whether `ServiceMonitor` is served
    /// * `spec` - Cluster spec, for the node image, CSI flag and distro hint
    #[must_use]
    pub fn from_parts(
        version: &str,
        csi_driver_kind: bool,
        service_monitor_kind: bool,
        spec: &StorageOSClusterSpec,
    ) -> Self {
        let parsed = ServerVersion::parse(version);
        if parsed.is_none() {
            warn!(version, "Unable to parse API server version, assuming oldest feature set");
        }
        let at_least = |major, minor| parsed.is_some_and(|v| v.at_least(major, minor));
        let node_v2 = is_v2_image(&spec.node_container_image());

        Self {
            csi_v1: at_least(1, 13),
            kubelet_plugin_watcher: at_least(1, 12),
            csi_attacher_v2: at_least(1, 14),
            csi_resizer: at_least(1, 16),
            csi_attacher_v3: at_least(1, 17),
            csi_driver_kind,
            service_monitor_kind,
            openshift: spec.k8s_distro().to_lowercase().contains("openshift"),
            node_v2,
            csi_enabled: spec.csi.enable || node_v2,
        }
    }

    /// Query discovery and build the capability set.
    ///
    /// # Errors
    ///
    /// Returns discovery errors.
    pub async fn discover(discovery: &dyn Discovery, spec: &StorageOSClusterSpec) -> Result<Self> {
        let version = discovery.server_version().await?;
        let csi_driver_kind = discovery
            .has_kind(CSI_DRIVER_GROUP_VERSION, "CSIDriver")
            .await?;
        let service_monitor_kind = discovery
            .has_kind(SERVICE_MONITOR_GROUP_VERSION, "ServiceMonitor")
            .await?;

        let caps = Self::from_parts(&version, csi_driver_kind, service_monitor_kind, spec);
        debug!(version = %version, capabilities = ?caps, "Discovered cluster capabilities");
        Ok(caps)
    }
}

#[cfg(test)]
#[path = "capabilities_tests.rs"]
mod capabilities_tests;
