// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Node health probing and cluster status aggregation.
//!
//! Each address in the join list is probed on the StorageOS API port. The
//! cluster is `Running` only when every member answers and there is at least
//! one member.

use crate::constants::{HEALTH_PROBE_TIMEOUT_SECS, STORAGEOS_API_PORT};
use crate::crd::{ClusterPhase, MembersStatus};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Checks whether a StorageOS node answers.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Returns `true` if the node at `address` is reachable.
    async fn probe(&self, address: &str) -> bool;
}

/// Dials the StorageOS API port with a short timeout.
#[derive(Clone, Debug)]
pub struct TcpProber {
    port: u16,
    timeout: Duration,
}

impl Default for TcpProber {
    fn default() -> Self {
        Self {
            port: STORAGEOS_API_PORT,
            timeout: Duration::from_secs(HEALTH_PROBE_TIMEOUT_SECS),
        }
    }
}

impl TcpProber {
    /// Probe a port other than the StorageOS API port.
    #[must_use]
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, address: &str) -> bool {
        let target = format!("{address}:{}", self.port);
        match tokio::time::timeout(self.timeout, TcpStream::connect(&target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(target = %target, error = %e, "Node probe failed");
                false
            }
            Err(_) => {
                debug!(target = %target, "Node probe timed out");
                false
            }
        }
    }
}

/// Aggregated health of the cluster members.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterHealth {
    pub phase: ClusterPhase,
    /// `ready/total`
    pub ready: String,
    pub members: MembersStatus,
}

/// Probe every member of the join list, one at a time.
///
/// # Arguments
///
/// * `prober` - Probe implementation
/// * `join` - Comma separated member addresses, may be empty
///
/// # Returns
///
/// `Running` when all members are ready and there is at least one,
/// `Creating` otherwise.
pub async fn cluster_status(prober: &dyn Prober, join: &str) -> ClusterHealth {
    let mut members = MembersStatus::default();

    for address in join.split(',').map(str::trim).filter(|a| !a.is_empty()) {
        if prober.probe(address).await {
            members.ready.push(address.to_string());
        } else {
            members.unready.push(address.to_string());
        }
    }

    let total = members.ready.len() + members.unready.len();
    let phase = if total > 0 && members.ready.len() == total {
        ClusterPhase::Running
    } else {
        ClusterPhase::Creating
    };

    ClusterHealth {
        phase,
        ready: format!("{}/{}", members.ready.len(), total),
        members,
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod health_tests;
