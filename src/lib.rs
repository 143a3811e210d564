// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # StorageOS Operator for Kubernetes
//!
//! A Kubernetes operator that deploys and manages StorageOS clusters, NFS
//! servers, node image upgrades and node-wide maintenance jobs through Custom
//! Resource Definitions (CRDs).
//!
//! ## Overview
//!
//! - A `StorageOSCluster` becomes a node `DaemonSet`, its RBAC, secrets and
//!   configuration, CSI helpers, the api-manager, an optional scheduler
//!   extender and a `StorageClass`
//! - An `NFSServer` becomes a ganesha `StatefulSet` exporting a StorageOS volume
//! - A `StorageOSUpgrade` pauses the cluster and runs the upgrader `Job`
//! - A StorageOS `Job` runs a container on every node until each pod logs its
//!   completion word
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`reconcilers`] - Reconciliation logic for each resource type
//! - [`deploy`] - Builders for everything a cluster runs
//! - [`nfs`] - Builders for NFS servers
//! - [`context`] - Shared context passed to the reconcilers
//! - [`capabilities`] - API server features that change what gets deployed
//! - [`selector`] - Node selection and join token
//! - [`health`] - Member health probing
//!
//! ## Example
//!
//! ```rust,no_run
//! use storageos_operator::crd::{StorageOSCluster, StorageOSClusterSpec};
//!
//! let cluster = StorageOSCluster::new(
//!     "example-storageos",
//!     StorageOSClusterSpec {
//!         secret_ref_name: Some("storageos-api".to_string()),
//!         secret_ref_namespace: Some("default".to_string()),
//!         ..Default::default()
//!     },
//! );
//! assert_eq!(cluster.spec.resource_namespace(), "kube-system");
//! ```

pub mod capabilities;
pub mod constants;
pub mod context;
pub mod crd;
pub mod deploy;
pub mod discovery;
pub mod errors;
pub mod events;
pub mod health;
pub mod image;
pub mod kube_api;
pub mod labels;
pub mod metrics;
pub mod migration;
pub mod nfs;
pub mod reconcilers;
pub mod selector;

#[cfg(test)]
pub mod testing;
