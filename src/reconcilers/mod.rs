// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation controllers for StorageOS resources.
//!
//! # Reconciliation Architecture
//!
//! Every reconciler is level triggered. It reads the current object, drives
//! the cluster toward the spec through idempotent create/delete helpers and
//! reports back through the status subresource and Kubernetes Events. The
//! entrypoint requeues every object after a fixed period so drift is healed
//! and health is probed again.
//!
//! # Available Reconcilers
//!
//! - [`storageoscluster::ClusterReconciler`] - Deploys and tears down the single StorageOS cluster
//! - [`nfsserver::reconcile_nfsserver`] - Runs NFS servers against the running cluster
//! - [`upgrade::UpgradeReconciler`] - Upgrades the cluster's node image
//! - [`job::JobReconciler`] - Runs a container on every node until each pod logs the completion word
//!
//! The cluster, upgrade and job reconcilers each allow one active resource
//! and keep its identity in the reconciler itself, see [`active`].

pub mod active;
pub mod finalizers;
pub mod job;
pub mod nfsserver;
pub mod resources;
pub mod retry;
pub mod status;
pub mod storageoscluster;
pub mod upgrade;

pub use job::JobReconciler;
pub use nfsserver::reconcile_nfsserver;
pub use storageoscluster::ClusterReconciler;
pub use upgrade::UpgradeReconciler;
