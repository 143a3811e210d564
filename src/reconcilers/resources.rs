// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic create/update/delete helpers for Kubernetes resources.
//!
//! Every builder step goes through these helpers, so idempotency is decided
//! in one place:
//!
//! - **Create if absent**: `AlreadyExists` is success and the live object is
//!   left untouched. This is the default for every kind.
//! - **Create or update**: on `AlreadyExists` the live object is replaced with
//!   the desired one, keeping its `resourceVersion`. Used for the few objects
//!   that must track spec changes (node `ConfigMap`, and api-manager,
//!   scheduler and ingress objects when updates are allowed).
//! - **Delete if present**: `NotFound` is success.
//!
//! All other errors are returned unchanged.
//!
//! # Example
//!
//! ```rust,ignore
//! use storageos_operator::reconcilers::resources::{apply, UpdatePolicy};
//!
//! apply(client, &config_map, UpdatePolicy::CreateOrUpdate).await?;
//! ```

use crate::errors::Result;
use crate::kube_api::{self, display_name, Object, ObjectClient};
use crate::metrics;
use kube::Resource;
use tracing::{debug, info};

/// How an existing object is treated when it is applied again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Leave existing objects alone
    CreateOnly,
    /// Replace existing objects with the desired state
    CreateOrUpdate,
}

impl UpdatePolicy {
    /// `CreateOrUpdate` when `allowed`, `CreateOnly` otherwise.
    #[must_use]
    pub fn updates_if(allowed: bool) -> Self {
        if allowed {
            Self::CreateOrUpdate
        } else {
            Self::CreateOnly
        }
    }
}

fn object_name<K: Object>(object: &K) -> String {
    display_name(
        object.meta().namespace.as_deref(),
        object.meta().name.as_deref().unwrap_or_default(),
    )
}

/// Create `object` unless it already exists.
///
/// # Errors
///
/// Returns every API error except `AlreadyExists`.
pub async fn create_if_absent<K: Object>(client: &dyn ObjectClient, object: &K) -> Result<()> {
    let kind = K::kind(&());
    match kube_api::create(client, object).await {
        Ok(_) => {
            info!("Created {} {}", kind, object_name(object));
            metrics::record_resource_created(&kind);
            Ok(())
        }
        Err(e) if e.is_already_exists() => {
            debug!("{} {} already exists", kind, object_name(object));
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Create `object`, or replace the live object if it exists.
///
/// # Errors
///
/// Returns API errors, including `Conflict` if the live object changed
/// between the read and the replace.
pub async fn create_or_update<K: Object>(client: &dyn ObjectClient, object: &K) -> Result<()> {
    let kind = K::kind(&());
    match kube_api::create(client, object).await {
        Ok(_) => {
            info!("Created {} {}", kind, object_name(object));
            metrics::record_resource_created(&kind);
            Ok(())
        }
        Err(e) if e.is_already_exists() => {
            let name = object.meta().name.clone().unwrap_or_default();
            let existing: K =
                kube_api::get(client, object.meta().namespace.as_deref(), &name).await?;

            let mut desired = object.clone();
            desired.meta_mut().resource_version = existing.meta().resource_version.clone();
            kube_api::replace(client, &desired).await?;

            debug!("Updated {} {}", kind, object_name(object));
            metrics::record_resource_updated(&kind);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Apply `object` with the given policy.
///
/// # Errors
///
/// See [`create_if_absent`] and [`create_or_update`].
pub async fn apply<K: Object>(
    client: &dyn ObjectClient,
    object: &K,
    policy: UpdatePolicy,
) -> Result<()> {
    match policy {
        UpdatePolicy::CreateOnly => create_if_absent(client, object).await,
        UpdatePolicy::CreateOrUpdate => create_or_update(client, object).await,
    }
}

/// Delete an object, treating `NotFound` as success.
///
/// # Errors
///
/// Returns every API error except `NotFound`.
pub async fn delete_if_present<K: Object>(
    client: &dyn ObjectClient,
    namespace: Option<&str>,
    name: &str,
) -> Result<()> {
    let kind = K::kind(&());
    match kube_api::delete::<K>(client, namespace, name).await {
        Ok(()) => {
            info!("Deleted {} {}", kind, display_name(namespace, name));
            metrics::record_resource_deleted(&kind);
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            debug!("{} {} already gone", kind, display_name(namespace, name));
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
