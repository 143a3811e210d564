// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic finalizer management for custom resources.
//!
//! Finalizer changes are written with a full replace carrying the
//! `resourceVersion` the object was read with, so a concurrent writer causes
//! a `Conflict` and the next reconcile retries against the fresh object.
//!
//! # Example
//!
//! ```rust,ignore
//! use storageos_operator::reconcilers::finalizers::{ensure_finalizer, handle_deletion};
//!
//! if server.meta().deletion_timestamp.is_some() {
//!     return handle_deletion(ctx, &server, FINALIZER_NFS_SERVER).await;
//! }
//! if ensure_finalizer(client, &server, FINALIZER_NFS_SERVER).await? {
//!     return Ok(());
//! }
//! ```

use crate::context::Context;
use crate::errors::Result;
use crate::kube_api::{self, display_name, Object, ObjectClient};
use kube::Resource;
use tracing::info;

/// Resources that own cleanup work to run before their finalizer is removed.
#[async_trait::async_trait]
pub trait FinalizerCleanup: Object {
    /// Tear down everything the resource owns.
    ///
    /// If this returns an error the finalizer stays and deletion is blocked
    /// until a later reconcile succeeds.
    ///
    /// # Errors
    ///
    /// Returns the first teardown failure.
    async fn cleanup(&self, ctx: &Context) -> Result<()>;
}

/// Whether `finalizer` is present on `resource`.
#[must_use]
pub fn has_finalizer<K: Object>(resource: &K, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|x| x == finalizer))
}

/// Whether the resource has any finalizer.
#[must_use]
pub fn has_any_finalizer<K: Object>(resource: &K) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| !f.is_empty())
}

/// Add `finalizer` if missing.
///
/// # Returns
///
/// `true` if the finalizer was added (the caller should stop and wait for
/// the resulting watch event), `false` if it was already present.
///
/// # Errors
///
/// Returns API errors, including `Conflict` for stale objects.
pub async fn ensure_finalizer<K: Object>(
    client: &dyn ObjectClient,
    resource: &K,
    finalizer: &str,
) -> Result<bool> {
    if has_finalizer(resource, finalizer) {
        return Ok(false);
    }

    info!(
        "Adding finalizer {} to {} {}",
        finalizer,
        K::kind(&()),
        display_name(
            resource.meta().namespace.as_deref(),
            resource.meta().name.as_deref().unwrap_or_default()
        )
    );

    let mut updated = resource.clone();
    updated
        .meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(finalizer.to_string());
    kube_api::replace(client, &updated).await?;
    Ok(true)
}

/// Remove `finalizer` if present.
///
/// # Errors
///
/// Returns API errors, including `Conflict` for stale objects.
pub async fn remove_finalizer<K: Object>(
    client: &dyn ObjectClient,
    resource: &K,
    finalizer: &str,
) -> Result<()> {
    if !has_finalizer(resource, finalizer) {
        return Ok(());
    }

    info!(
        "Removing finalizer {} from {} {}",
        finalizer,
        K::kind(&()),
        resource.meta().name.as_deref().unwrap_or_default()
    );

    let mut updated = resource.clone();
    if let Some(finalizers) = updated.meta_mut().finalizers.as_mut() {
        finalizers.retain(|f| f != finalizer);
    }
    kube_api::replace(client, &updated).await?;
    Ok(())
}

/// Drop every finalizer so Kubernetes can delete the resource.
///
/// # Errors
///
/// Returns API errors, including `Conflict` for stale objects.
pub async fn clear_finalizers<K: Object>(client: &dyn ObjectClient, resource: &K) -> Result<()> {
    if !has_any_finalizer(resource) {
        return Ok(());
    }
    let mut updated = resource.clone();
    updated.meta_mut().finalizers = None;
    kube_api::replace(client, &updated).await?;
    Ok(())
}

/// Run cleanup for a resource being deleted, then remove its finalizer.
///
/// Does nothing if the finalizer is already gone.
///
/// # Errors
///
/// Returns cleanup or API errors. The finalizer is kept on cleanup failure.
pub async fn handle_deletion<K: FinalizerCleanup>(
    ctx: &Context,
    resource: &K,
    finalizer: &str,
) -> Result<()> {
    if !has_finalizer(resource, finalizer) {
        return Ok(());
    }
    resource.cleanup(ctx).await?;
    remove_finalizer(ctx.client.as_ref(), resource, finalizer).await
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
