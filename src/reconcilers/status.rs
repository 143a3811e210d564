// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status subresource helpers.
//!
//! The operator writes status only when it differs structurally from what is
//! stored. Skipping equal writes keeps the controllers from waking themselves
//! up with their own status patches.
//!
//! # Example
//!
//! ```rust,ignore
//! use storageos_operator::reconcilers::status::patch_status_if_changed;
//!
//! let changed =
//!     patch_status_if_changed(client, &cluster, cluster.status.as_ref(), &desired).await?;
//! ```

use crate::errors::Result;
use crate::kube_api::{self, Object, ObjectClient};
use serde::Serialize;
use tracing::debug;

/// Whether `desired` differs from the stored status.
///
/// A missing stored status counts as changed, unless `desired` is the
/// default value, in which case there is nothing worth writing.
#[must_use]
pub fn status_changed<S: PartialEq + Default>(current: Option<&S>, desired: &S) -> bool {
    match current {
        Some(current) => current != desired,
        None => *desired != S::default(),
    }
}

/// Patch the status subresource of `resource` when `desired` differs from `current`.
///
/// # Returns
///
/// `true` if a patch was sent.
///
/// # Errors
///
/// Returns API errors from the patch.
pub async fn patch_status_if_changed<K, S>(
    client: &dyn ObjectClient,
    resource: &K,
    current: Option<&S>,
    desired: &S,
) -> Result<bool>
where
    K: Object,
    S: Serialize + PartialEq + Default + Sync,
{
    if !status_changed(current, desired) {
        debug!(
            kind = %K::kind(&()),
            name = ?resource.meta().name,
            "Status unchanged, skipping update"
        );
        return Ok(false);
    }

    kube_api::patch_status(client, resource, desired).await?;
    debug!(
        kind = %K::kind(&()),
        name = ?resource.meta().name,
        "Updated status"
    );
    Ok(true)
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
