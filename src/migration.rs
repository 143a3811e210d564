// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Startup cleanup of objects left behind by older operator releases.
//!
//! Older releases served the scheduler admission webhook from the operator
//! itself. The api-manager owns that webhook now, so the old webhook
//! configuration and its `Service` are removed at startup.

use crate::constants::LEGACY_SCHEDULER_WEBHOOK_NAME;
use crate::errors::Result;
use crate::kube_api::ObjectClient;
use crate::reconcilers::resources::delete_if_present;
use k8s_openapi::api::admissionregistration::v1::MutatingWebhookConfiguration;
use k8s_openapi::api::core::v1::Service;
use tracing::info;

/// Delete the legacy scheduler webhook configuration and its `Service`.
///
/// Objects that are already gone are skipped.
///
/// # Arguments
///
/// * `client` - Object client
/// * `operator_namespace` - Namespace the legacy `Service` lived in
///
/// # Errors
///
/// Returns API errors other than `NotFound`.
pub async fn remove_legacy_webhook(
    client: &dyn ObjectClient,
    operator_namespace: &str,
) -> Result<()> {
    info!("Removing legacy scheduler webhook");
    delete_if_present::<MutatingWebhookConfiguration>(client, None, LEGACY_SCHEDULER_WEBHOOK_NAME)
        .await?;
    delete_if_present::<Service>(
        client,
        Some(operator_namespace),
        LEGACY_SCHEDULER_WEBHOOK_NAME,
    )
    .await
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod migration_tests;
