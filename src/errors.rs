// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the StorageOS operator.
//!
//! Kubernetes API failures are classified once, when they leave the
//! [`crate::kube_api`] seam, into `NotFound`, `AlreadyExists` and `Conflict`.
//! Reconcilers branch on [`Error::is_not_found`], [`Error::is_already_exists`]
//! and [`Error::is_conflict`] and never inspect message text.

use thiserror::Error;

/// Result alias used throughout the operator library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while reconciling StorageOS resources.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested object does not exist (HTTP 404).
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Object kind
        kind: String,
        /// Object name, `namespace/name` for namespaced objects
        name: String,
    },

    /// A create was attempted for an object that already exists (HTTP 409, reason `AlreadyExists`).
    #[error("{kind} '{name}' already exists")]
    AlreadyExists {
        /// Object kind
        kind: String,
        /// Object name
        name: String,
    },

    /// Optimistic concurrency failure (HTTP 409, reason `Conflict`).
    ///
    /// A newer resource version was written by someone else. The next reconcile
    /// reads the fresh object and retries.
    #[error("Operation cannot be fulfilled on {kind} '{name}': {message}")]
    Conflict {
        /// Object kind
        kind: String,
        /// Object name
        name: String,
        /// Message returned by the API server
        message: String,
    },

    /// Any other Kubernetes client or API error.
    #[error("Kubernetes API error: {0}")]
    Kube(#[source] kube::Error),

    /// Converting between typed objects and their JSON form failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A node selector term used an operator other than `In` / `NotIn`.
    #[error("Unsupported node selector operator '{0}'")]
    UnsupportedSelectorOperator(String),

    /// A second `StorageOSCluster` (or upgrade/job) was seen while another is active.
    #[error("{kind} '{requested}' rejected: '{active}' is already active")]
    AlreadyActive {
        /// Custom resource kind
        kind: String,
        /// `namespace/name` of the active resource
        active: String,
        /// `namespace/name` of the rejected resource
        requested: String,
    },

    /// No `StorageOSCluster` in `Running` phase exists.
    #[error("No running StorageOS cluster found")]
    NoRunningCluster,

    /// The custom resource spec cannot be turned into a deployment plan.
    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    /// An object is missing a field the operator relies on.
    #[error("{kind} is missing required field '{field}'")]
    MissingField {
        /// Object kind
        kind: String,
        /// Field path
        field: String,
    },
}

impl Error {
    /// Classify a `kube::Error` for the object identified by `kind` and `name`.
    ///
    /// # Arguments
    ///
    /// * `err` - Error returned by the kube client
    /// * `kind` - Kind of the object the call was made for
    /// * `name` - Name of the object (`namespace/name` for namespaced objects)
    ///
    /// # Returns
    ///
    /// `NotFound`, `AlreadyExists` or `Conflict` for the corresponding API
    /// responses, `Kube` for everything else.
    #[must_use]
    pub fn from_kube(err: kube::Error, kind: &str, name: &str) -> Self {
        match &err {
            kube::Error::Api(resp) if resp.code == 404 => Self::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
                Self::AlreadyExists {
                    kind: kind.to_string(),
                    name: name.to_string(),
                }
            }
            kube::Error::Api(resp) if resp.code == 409 => Self::Conflict {
                kind: kind.to_string(),
                name: name.to_string(),
                message: resp.message.clone(),
            },
            _ => Self::Kube(err),
        }
    }

    /// Returns `true` if the error means the object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if the error means the object already exists.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns `true` for optimistic concurrency conflicts.
    ///
    /// Conflicts are retryable: a later reconcile observes the newer object.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Short machine-readable label, used for metrics and event notes.
    #[must_use]
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::Conflict { .. } => "conflict",
            Self::Kube(_) => "kube",
            Self::Serialization(_) => "serialization",
            Self::UnsupportedSelectorOperator(_) => "unsupported_selector_operator",
            Self::AlreadyActive { .. } => "already_active",
            Self::NoRunningCluster => "no_running_cluster",
            Self::InvalidSpec(_) => "invalid_spec",
            Self::MissingField { .. } => "missing_field",
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
