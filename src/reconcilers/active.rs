// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tracking of the single active resource of a kind.
//!
//! Upgrades and jobs run one at a time. A reconciler keeps the identity of
//! the resource it is working on and rejects any other until that one
//! completes or is deleted.

use crate::kube_api::{display_name, Object};

/// Namespace, name and UID of a custom resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub namespace: Option<String>,
    pub name: String,
    pub uid: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn of<K: Object>(resource: &K) -> Self {
        let meta = resource.meta();
        Self {
            namespace: meta.namespace.clone(),
            name: meta.name.clone().unwrap_or_default(),
            uid: meta.uid.clone(),
        }
    }

    /// Whether this identity names `namespace/name`, regardless of UID.
    #[must_use]
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.name == name
    }

    #[must_use]
    pub fn display(&self) -> String {
        display_name(self.namespace.as_deref(), &self.name)
    }
}

/// Outcome of [`admit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Nothing was active; the candidate is now active
    Adopted,
    /// The candidate already was the active resource
    Active,
    /// Same name as the active resource but a new UID; the candidate replaced it
    Recreated,
    /// Another resource is active, given as `namespace/name`
    Rejected(String),
}

/// Make `candidate` the active resource unless another one holds the slot.
pub fn admit(slot: &mut Option<Identity>, candidate: Identity) -> Admission {
    match slot.as_ref() {
        None => {
            *slot = Some(candidate);
            Admission::Adopted
        }
        Some(active)
            if active.namespace == candidate.namespace && active.name == candidate.name =>
        {
            if active.uid == candidate.uid {
                Admission::Active
            } else {
                *slot = Some(candidate);
                Admission::Recreated
            }
        }
        Some(active) => Admission::Rejected(active.display()),
    }
}

/// Clear the slot if it holds `namespace/name`.
///
/// # Returns
///
/// `true` if the slot was cleared.
pub fn release(slot: &mut Option<Identity>, namespace: &str, name: &str) -> bool {
    slot.take_if(|active| active.is(namespace, name)).is_some()
}

#[cfg(test)]
#[path = "active_tests.rs"]
mod active_tests;
