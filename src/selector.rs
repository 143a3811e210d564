// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Node selection for the StorageOS join token.
//!
//! A node joins the cluster when:
//!
//! 1. all of its `NoSchedule` / `NoExecute` taints are tolerated, and
//! 2. it matches at least one node selector term (when terms are given).
//!
//! Within a term every expression must match. Only the `In` and `NotIn`
//! operators are supported. Any other operator fails the whole selection,
//! so callers never see a partial node list.

use crate::errors::{Error, Result};
use k8s_openapi::api::core::v1::{Node, NodeSelectorTerm, Taint, Toleration};
use kube::ResourceExt;
use std::collections::BTreeMap;

const OPERATOR_IN: &str = "In";
const OPERATOR_NOT_IN: &str = "NotIn";

/// Whether `toleration` tolerates `taint`, with Kubernetes semantics.
#[must_use]
pub fn tolerates(toleration: &Toleration, taint: &Taint) -> bool {
    if let Some(effect) = toleration.effect.as_deref().filter(|e| !e.is_empty()) {
        if effect != taint.effect {
            return false;
        }
    }

    let key = toleration.key.as_deref().unwrap_or_default();
    match toleration.operator.as_deref().unwrap_or("Equal") {
        "Exists" => key.is_empty() || key == taint.key,
        "Equal" | "" => {
            key == taint.key
                && toleration.value.as_deref().unwrap_or_default()
                    == taint.value.as_deref().unwrap_or_default()
        }
        _ => false,
    }
}

/// Whether every scheduling taint of `node` is tolerated.
///
/// `PreferNoSchedule` taints never keep a node out.
#[must_use]
pub fn tolerates_node(node: &Node, tolerations: &[Toleration]) -> bool {
    node.spec
        .as_ref()
        .and_then(|spec| spec.taints.as_ref())
        .map_or(true, |taints| {
            taints
                .iter()
                .filter(|taint| taint.effect == "NoSchedule" || taint.effect == "NoExecute")
                .all(|taint| tolerations.iter().any(|t| tolerates(t, taint)))
        })
}

/// Reject terms that use operators other than `In` / `NotIn`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedSelectorOperator`] for the first offending operator.
pub fn validate_terms(terms: &[NodeSelectorTerm]) -> Result<()> {
    for term in terms {
        for expr in term.match_expressions.iter().flatten() {
            if expr.operator != OPERATOR_IN && expr.operator != OPERATOR_NOT_IN {
                return Err(Error::UnsupportedSelectorOperator(expr.operator.clone()));
            }
        }
    }
    Ok(())
}

fn term_matches(term: &NodeSelectorTerm, labels: &BTreeMap<String, String>) -> bool {
    let expressions = term.match_expressions.as_deref().unwrap_or_default();
    if expressions.is_empty() {
        return false;
    }
    expressions.iter().all(|expr| {
        let values = expr.values.as_deref().unwrap_or_default();
        let label = labels.get(&expr.key);
        match expr.operator.as_str() {
            OPERATOR_IN => label.is_some_and(|v| values.contains(v)),
            OPERATOR_NOT_IN => label.is_none_or(|v| !values.contains(v)),
            _ => false,
        }
    })
}

/// Whether `labels` satisfy the terms. No terms select everything.
///
/// Terms must have been checked with [`validate_terms`].
#[must_use]
pub fn matches_terms(terms: &[NodeSelectorTerm], labels: &BTreeMap<String, String>) -> bool {
    terms.is_empty() || terms.iter().any(|term| term_matches(term, labels))
}

/// Nodes that are tolerated and match the selector terms, in list order.
///
/// # Errors
///
/// Returns [`Error::UnsupportedSelectorOperator`] if a term uses an
/// unsupported operator.
pub fn select_nodes<'a>(
    nodes: &'a [Node],
    terms: &[NodeSelectorTerm],
    tolerations: &[Toleration],
) -> Result<Vec<&'a Node>> {
    validate_terms(terms)?;
    Ok(nodes
        .iter()
        .filter(|node| tolerates_node(node, tolerations))
        .filter(|node| matches_terms(terms, node.labels()))
        .collect())
}

/// Preferred address of a node: its `InternalIP`, else its first address.
#[must_use]
pub fn node_address(node: &Node) -> Option<String> {
    let addresses = node.status.as_ref()?.addresses.as_ref()?;
    addresses
        .iter()
        .find(|a| a.type_ == "InternalIP")
        .or_else(|| addresses.first())
        .map(|a| a.address.clone())
}

/// Comma separated addresses of `nodes`, in order. Nodes without an address are skipped.
#[must_use]
pub fn join_token(nodes: &[&Node]) -> String {
    nodes
        .iter()
        .filter_map(|node| node_address(node))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
