// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Container image reference helpers.

/// Tag of an image reference, if any.
///
/// A `:` only starts a tag when it comes after the last `/`, so registry
/// ports (`registry:5000/storageos/node`) are not mistaken for tags. Digests
/// are ignored.
#[must_use]
pub fn image_tag(image: &str) -> Option<&str> {
    let image = image.split('@').next().unwrap_or(image);
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    let (_, tag) = last_segment.split_once(':')?;
    (!tag.is_empty()).then_some(tag)
}

/// Major version of a `MAJOR[.MINOR[.PATCH]]` tag, allowing a leading `v`
/// and a pre-release or build suffix.
#[must_use]
pub fn tag_major_version(tag: &str) -> Option<u64> {
    let tag = tag.strip_prefix('v').unwrap_or(tag);
    let core = tag.split(['-', '+']).next().unwrap_or(tag);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let numbers = parts
        .iter()
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    numbers.first().copied()
}

/// Whether a node image runs the v2 node agent.
///
/// Untagged references and `1.x` tags are v1. Tags that are not versions
/// (development builds tagged with a commit) and `2.x` or later are v2.
#[must_use]
pub fn is_v2_image(image: &str) -> bool {
    match image_tag(image) {
        None => false,
        Some(tag) => tag_major_version(tag).is_none_or(|major| major >= 2),
    }
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod image_tests;
