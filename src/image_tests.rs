// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `image.rs`

#[cfg(test)]
mod tests {
    use crate::image::{image_tag, is_v2_image, tag_major_version};

    #[test]
    fn test_is_v2_image() {
        assert!(!is_v2_image("storageos/node"));
        assert!(!is_v2_image("storageos/node:1.2.0"));
        assert!(is_v2_image("storageos/node:2.0.0"));
        assert!(is_v2_image("storageos/node:c2-7c46250197bf"));
        assert!(!is_v2_image("2.0.0"));
    }

    #[test]
    fn test_registry_port_is_not_a_tag() {
        assert_eq!(image_tag("registry:5000/storageos/node"), None);
        assert_eq!(image_tag("registry:5000/storageos/node:2.1.0"), Some("2.1.0"));
        assert!(is_v2_image("registry:5000/storageos/node:v2.1.0"));
        assert!(!is_v2_image("registry:5000/storageos/node"));
    }

    #[test]
    fn test_digest_is_ignored() {
        assert_eq!(image_tag("storageos/node:1.5.3@sha256:abcd"), Some("1.5.3"));
        assert!(!is_v2_image("storageos/node:1.5.3@sha256:abcd"));
    }

    #[test]
    fn test_tag_major_version() {
        assert_eq!(tag_major_version("1.5.3"), Some(1));
        assert_eq!(tag_major_version("v2.2.0-rc.1"), Some(2));
        assert_eq!(tag_major_version("2"), Some(2));
        assert_eq!(tag_major_version("c2-7c46250197bf"), None);
        assert_eq!(tag_major_version("1.2.3.4"), None);
    }
}
