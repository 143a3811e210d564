// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `active.rs`

#[cfg(test)]
mod tests {
    use crate::reconcilers::active::{admit, release, Admission, Identity};

    fn id(name: &str, uid: &str) -> Identity {
        Identity {
            namespace: Some("default".to_string()),
            name: name.to_string(),
            uid: Some(uid.to_string()),
        }
    }

    #[test]
    fn test_admit_sequence() {
        let mut slot = None;

        assert_eq!(admit(&mut slot, id("a", "1")), Admission::Adopted);
        assert_eq!(admit(&mut slot, id("a", "1")), Admission::Active);
        assert_eq!(
            admit(&mut slot, id("b", "2")),
            Admission::Rejected("default/a".to_string())
        );
        assert_eq!(admit(&mut slot, id("a", "3")), Admission::Recreated);
        assert_eq!(slot, Some(id("a", "3")));
    }

    #[test]
    fn test_release_only_matching() {
        let mut slot = Some(id("a", "1"));

        assert!(!release(&mut slot, "default", "b"));
        assert!(slot.is_some());
        assert!(release(&mut slot, "default", "a"));
        assert!(slot.is_none());
        assert!(!release(&mut slot, "default", "a"));
    }
}
