// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `deploy/storageclass.rs`

#[cfg(test)]
mod tests {
    use crate::capabilities::Capabilities;
    use crate::crd::StorageOSClusterSpec;
    use crate::deploy::storageclass::{build_storage_class, parameters, INTREE_PROVISIONER};

    #[test]
    fn test_intree_parameters_reference_admin_secret() {
        let spec = StorageOSClusterSpec {
            secret_ref_name: Some("storageos-api".to_string()),
            secret_ref_namespace: Some("default".to_string()),
            ..Default::default()
        };
        let caps = Capabilities::from_parts("v1.18.0", false, false, &spec);
        let params = parameters(&spec, &caps);

        assert_eq!(params["pool"], "default");
        assert_eq!(params["adminSecretName"], "storageos-api");
        assert_eq!(params["adminSecretNamespace"], "default");

        let class = build_storage_class(&spec, &caps);
        assert_eq!(class.provisioner, INTREE_PROVISIONER);
        assert_eq!(class.metadata.name.as_deref(), Some("fast"));
    }

    #[test]
    fn test_csi_v1_parameter_names() {
        let mut spec = StorageOSClusterSpec::default();
        spec.csi.enable = true;
        spec.csi.enable_provision_creds = true;
        let caps = Capabilities::from_parts("v1.18.0", true, false, &spec);
        let params = parameters(&spec, &caps);

        assert_eq!(
            params["csi.storage.k8s.io/provisioner-secret-namespace"],
            "kube-system"
        );
        assert!(!params.contains_key("pool"));
        assert_eq!(
            build_storage_class(&spec, &caps).allow_volume_expansion,
            Some(true)
        );
    }

    #[test]
    fn test_csi_v0_parameter_names() {
        let mut spec = StorageOSClusterSpec::default();
        spec.csi.enable = true;
        spec.csi.enable_controller_publish_creds = true;
        let caps = Capabilities::from_parts("v1.12.0", false, false, &spec);
        let params = parameters(&spec, &caps);

        assert_eq!(
            params["csiControllerPublishSecretName"],
            "csi-controller-publish-secret"
        );
        assert!(build_storage_class(&spec, &caps)
            .allow_volume_expansion
            .is_none());
    }

    #[test]
    fn test_custom_name() {
        let spec = StorageOSClusterSpec {
            storage_class_name: Some("storageos".to_string()),
            ..Default::default()
        };
        let caps = Capabilities::from_parts("v1.18.0", false, false, &spec);
        assert_eq!(
            build_storage_class(&spec, &caps).metadata.name.as_deref(),
            Some("storageos")
        );
    }
}
