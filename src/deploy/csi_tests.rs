// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `deploy/csi.rs`

#[cfg(test)]
mod tests {
    use crate::capabilities::Capabilities;
    use crate::constants::{
        CSI_CONTROLLER_EXPAND_SECRET_NAME, CSI_DRIVER_NAME, CSI_HELPER_DEPLOYMENT_NAME,
        CSI_HELPER_STATEFULSET_NAME, CSI_NODE_PUBLISH_SECRET_NAME,
        CSI_V1_EXTERNAL_ATTACHER_V3_IMAGE,
    };
    use crate::crd::StorageOSClusterSpec;
    use crate::deploy::csi::{
        build_csi_driver, build_helper_deployment, build_helper_statefulset, credential_secrets,
        helper_containers, HelperKind,
    };

    fn csi_spec() -> StorageOSClusterSpec {
        let mut spec = StorageOSClusterSpec::default();
        spec.csi.enable = true;
        spec
    }

    fn names(spec: &StorageOSClusterSpec, caps: &Capabilities) -> Vec<String> {
        helper_containers(spec, caps)
            .into_iter()
            .map(|c| c.name)
            .collect()
    }

    #[test]
    fn test_helper_kind_from_strategy() {
        let mut spec = csi_spec();
        assert_eq!(HelperKind::from_spec(&spec), HelperKind::StatefulSet);

        spec.csi.deployment_strategy = Some("Deployment".to_string());
        assert_eq!(HelperKind::from_spec(&spec), HelperKind::Deployment);
        assert_eq!(HelperKind::Deployment.name(), CSI_HELPER_DEPLOYMENT_NAME);
        assert_eq!(HelperKind::StatefulSet.name(), CSI_HELPER_STATEFULSET_NAME);
    }

    #[test]
    fn test_credential_secrets_follow_flags() {
        let mut spec = csi_spec();
        assert!(credential_secrets(&spec).is_empty());

        spec.csi.enable_node_publish_creds = true;
        spec.csi.enable_controller_expand_creds = true;
        let secrets: Vec<&str> = credential_secrets(&spec).iter().map(|s| s.name).collect();
        assert_eq!(
            secrets,
            vec![CSI_NODE_PUBLISH_SECRET_NAME, CSI_CONTROLLER_EXPAND_SECRET_NAME]
        );
    }

    #[test]
    fn test_csi_driver() {
        let driver = build_csi_driver(&csi_spec());
        assert_eq!(driver.metadata.name.as_deref(), Some(CSI_DRIVER_NAME));
        assert_eq!(driver.spec.attach_required, Some(true));
        assert_eq!(driver.spec.pod_info_on_mount, Some(true));
    }

    #[test]
    fn test_containers_on_1_13_without_csidriver_kind() {
        let spec = csi_spec();
        let caps = Capabilities::from_parts("v1.13.5", false, false, &spec);
        assert_eq!(
            names(&spec, &caps),
            vec![
                "csi-external-provisioner",
                "csi-external-attacher",
                "csi-driver-k8s-registrar"
            ]
        );
    }

    #[test]
    fn test_containers_on_recent_server() {
        let spec = csi_spec();
        let caps = Capabilities::from_parts("v1.19.0", true, false, &spec);
        let containers = helper_containers(&spec, &caps);
        let names: Vec<&str> = containers.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(
            names,
            vec![
                "csi-external-provisioner",
                "csi-external-attacher",
                "csi-external-resizer"
            ]
        );
        assert_eq!(
            containers[1].image.as_deref(),
            Some(CSI_V1_EXTERNAL_ATTACHER_V3_IMAGE)
        );
    }

    #[test]
    fn test_helper_workloads() {
        let spec = csi_spec();
        let caps = Capabilities::from_parts("v1.19.0", true, false, &spec);

        let sts = build_helper_statefulset(&spec, &caps);
        assert_eq!(sts.metadata.name.as_deref(), Some(CSI_HELPER_STATEFULSET_NAME));
        assert_eq!(sts.spec.unwrap().replicas, Some(1));

        let deploy = build_helper_deployment(&spec, &caps);
        assert_eq!(deploy.metadata.name.as_deref(), Some(CSI_HELPER_DEPLOYMENT_NAME));
        let pod = deploy.spec.unwrap().template.spec.unwrap();
        assert_eq!(
            pod.service_account_name.as_deref(),
            Some(HelperKind::Deployment.service_account())
        );
    }
}
