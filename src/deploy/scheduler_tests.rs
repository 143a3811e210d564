// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `deploy/scheduler.rs`

#[cfg(test)]
mod tests {
    use crate::constants::{SCHEDULER_CONFIG_CONFIGMAP, SCHEDULER_NAME, SCHEDULER_POLICY_CONFIGMAP};
    use crate::crd::StorageOSClusterSpec;
    use crate::deploy::scheduler::{
        build_config_configmap, build_deployment, build_policy_configmap, render_config,
        render_policy,
    };

    #[test]
    fn test_policy_points_at_api_service() {
        let mut spec = StorageOSClusterSpec {
            namespace: Some("storageos".to_string()),
            ..Default::default()
        };
        spec.service.name = Some("stos".to_string());
        spec.service.external_port = Some(5706);

        let policy = render_policy(&spec);
        assert!(policy.contains("http://stos.storageos.svc:5706/v1/scheduler"));
        assert!(!policy.contains("{{"));

        let parsed: serde_json::Value = serde_json::from_str(&policy).unwrap();
        assert_eq!(parsed["kind"], "Policy");
    }

    #[test]
    fn test_config_references_policy_configmap() {
        let config = render_config(&StorageOSClusterSpec::default());
        let parsed: serde_yaml::Value = serde_yaml::from_str(&config).unwrap();

        assert_eq!(parsed["schedulerName"].as_str(), Some(SCHEDULER_NAME));
        assert_eq!(
            parsed["algorithmSource"]["policy"]["configMap"]["name"].as_str(),
            Some(SCHEDULER_POLICY_CONFIGMAP)
        );
        assert_eq!(
            parsed["algorithmSource"]["policy"]["configMap"]["namespace"].as_str(),
            Some("kube-system")
        );
    }

    #[test]
    fn test_configmaps() {
        let spec = StorageOSClusterSpec::default();
        let policy = build_policy_configmap(&spec);
        assert_eq!(policy.metadata.name.as_deref(), Some(SCHEDULER_POLICY_CONFIGMAP));
        assert!(policy.data.unwrap().contains_key("policy.cfg"));

        let config = build_config_configmap(&spec);
        assert_eq!(config.metadata.name.as_deref(), Some(SCHEDULER_CONFIG_CONFIGMAP));
        assert!(config.data.unwrap().contains_key("config.yaml"));
    }

    #[test]
    fn test_deployment_mounts_config() {
        let deploy = build_deployment(&StorageOSClusterSpec::default());
        let pod = deploy.spec.unwrap().template.spec.unwrap();

        let volume = &pod.volumes.unwrap()[0];
        assert_eq!(
            volume.config_map.as_ref().unwrap().name,
            SCHEDULER_CONFIG_CONFIGMAP
        );
        assert!(pod.containers[0]
            .args
            .as_ref()
            .unwrap()
            .contains(&"--config=/storageos-scheduler/config.yaml".to_string()));
    }
}
