// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `deploy/secrets.rs`

#[cfg(test)]
mod tests {
    use crate::constants::{
        SECRET_API_PASSWORD_KEY, SECRET_API_USERNAME_KEY, SECRET_PASSWORD_KEY,
        SECRET_USERNAME_KEY, TLS_CERT_KEY, TLS_KEY_KEY,
    };
    use crate::deploy::secrets::{
        build_credentials_secret, build_ingress_tls_secret, copy_secret, Credentials,
    };
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn bytes(value: &str) -> ByteString {
        ByteString(value.as_bytes().to_vec())
    }

    fn secret(entries: &[(&str, &str)]) -> Secret {
        Secret {
            data: Some(
                entries
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), bytes(v)))
                    .collect::<BTreeMap<_, _>>(),
            ),
            type_: Some("Opaque".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_credentials() {
        let creds = Credentials::from_secret(None);
        assert_eq!(creds.username, bytes("storageos"));
        assert_eq!(creds.password, bytes("storageos"));
    }

    #[test]
    fn test_credentials_from_secret() {
        let admin = secret(&[
            (SECRET_API_USERNAME_KEY, "admin"),
            (SECRET_API_PASSWORD_KEY, "hunter2"),
        ]);
        let creds = Credentials::from_secret(Some(&admin));
        assert_eq!(creds.username, bytes("admin"));
        assert_eq!(creds.password, bytes("hunter2"));
    }

    #[test]
    fn test_empty_keys_fall_back_to_defaults() {
        let admin = secret(&[(SECRET_API_USERNAME_KEY, ""), (SECRET_API_PASSWORD_KEY, "pw")]);
        let creds = Credentials::from_secret(Some(&admin));
        assert_eq!(creds.username, bytes("storageos"));
        assert_eq!(creds.password, bytes("pw"));
    }

    #[test]
    fn test_build_credentials_secret() {
        let s = build_credentials_secret("init-secret", "kube-system", &Credentials::default());

        assert_eq!(s.metadata.name.as_deref(), Some("init-secret"));
        assert_eq!(s.type_.as_deref(), Some("kubernetes.io/storageos"));
        let data = s.data.unwrap();
        assert_eq!(data[SECRET_USERNAME_KEY], bytes("storageos"));
        assert_eq!(data[SECRET_PASSWORD_KEY], bytes("storageos"));
    }

    #[test]
    fn test_copy_secret_keeps_type_and_data() {
        let mut source = secret(&[("ca.crt", "CA")]);
        source.type_ = Some("kubernetes.io/tls".to_string());
        let copy = copy_secret(&source, "storageos-tls-etcd", "kube-system");

        assert_eq!(copy.metadata.namespace.as_deref(), Some("kube-system"));
        assert_eq!(copy.type_.as_deref(), Some("kubernetes.io/tls"));
        assert_eq!(copy.data.unwrap()["ca.crt"], bytes("CA"));
    }

    #[test]
    fn test_ingress_tls_secret_requires_cert_and_key() {
        let partial = secret(&[(TLS_CERT_KEY, "CERT")]);
        assert!(build_ingress_tls_secret(&partial, "storageos-tls", "kube-system").is_none());

        let full = secret(&[
            (TLS_CERT_KEY, "CERT"),
            (TLS_KEY_KEY, "KEY"),
            (SECRET_API_PASSWORD_KEY, "pw"),
        ]);
        let tls = build_ingress_tls_secret(&full, "storageos-tls", "kube-system").unwrap();
        assert_eq!(tls.type_.as_deref(), Some("kubernetes.io/tls"));
        let data = tls.data.unwrap();
        assert_eq!(data.len(), 2);
        assert!(!data.contains_key(SECRET_API_PASSWORD_KEY));
    }
}
