// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Secrets derived from the admin and etcd TLS secrets.
//!
//! The admin secret referenced by the cluster (`secretRefName` /
//! `secretRefNamespace`) carries `apiUsername` and `apiPassword`. Without a
//! reference the default `storageos` / `storageos` credentials are used.

use crate::constants::{
    DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME, SECRET_API_PASSWORD_KEY,
    SECRET_API_USERNAME_KEY, SECRET_PASSWORD_KEY, SECRET_USERNAME_KEY, TLS_CERT_KEY, TLS_KEY_KEY,
};
use crate::labels::{kind_labels, KIND_DAEMONSET};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;

/// Admin username and password.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub username: ByteString,
    pub password: ByteString,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: ByteString(DEFAULT_ADMIN_USERNAME.as_bytes().to_vec()),
            password: ByteString(DEFAULT_ADMIN_PASSWORD.as_bytes().to_vec()),
        }
    }
}

impl Credentials {
    /// Credentials from the admin secret; missing keys fall back to the defaults.
    #[must_use]
    pub fn from_secret(secret: Option<&Secret>) -> Self {
        let defaults = Self::default();
        let data = secret.and_then(|s| s.data.as_ref());
        let value = |key: &str| {
            data.and_then(|d| d.get(key))
                .filter(|v| !v.0.is_empty())
                .cloned()
        };
        Self {
            username: value(SECRET_API_USERNAME_KEY).unwrap_or(defaults.username),
            password: value(SECRET_API_PASSWORD_KEY).unwrap_or(defaults.password),
        }
    }
}

fn secret(name: &str, namespace: &str, type_: &str, data: BTreeMap<String, ByteString>) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(kind_labels(KIND_DAEMONSET)),
            ..Default::default()
        },
        type_: Some(type_.to_string()),
        data: Some(data),
        ..Default::default()
    }
}

/// A `username` / `password` secret, used for `init-secret` and the CSI credential secrets.
#[must_use]
pub fn build_credentials_secret(name: &str, namespace: &str, credentials: &Credentials) -> Secret {
    let mut data = BTreeMap::new();
    data.insert(SECRET_USERNAME_KEY.to_string(), credentials.username.clone());
    data.insert(SECRET_PASSWORD_KEY.to_string(), credentials.password.clone());
    secret(name, namespace, "kubernetes.io/storageos", data)
}

/// Copy of `source` under a new name and namespace, keeping its data and type.
#[must_use]
pub fn copy_secret(source: &Secret, name: &str, namespace: &str) -> Secret {
    secret(
        name,
        namespace,
        source.type_.as_deref().unwrap_or("Opaque"),
        source.data.clone().unwrap_or_default(),
    )
}

/// TLS secret for the ingress, from the admin secret's `tls.crt` / `tls.key`.
///
/// `None` when the admin secret has no certificate.
#[must_use]
pub fn build_ingress_tls_secret(admin: &Secret, name: &str, namespace: &str) -> Option<Secret> {
    let data = admin.data.as_ref()?;
    let cert = data.get(TLS_CERT_KEY)?;
    let key = data.get(TLS_KEY_KEY)?;

    let mut tls = BTreeMap::new();
    tls.insert(TLS_CERT_KEY.to_string(), cert.clone());
    tls.insert(TLS_KEY_KEY.to_string(), key.clone());
    Some(secret(name, namespace, "kubernetes.io/tls", tls))
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod secrets_tests;
