// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes object access for reconcilers and builders.
//!
//! Everything the operator reads or writes goes through the object-safe
//! [`ObjectClient`] trait, which works on [`DynamicObject`]s. The typed helpers
//! in this module ([`get`], [`list`], [`create`], ...) convert any k8s-openapi
//! or CRD type to and from that form with serde, so callers stay typed.
//!
//! [`KubeObjectClient`] is the production implementation over `kube::Client`.
//! Unit tests use the in-memory client from `crate::testing`.

use crate::errors::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{
    ApiResource, DeleteParams, DynamicObject, ListParams, LogParams, Patch, PatchParams,
    PostParams, TypeMeta,
};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Any Kubernetes object type the typed helpers accept.
pub trait Object:
    Resource<DynamicType = ()> + Serialize + DeserializeOwned + Clone + Send + Sync
{
}

impl<K> Object for K where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Clone + Send + Sync
{
}

/// Object-safe access to the Kubernetes API.
///
/// `namespace` is `None` for cluster-scoped objects, and for lists across
/// all namespaces. All errors are classified (see [`Error::from_kube`]).
#[async_trait]
pub trait ObjectClient: Send + Sync {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject>;

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>>;

    async fn create(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject>;

    /// Replace the object. A stale `resourceVersion` yields [`Error::Conflict`].
    async fn replace(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject>;

    /// Merge-patch the status subresource.
    async fn patch_status(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        status: serde_json::Value,
    ) -> Result<DynamicObject>;

    async fn delete(&self, resource: &ApiResource, namespace: Option<&str>, name: &str)
        -> Result<()>;

    /// Full log of the pod's first container.
    async fn pod_logs(&self, namespace: &str, name: &str) -> Result<String>;
}

/// `namespace/name` or `name`, for error messages and logs.
#[must_use]
pub fn display_name(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{ns}/{name}"),
        None => name.to_string(),
    }
}

/// [`ObjectClient`] backed by a live API server.
#[derive(Clone)]
pub struct KubeObjectClient {
    client: Client,
}

impl KubeObjectClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }
}

#[async_trait]
impl ObjectClient for KubeObjectClient {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject> {
        self.api(resource, namespace)
            .get(name)
            .await
            .map_err(|e| Error::from_kube(e, &resource.kind, &display_name(namespace, name)))
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>> {
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        let list = self
            .api(resource, namespace)
            .list(&params)
            .await
            .map_err(|e| Error::from_kube(e, &resource.kind, namespace.unwrap_or("*")))?;
        Ok(list.items)
    }

    async fn create(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject> {
        let name = object.metadata.name.clone().unwrap_or_default();
        self.api(resource, namespace)
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| Error::from_kube(e, &resource.kind, &display_name(namespace, &name)))
    }

    async fn replace(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject> {
        let name = object.metadata.name.clone().unwrap_or_default();
        self.api(resource, namespace)
            .replace(&name, &PostParams::default(), object)
            .await
            .map_err(|e| Error::from_kube(e, &resource.kind, &display_name(namespace, &name)))
    }

    async fn patch_status(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        status: serde_json::Value,
    ) -> Result<DynamicObject> {
        let patch = serde_json::json!({ "status": status });
        self.api(resource, namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| Error::from_kube(e, &resource.kind, &display_name(namespace, name)))
    }

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<()> {
        self.api(resource, namespace)
            .delete(name, &DeleteParams::background())
            .await
            .map(|_| ())
            .map_err(|e| Error::from_kube(e, &resource.kind, &display_name(namespace, name)))
    }

    async fn pod_logs(&self, namespace: &str, name: &str) -> Result<String> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        pods.logs(name, &LogParams::default())
            .await
            .map_err(|e| Error::from_kube(e, "Pod", &display_name(Some(namespace), name)))
    }
}

// ============================================================================
// Typed helpers
// ============================================================================

/// `ApiResource` for a typed object.
#[must_use]
pub fn api_resource<K: Object>() -> ApiResource {
    ApiResource::erase::<K>(&())
}

/// Convert a typed object into a `DynamicObject`.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if the object cannot be represented as JSON.
pub fn to_dynamic<K: Object>(object: &K) -> Result<DynamicObject> {
    let mut dynamic: DynamicObject = serde_json::from_value(serde_json::to_value(object)?)?;
    dynamic.types = Some(TypeMeta {
        api_version: K::api_version(&()).to_string(),
        kind: K::kind(&()).to_string(),
    });
    Ok(dynamic)
}

/// Convert a `DynamicObject` back into its typed form.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if the object does not match `K`.
pub fn from_dynamic<K: Object>(mut object: DynamicObject) -> Result<K> {
    object.types = Some(TypeMeta {
        api_version: K::api_version(&()).to_string(),
        kind: K::kind(&()).to_string(),
    });
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

/// Fetch an object.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the object does not exist.
pub async fn get<K: Object>(
    client: &dyn ObjectClient,
    namespace: Option<&str>,
    name: &str,
) -> Result<K> {
    from_dynamic(client.get(&api_resource::<K>(), namespace, name).await?)
}

/// Fetch an object, mapping NotFound to `None`.
///
/// # Errors
///
/// Returns any API error other than NotFound.
pub async fn get_opt<K: Object>(
    client: &dyn ObjectClient,
    namespace: Option<&str>,
    name: &str,
) -> Result<Option<K>> {
    match get::<K>(client, namespace, name).await {
        Ok(object) => Ok(Some(object)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// List objects, optionally filtered by a label selector.
///
/// # Errors
///
/// Returns API and conversion errors.
pub async fn list<K: Object>(
    client: &dyn ObjectClient,
    namespace: Option<&str>,
    label_selector: Option<&str>,
) -> Result<Vec<K>> {
    client
        .list(&api_resource::<K>(), namespace, label_selector)
        .await?
        .into_iter()
        .map(from_dynamic)
        .collect()
}

/// Create an object in the namespace set in its metadata.
///
/// # Errors
///
/// Returns [`Error::AlreadyExists`] if an object with the same name exists.
pub async fn create<K: Object>(client: &dyn ObjectClient, object: &K) -> Result<K> {
    let namespace = object.meta().namespace.clone();
    debug!(
        kind = %K::kind(&()),
        name = ?object.meta().name,
        namespace = ?namespace,
        "Creating object"
    );
    let created = client
        .create(&api_resource::<K>(), namespace.as_deref(), &to_dynamic(object)?)
        .await?;
    from_dynamic(created)
}

/// Replace an object. The object must carry the `resourceVersion` it was read with.
///
/// # Errors
///
/// Returns [`Error::Conflict`] if the object changed since it was read.
pub async fn replace<K: Object>(client: &dyn ObjectClient, object: &K) -> Result<K> {
    let namespace = object.meta().namespace.clone();
    let replaced = client
        .replace(&api_resource::<K>(), namespace.as_deref(), &to_dynamic(object)?)
        .await?;
    from_dynamic(replaced)
}

/// JSON merge patch turning `current` into `desired`.
///
/// Keys of `current` missing from `desired` are sent as `null`, so fields
/// skipped when empty are removed instead of kept.
#[must_use]
pub fn merge_patch(current: &Value, desired: Value) -> Value {
    match (current, desired) {
        (Value::Object(current), Value::Object(mut desired)) => {
            for (key, value) in &mut desired {
                if let Some(old) = current.get(key) {
                    *value = merge_patch(old, value.take());
                }
            }
            for key in current.keys() {
                desired.entry(key.clone()).or_insert(Value::Null);
            }
            Value::Object(desired)
        }
        (_, desired) => desired,
    }
}

/// Set the status subresource of `object` to `status`.
///
/// Sent as a merge patch against the status `object` carries.
///
/// # Errors
///
/// Returns API and conversion errors.
pub async fn patch_status<K: Object, S: Serialize + Sync>(
    client: &dyn ObjectClient,
    object: &K,
    status: &S,
) -> Result<K> {
    let name = object.meta().name.clone().unwrap_or_default();
    let current = serde_json::to_value(object)?
        .get_mut("status")
        .map_or(Value::Null, Value::take);
    let patched = client
        .patch_status(
            &api_resource::<K>(),
            object.meta().namespace.as_deref(),
            &name,
            merge_patch(&current, serde_json::to_value(status)?),
        )
        .await?;
    from_dynamic(patched)
}

/// Delete an object.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the object does not exist.
pub async fn delete<K: Object>(
    client: &dyn ObjectClient,
    namespace: Option<&str>,
    name: &str,
) -> Result<()> {
    client.delete(&api_resource::<K>(), namespace, name).await
}

#[cfg(test)]
#[path = "kube_api_tests.rs"]
mod kube_api_tests;
