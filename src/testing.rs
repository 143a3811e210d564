// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory doubles for unit tests.
//!
//! [`MemoryClient`] behaves like a tiny API server: resource versions,
//! `AlreadyExists` on duplicate creates, `Conflict` on stale replaces,
//! finalizer-aware deletion and a status subresource that `replace` cannot
//! touch. Failures can be injected per verb, kind and name.

use crate::context::{Context, OperatorConfig};
use crate::discovery::Discovery;
use crate::errors::{Error, Result};
use crate::events::EventPublisher;
use crate::health::Prober;
use crate::kube_api::{api_resource, display_name, from_dynamic, to_dynamic, Object, ObjectClient};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, NodeAddress, NodeStatus, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::api::{ApiResource, DynamicObject};
use kube::runtime::events::EventType;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

/// Verbs failures can be injected for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Get,
    List,
    Create,
    Replace,
    PatchStatus,
    Delete,
}

/// Injected failure kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Failure {
    /// Optimistic concurrency conflict (HTTP 409)
    Conflict,
    /// Internal server error (HTTP 500)
    Server,
}

#[derive(Clone)]
struct Entry {
    seq: u64,
    object: DynamicObject,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<(String, String, String), Entry>,
    seq: u64,
    failures: Vec<(Verb, String, String, Failure)>,
    logs: BTreeMap<(String, String), String>,
    calls: Vec<String>,
}

/// In-memory [`ObjectClient`].
#[derive(Default)]
pub struct MemoryClient {
    state: Mutex<State>,
}

fn type_key(resource: &ApiResource) -> String {
    format!("{}/{}", resource.api_version, resource.kind)
}

fn object_key(
    resource: &ApiResource,
    namespace: Option<&str>,
    name: &str,
) -> (String, String, String) {
    (
        type_key(resource),
        namespace.unwrap_or_default().to_string(),
        name.to_string(),
    )
}

fn labels_match(selector: Option<&str>, labels: Option<&BTreeMap<String, String>>) -> bool {
    let Some(selector) = selector else {
        return true;
    };
    selector
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .all(|pair| match pair.split_once('=') {
            Some((k, v)) => {
                labels.and_then(|l| l.get(k.trim())).map(String::as_str) == Some(v.trim())
            }
            None => labels.is_some_and(|l| l.contains_key(pair.trim())),
        })
}

/// JSON merge patch (RFC 7386).
fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                if value.is_null() {
                    target.remove(key);
                } else {
                    merge(target.entry(key.clone()).or_insert(Value::Null), value);
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

impl MemoryClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check_failure(
        state: &State,
        verb: Verb,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<()> {
        let hit = state.failures.iter().find(|(v, kind, n, _)| {
            *v == verb && *kind == resource.kind && (n.is_empty() || n == name)
        });
        match hit.map(|(_, _, _, f)| *f) {
            Some(Failure::Conflict) => Err(Error::Conflict {
                kind: resource.kind.clone(),
                name: display_name(namespace, name),
                message: "the object has been modified; please apply your changes to the latest version and try again".to_string(),
            }),
            Some(Failure::Server) => Err(Error::Kube(kube::Error::Api(Box::new(
                kube::error::ErrorResponse {
                    status: Some(kube::core::response::StatusSummary::Failure),
                    message: "injected failure".to_string(),
                    reason: "InternalError".to_string(),
                    code: 500,
                    metadata: None,
                    details: None,
                },
            )))),
            None => Ok(()),
        }
    }

    fn not_found(resource: &ApiResource, namespace: Option<&str>, name: &str) -> Error {
        Error::NotFound {
            kind: resource.kind.clone(),
            name: display_name(namespace, name),
        }
    }

    fn record(
        state: &mut State,
        verb: &str,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) {
        state
            .calls
            .push(format!("{verb} {} {}", resource.kind, display_name(namespace, name)));
    }

    /// Make `verb` on `kind` fail. An empty `name` matches every object.
    pub fn fail(&self, verb: Verb, kind: &str, name: &str, failure: Failure) {
        self.lock()
            .failures
            .push((verb, kind.to_string(), name.to_string(), failure));
    }

    /// Drop every injected failure.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Store an object directly, bypassing injected failures.
    pub fn insert<K: Object>(&self, object: &K) {
        let mut dynamic = to_dynamic(object).unwrap_or_else(|e| panic!("serialize: {e}"));
        let resource = api_resource::<K>();
        let mut state = self.lock();
        state.seq += 1;
        let seq = state.seq;
        dynamic.metadata.resource_version = Some(seq.to_string());
        if dynamic.metadata.uid.is_none() {
            dynamic.metadata.uid = Some(format!("uid-{seq}"));
        }
        let key = object_key(
            &resource,
            dynamic.metadata.namespace.as_deref(),
            dynamic.metadata.name.as_deref().unwrap_or_default(),
        );
        state.objects.insert(key, Entry { seq, object: dynamic });
    }

    /// Typed read that never fails; `None` if absent.
    #[must_use]
    pub fn read<K: Object>(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        let state = self.lock();
        state
            .objects
            .get(&object_key(&api_resource::<K>(), namespace, name))
            .and_then(|entry| from_dynamic(entry.object.clone()).ok())
    }

    /// Whether an object exists.
    #[must_use]
    pub fn exists<K: Object>(&self, namespace: Option<&str>, name: &str) -> bool {
        self.read::<K>(namespace, name).is_some()
    }

    /// Number of stored objects of type `K`.
    #[must_use]
    pub fn count<K: Object>(&self) -> usize {
        let key = type_key(&api_resource::<K>());
        self.lock().objects.keys().filter(|(t, _, _)| *t == key).count()
    }

    /// Modify a stored object in place, as another actor would.
    pub fn mutate<K: Object>(&self, namespace: Option<&str>, name: &str, f: impl FnOnce(&mut K)) {
        let mut object: K = self
            .read(namespace, name)
            .unwrap_or_else(|| panic!("no object {name} to mutate"));
        f(&mut object);
        let mut dynamic = to_dynamic(&object).unwrap_or_else(|e| panic!("serialize: {e}"));
        let mut state = self.lock();
        state.seq += 1;
        let seq = state.seq;
        dynamic.metadata.resource_version = Some(seq.to_string());
        if let Some(entry) = state
            .objects
            .get_mut(&object_key(&api_resource::<K>(), namespace, name))
        {
            entry.object = dynamic;
        }
    }

    pub fn set_pod_log(&self, namespace: &str, pod: &str, log: &str) {
        self.lock()
            .logs
            .insert((namespace.to_string(), pod.to_string()), log.to_string());
    }

    /// Recorded calls, e.g. `create ConfigMap kube-system/storageos-node-config`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Recorded calls with the given verb.
    #[must_use]
    pub fn calls_with(&self, verb: &str) -> Vec<String> {
        let prefix = format!("{verb} ");
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(&prefix))
            .collect()
    }
}

#[async_trait]
impl ObjectClient for MemoryClient {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject> {
        let mut state = self.lock();
        Self::record(&mut state, "get", resource, namespace, name);
        Self::check_failure(&state, Verb::Get, resource, namespace, name)?;
        state
            .objects
            .get(&object_key(resource, namespace, name))
            .map(|entry| entry.object.clone())
            .ok_or_else(|| Self::not_found(resource, namespace, name))
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>> {
        let mut state = self.lock();
        Self::record(&mut state, "list", resource, namespace, "*");
        Self::check_failure(&state, Verb::List, resource, namespace, "")?;
        let key = type_key(resource);
        let mut entries: Vec<&Entry> = state
            .objects
            .iter()
            .filter(|((t, ns, _), _)| *t == key && namespace.is_none_or(|n| n == ns.as_str()))
            .filter(|(_, entry)| {
                labels_match(label_selector, entry.object.metadata.labels.as_ref())
            })
            .map(|(_, entry)| entry)
            .collect();
        entries.sort_by_key(|entry| entry.seq);
        Ok(entries.into_iter().map(|entry| entry.object.clone()).collect())
    }

    async fn create(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject> {
        let name = object.metadata.name.clone().unwrap_or_default();
        let mut state = self.lock();
        Self::record(&mut state, "create", resource, namespace, &name);
        Self::check_failure(&state, Verb::Create, resource, namespace, &name)?;

        let key = object_key(resource, namespace, &name);
        if state.objects.contains_key(&key) {
            return Err(Error::AlreadyExists {
                kind: resource.kind.clone(),
                name: display_name(namespace, &name),
            });
        }

        state.seq += 1;
        let seq = state.seq;
        let mut stored = object.clone();
        stored.metadata.namespace = namespace.map(ToString::to_string);
        stored.metadata.resource_version = Some(seq.to_string());
        stored.metadata.uid = Some(format!("uid-{seq}"));
        state.objects.insert(
            key,
            Entry {
                seq,
                object: stored.clone(),
            },
        );
        Ok(stored)
    }

    async fn replace(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject> {
        let name = object.metadata.name.clone().unwrap_or_default();
        let mut state = self.lock();
        Self::record(&mut state, "replace", resource, namespace, &name);
        Self::check_failure(&state, Verb::Replace, resource, namespace, &name)?;

        let key = object_key(resource, namespace, &name);
        let next = state.seq + 1;
        let Some(entry) = state.objects.get_mut(&key) else {
            return Err(Self::not_found(resource, namespace, &name));
        };
        if let Some(version) = &object.metadata.resource_version {
            if Some(version) != entry.object.metadata.resource_version.as_ref() {
                return Err(Error::Conflict {
                    kind: resource.kind.clone(),
                    name: display_name(namespace, &name),
                    message: "the object has been modified".to_string(),
                });
            }
        }

        let mut stored = object.clone();
        stored.metadata.namespace = namespace.map(ToString::to_string);
        stored.metadata.uid = entry.object.metadata.uid.clone();
        stored.metadata.deletion_timestamp = entry.object.metadata.deletion_timestamp.clone();
        stored.metadata.resource_version = Some(next.to_string());
        match entry.object.data.get("status") {
            Some(status) => {
                stored.data["status"] = status.clone();
            }
            None => {
                if let Value::Object(map) = &mut stored.data {
                    map.remove("status");
                }
            }
        }

        let finalized = stored.metadata.deletion_timestamp.is_some()
            && stored.metadata.finalizers.as_ref().is_none_or(Vec::is_empty);
        entry.object = stored.clone();
        state.seq = next;
        if finalized {
            state.objects.remove(&key);
        }
        Ok(stored)
    }

    async fn patch_status(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        status: Value,
    ) -> Result<DynamicObject> {
        let mut state = self.lock();
        Self::record(&mut state, "patch_status", resource, namespace, name);
        Self::check_failure(&state, Verb::PatchStatus, resource, namespace, name)?;

        let next = state.seq + 1;
        let entry = state
            .objects
            .get_mut(&object_key(resource, namespace, name))
            .ok_or_else(|| Self::not_found(resource, namespace, name))?;
        if !entry.object.data.is_object() {
            entry.object.data = Value::Object(serde_json::Map::new());
        }
        let current = entry.object.data.get("status").cloned().unwrap_or(Value::Null);
        let mut merged = if current.is_object() {
            current
        } else {
            Value::Object(serde_json::Map::new())
        };
        merge(&mut merged, &status);
        entry.object.data["status"] = merged;
        entry.object.metadata.resource_version = Some(next.to_string());
        let patched = entry.object.clone();
        state.seq = next;
        Ok(patched)
    }

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<()> {
        let mut state = self.lock();
        Self::record(&mut state, "delete", resource, namespace, name);
        Self::check_failure(&state, Verb::Delete, resource, namespace, name)?;

        let key = object_key(resource, namespace, name);
        let Some(entry) = state.objects.get_mut(&key) else {
            return Err(Self::not_found(resource, namespace, name));
        };
        if entry
            .object
            .metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| !f.is_empty())
        {
            if entry.object.metadata.deletion_timestamp.is_none() {
                entry.object.metadata.deletion_timestamp = Some(Time(k8s_openapi::jiff::Timestamp::now()));
            }
        } else {
            state.objects.remove(&key);
        }
        Ok(())
    }

    async fn pod_logs(&self, namespace: &str, name: &str) -> Result<String> {
        let state = self.lock();
        state
            .logs
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: "PodLog".to_string(),
                name: display_name(Some(namespace), name),
            })
    }
}

// ============================================================================
// Discovery, events and probes
// ============================================================================

/// [`Discovery`] with a fixed version and kind set.
#[derive(Clone, Debug, Default)]
pub struct FakeDiscovery {
    version: String,
    kinds: BTreeSet<(String, String)>,
}

impl FakeDiscovery {
    #[must_use]
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            kinds: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, group_version: &str, kind: &str) -> Self {
        self.kinds
            .insert((group_version.to_string(), kind.to_string()));
        self
    }
}

#[async_trait]
impl Discovery for FakeDiscovery {
    async fn server_version(&self) -> Result<String> {
        Ok(self.version.clone())
    }

    async fn has_kind(&self, group_version: &str, kind: &str) -> Result<bool> {
        Ok(self
            .kinds
            .contains(&(group_version.to_string(), kind.to_string())))
    }
}

/// An event captured by [`RecordingEvents`].
#[derive(Clone, Debug)]
pub struct RecordedEvent {
    pub object: String,
    pub warning: bool,
    pub reason: String,
    pub note: Option<String>,
}

/// [`EventPublisher`] that keeps every event in memory.
#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEvents {
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Events with the given reason.
    #[must_use]
    pub fn with_reason(&self, reason: &str) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.reason == reason)
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEvents {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        _action: &str,
        note: Option<String>,
    ) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(RecordedEvent {
                object: display_name(
                    resource_ref.namespace.as_deref(),
                    resource_ref.name.as_deref().unwrap_or_default(),
                ),
                warning: matches!(type_, EventType::Warning),
                reason: reason.to_string(),
                note,
            });
    }
}

/// [`Prober`] that reports a fixed set of addresses as ready.
#[derive(Clone, Debug, Default)]
pub struct StaticProber {
    ready: BTreeSet<String>,
}

impl StaticProber {
    #[must_use]
    pub fn ready(addresses: &[&str]) -> Self {
        Self {
            ready: addresses.iter().map(ToString::to_string).collect(),
        }
    }
}

#[async_trait]
impl Prober for StaticProber {
    async fn probe(&self, address: &str) -> bool {
        self.ready.contains(address)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// A node with one `InternalIP` and the given labels.
#[must_use]
pub fn node(name: &str, ip: &str, labels: &[(&str, &str)]) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ),
            ..Default::default()
        },
        status: Some(NodeStatus {
            addresses: Some(vec![NodeAddress {
                type_: "InternalIP".to_string(),
                address: ip.to_string(),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A [`Context`] wired to in-memory doubles, with handles to inspect them.
pub struct Harness {
    pub client: Arc<MemoryClient>,
    pub events: Arc<RecordingEvents>,
    pub ctx: Context,
}

impl Harness {
    /// Harness for an API server at `version` with no optional kinds and no ready members.
    #[must_use]
    pub fn new(version: &str) -> Self {
        Self::with_parts(FakeDiscovery::new(version), StaticProber::default())
    }

    #[must_use]
    pub fn with_parts(discovery: FakeDiscovery, prober: StaticProber) -> Self {
        let client = Arc::new(MemoryClient::new());
        let events = Arc::new(RecordingEvents::default());
        let ctx = Context {
            client: client.clone(),
            discovery: Arc::new(discovery),
            events: events.clone(),
            prober: Arc::new(prober),
            config: OperatorConfig::default(),
        };
        Self {
            client,
            events,
            ctx,
        }
    }
}
