// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory collaborators for tests.
//!
//! `FakeCluster` keeps objects in a map keyed by kind, namespace and name, assigns
//! increasing `resourceVersion`s, rejects stale replaces with a conflict and counts
//! every mutation. Tests seed objects with [`FakeCluster::insert`], drive a
//! reconciler, then assert on [`FakeCluster::mutations`] to check idempotence.
//!
//! [`FakeMarketplace`] and [`FakeThreeScale`] stand in for the subscription
//! manager and the 3scale admin portal, and [`fake_context`] wires all of them
//! into a [`Context`].
//!
//! Compiled for unit tests and behind the `test-util` feature for the
//! integration tests under `tests/`.

use crate::client::{resource_of, to_dynamic, ClusterClient};
use crate::config::ConfigMapConfigStore;
use crate::context::{Context, RequeueSettings};
use crate::crd::{Installation, StatusPhase};
use crate::errors::{ClientError, ThreeScaleError};
use crate::events::NoopEventRecorder;
use crate::reconcilers::marketplace::{Marketplace, SubscriptionTarget};
use crate::threescale::{AuthProviderDetails, ThreeScaleApi, UserDetails};
use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject};
use kube::core::TypeMeta;
use kube::Resource;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

type ObjectKey = (String, String, String);

/// One recorded write against the fake cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// Object created
    Create { kind: String, name: String },
    /// Object replaced
    Replace { kind: String, name: String },
    /// Object deleted
    Delete { kind: String, name: String },
    /// Object or status patched
    Patch { kind: String, name: String },
    /// Subresource posted
    Subresource { kind: String, name: String, subresource: String },
    /// Command executed in a pod
    Exec { pod: String, command: String },
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, DynamicObject>,
    mutations: Vec<Mutation>,
    next_version: u64,
}

/// In-memory cluster for tests.
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

fn key(resource: &ApiResource, namespace: Option<&str>, name: &str) -> ObjectKey {
    (
        format!("{}/{}", resource.api_version, resource.kind),
        namespace.unwrap_or_default().to_string(),
        name.to_string(),
    )
}

fn not_found(resource: &ApiResource, name: &str) -> ClientError {
    ClientError::NotFound {
        kind: resource.kind.clone(),
        name: name.to_string(),
    }
}

fn matches_selector(object: &DynamicObject, selector: Option<&str>) -> bool {
    let Some(selector) = selector else {
        return true;
    };
    let labels = object.metadata.labels.clone().unwrap_or_default();
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => labels.get(k.trim()).is_some_and(|value| value == v.trim()),
            None => labels.contains_key(term.trim()),
        })
}

fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (k, v) in patch {
                if v.is_null() {
                    target.remove(k);
                } else {
                    merge(target.entry(k.clone()).or_insert(Value::Null), v);
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

impl FakeCluster {
    /// Empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A test that panicked while holding the lock already failed
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Store a dynamic object as-is (bypassing mutation tracking).
    pub fn insert(&self, resource: &ApiResource, object: DynamicObject) {
        let mut state = self.lock();
        state.next_version += 1;
        let version = state.next_version.to_string();
        let mut object = object;
        object.types.get_or_insert_with(|| TypeMeta {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
        });
        object.metadata.resource_version = Some(version);
        let name = object.metadata.name.clone().unwrap_or_default();
        let k = key(resource, object.metadata.namespace.as_deref(), &name);
        state.objects.insert(k, object);
    }

    /// Store a typed object as-is (bypassing mutation tracking).
    ///
    /// # Panics
    ///
    /// Panics if the object cannot be converted, which is a test bug.
    pub fn insert_typed<K>(&self, object: &K)
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let dynamic = to_dynamic(object).unwrap_or_else(|e| panic!("invalid test object: {e}"));
        self.insert(&resource_of::<K>(), dynamic);
    }

    /// Snapshot of one object.
    #[must_use]
    pub fn object(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Option<DynamicObject> {
        self.lock()
            .objects
            .get(&key(resource, namespace, name))
            .cloned()
    }

    /// True when the object exists.
    #[must_use]
    pub fn contains(&self, resource: &ApiResource, namespace: Option<&str>, name: &str) -> bool {
        self.object(resource, namespace, name).is_some()
    }

    /// Set fields of an object's body (merge semantics), bypassing mutation tracking.
    ///
    /// Used to simulate other operators updating status.
    pub fn update_data(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) {
        let mut state = self.lock();
        if let Some(object) = state.objects.get_mut(&key(resource, namespace, name)) {
            merge(&mut object.data, patch);
        }
    }

    /// Every mutation recorded so far.
    #[must_use]
    pub fn mutations(&self) -> Vec<Mutation> {
        self.lock().mutations.clone()
    }

    /// Number of mutations recorded so far.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.lock().mutations.len()
    }

    fn store(&self, state: &mut State, resource: &ApiResource, mut object: DynamicObject) -> DynamicObject {
        state.next_version += 1;
        object.metadata.resource_version = Some(state.next_version.to_string());
        object.types.get_or_insert_with(|| TypeMeta {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
        });
        let name = object.metadata.name.clone().unwrap_or_default();
        state.objects.insert(
            key(resource, object.metadata.namespace.as_deref(), &name),
            object.clone(),
        );
        object
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, ClientError> {
        self.object(resource, namespace, name)
            .ok_or_else(|| not_found(resource, name))
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>, ClientError> {
        let kind = format!("{}/{}", resource.api_version, resource.kind);
        Ok(self
            .lock()
            .objects
            .iter()
            .filter(|((k, ns, _), _)| {
                *k == kind && namespace.is_none_or(|wanted| wanted == ns.as_str())
            })
            .map(|(_, object)| object)
            .filter(|object| matches_selector(object, label_selector))
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClientError> {
        let name = object.metadata.name.clone().unwrap_or_default();
        let mut state = self.lock();
        if state.objects.contains_key(&key(resource, namespace, &name)) {
            return Err(ClientError::AlreadyExists {
                kind: resource.kind.clone(),
                name,
            });
        }
        let mut object = object.clone();
        object.metadata.namespace = namespace.map(str::to_string);
        state.mutations.push(Mutation::Create {
            kind: resource.kind.clone(),
            name,
        });
        Ok(self.store(&mut state, resource, object))
    }

    async fn replace(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClientError> {
        let name = object.metadata.name.clone().unwrap_or_default();
        let mut state = self.lock();
        let current_version = state
            .objects
            .get(&key(resource, namespace, &name))
            .ok_or_else(|| not_found(resource, &name))?
            .metadata
            .resource_version
            .clone();
        if object.metadata.resource_version.is_some()
            && object.metadata.resource_version != current_version
        {
            return Err(ClientError::Conflict {
                kind: resource.kind.clone(),
                name,
                message: "the object has been modified".to_string(),
            });
        }
        state.mutations.push(Mutation::Replace {
            kind: resource.kind.clone(),
            name,
        });
        Ok(self.store(&mut state, resource, object.clone()))
    }

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), ClientError> {
        let mut state = self.lock();
        if state
            .objects
            .remove(&key(resource, namespace, name))
            .is_none()
        {
            return Err(not_found(resource, name));
        }
        state.mutations.push(Mutation::Delete {
            kind: resource.kind.clone(),
            name: name.to_string(),
        });
        Ok(())
    }

    async fn patch_merge(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject, ClientError> {
        let mut state = self.lock();
        let current = state
            .objects
            .get(&key(resource, namespace, name))
            .cloned()
            .ok_or_else(|| not_found(resource, name))?;

        if let Some(wanted) = patch.pointer("/metadata/resourceVersion").and_then(Value::as_str) {
            if current.metadata.resource_version.as_deref() != Some(wanted) {
                return Err(ClientError::Conflict {
                    kind: resource.kind.clone(),
                    name: name.to_string(),
                    message: "the object has been modified".to_string(),
                });
            }
        }

        let mut value = serde_json::to_value(&current).map_err(|e| ClientError::Serialization {
            kind: resource.kind.clone(),
            message: e.to_string(),
        })?;
        merge(&mut value, patch);
        let patched: DynamicObject =
            serde_json::from_value(value).map_err(|e| ClientError::Serialization {
                kind: resource.kind.clone(),
                message: e.to_string(),
            })?;
        state.mutations.push(Mutation::Patch {
            kind: resource.kind.clone(),
            name: name.to_string(),
        });
        Ok(self.store(&mut state, resource, patched))
    }

    async fn patch_status(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject, ClientError> {
        self.patch_merge(resource, namespace, name, patch).await
    }

    async fn create_subresource(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        subresource: &str,
        _body: &Value,
    ) -> Result<Value, ClientError> {
        let mut state = self.lock();
        if !state.objects.contains_key(&key(resource, namespace, name)) {
            return Err(not_found(resource, name));
        }
        state.mutations.push(Mutation::Subresource {
            kind: resource.kind.clone(),
            name: name.to_string(),
            subresource: subresource.to_string(),
        });
        Ok(Value::Null)
    }

    async fn exec(
        &self,
        _namespace: &str,
        pod: &str,
        command: &[String],
    ) -> Result<String, ClientError> {
        self.lock().mutations.push(Mutation::Exec {
            pod: pod.to_string(),
            command: command.join(" "),
        });
        Ok(String::new())
    }
}

// ============================================================================
// Marketplace
// ============================================================================

/// [`Marketplace`] reporting a settable phase for every subscription.
pub struct FakeMarketplace {
    phase: Mutex<StatusPhase>,
    targets: Mutex<Vec<SubscriptionTarget>>,
}

impl FakeMarketplace {
    /// Marketplace whose subscriptions report `phase`.
    #[must_use]
    pub fn new(phase: StatusPhase) -> Self {
        Self {
            phase: Mutex::new(phase),
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Change the phase reported from now on.
    pub fn set_phase(&self, phase: StatusPhase) {
        *self.phase.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = phase;
    }

    /// Every subscription requested so far, in order.
    #[must_use]
    pub fn targets(&self) -> Vec<SubscriptionTarget> {
        self.targets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Marketplace for FakeMarketplace {
    async fn reconcile_subscription(
        &self,
        target: &SubscriptionTarget,
        _watched_namespaces: &[String],
    ) -> anyhow::Result<StatusPhase> {
        self.targets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(target.clone());
        Ok(*self.phase.lock().unwrap_or_else(std::sync::PoisonError::into_inner))
    }
}

// ============================================================================
// 3scale admin portal
// ============================================================================

#[derive(Default)]
struct PortalState {
    users: Vec<UserDetails>,
    providers: Vec<AuthProviderDetails>,
    next_id: i64,
}

/// In-memory 3scale admin portal.
#[derive(Default)]
pub struct FakeThreeScale {
    state: Mutex<PortalState>,
}

impl FakeThreeScale {
    /// Portal without users or providers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PortalState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Seed a user with `role`. Returns its id.
    pub fn add_existing_user(&self, username: &str, email: &str, role: &str) -> i64 {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.users.push(UserDetails {
            id,
            username: username.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            state: "active".to_string(),
        });
        id
    }

    /// Snapshot of every user.
    #[must_use]
    pub fn users(&self) -> Vec<UserDetails> {
        self.lock().users.clone()
    }

    /// Snapshot of every authentication provider.
    #[must_use]
    pub fn providers(&self) -> Vec<AuthProviderDetails> {
        self.lock().providers.clone()
    }
}

#[async_trait]
impl ThreeScaleApi for FakeThreeScale {
    async fn get_authentication_provider_by_name(
        &self,
        name: &str,
        _access_token: &str,
    ) -> Result<AuthProviderDetails, ThreeScaleError> {
        self.lock()
            .providers
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| ThreeScaleError::NotFound {
                entity: "authentication provider".to_string(),
                name: name.to_string(),
            })
    }

    async fn add_authentication_provider(
        &self,
        provider: &AuthProviderDetails,
        _access_token: &str,
    ) -> Result<(), ThreeScaleError> {
        let mut state = self.lock();
        state.next_id += 1;
        let mut provider = provider.clone();
        provider.id = state.next_id;
        state.providers.push(provider);
        Ok(())
    }

    async fn get_users(&self, _access_token: &str) -> Result<Vec<UserDetails>, ThreeScaleError> {
        Ok(self.users())
    }

    async fn add_user(
        &self,
        username: &str,
        email: &str,
        _password: &str,
        _access_token: &str,
    ) -> Result<(), ThreeScaleError> {
        self.add_existing_user(username, email, "member");
        Ok(())
    }

    async fn delete_user(&self, id: i64, _access_token: &str) -> Result<(), ThreeScaleError> {
        let mut state = self.lock();
        let before = state.users.len();
        state.users.retain(|u| u.id != id);
        if state.users.len() == before {
            return Err(ThreeScaleError::UnexpectedStatus {
                operation: "delete_user".to_string(),
                status: 404,
            });
        }
        Ok(())
    }

    async fn set_user_as_admin(&self, id: i64, _access_token: &str) -> Result<(), ThreeScaleError> {
        let mut state = self.lock();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| ThreeScaleError::UnexpectedStatus {
                operation: "set_user_as_admin".to_string(),
                status: 404,
            })?;
        user.role = "admin".to_string();
        Ok(())
    }
}

/// [`Context`] over fakes, keeping product configuration in `operator_namespace`.
#[must_use]
pub fn fake_context(
    cluster: Arc<FakeCluster>,
    marketplace: Arc<dyn Marketplace>,
    threescale: Arc<dyn ThreeScaleApi>,
    operator_namespace: &str,
) -> Context {
    Context {
        config: Arc::new(ConfigMapConfigStore::new(cluster.clone(), operator_namespace)),
        cluster,
        marketplace,
        events: Arc::new(NoopEventRecorder),
        threescale: Arc::new(move |_: &Installation| threescale.clone()),
        requeue: RequeueSettings::default(),
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod fake_tests;
