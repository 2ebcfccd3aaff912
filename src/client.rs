// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster access for product reconcilers.
//!
//! Reconcilers talk to the cluster through the object-safe [`ClusterClient`] trait,
//! which works on [`DynamicObject`]s addressed by an [`ApiResource`]. Most of the
//! objects this operator manages are custom resources of other operators, so a
//! dynamic interface avoids generating Rust types for each of them. Core types
//! (`Secret`, `Namespace`, ...) go through the typed helpers at the bottom of this
//! module, which convert with serde.
//!
//! [`KubeClusterClient`] is the production implementation over `kube::Client`.
//! Tests use `FakeCluster` from the `fake` module (`test-util` feature).

use crate::errors::ClientError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{
    Api, ApiResource, AttachParams, DeleteParams, DynamicObject, GroupVersionKind, ListParams,
    Patch, PatchParams, PostParams,
};
use kube::core::TypeMeta;
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Object-safe access to the cluster API used by every reconciliation step.
///
/// `namespace` is `None` for cluster-scoped kinds.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch one object.
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, ClientError>;

    /// List objects, optionally filtered by an equality label selector (`k=v,k2=v2`).
    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>, ClientError>;

    /// Create an object. Fails with [`ClientError::AlreadyExists`] if it exists.
    async fn create(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClientError>;

    /// Replace an object. The object's `resourceVersion` is checked by the server.
    async fn replace(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClientError>;

    /// Delete an object.
    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), ClientError>;

    /// Apply a JSON merge patch to an object.
    async fn patch_merge(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject, ClientError>;

    /// Apply a JSON merge patch to the status subresource of an object.
    async fn patch_status(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject, ClientError>;

    /// POST to a subresource (e.g. `instantiate` on a deployment config).
    async fn create_subresource(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        subresource: &str,
        body: &Value,
    ) -> Result<Value, ClientError>;

    /// Run a command in a pod and return its stdout.
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        command: &[String],
    ) -> Result<String, ClientError>;
}

/// [`ClusterClient`] backed by a `kube::Client`.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Wrap a Kubernetes client.
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

fn object_name(resource: &ApiResource, object: &DynamicObject) -> Result<String, ClientError> {
    object
        .metadata
        .name
        .clone()
        .ok_or_else(|| ClientError::Other(format!("{} object has no name", resource.kind)))
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, ClientError> {
        self.api(resource, namespace)
            .get(name)
            .await
            .map_err(|e| ClientError::from_kube(e, &resource.kind, name))
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>, ClientError> {
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        self.api(resource, namespace)
            .list(&params)
            .await
            .map(|list| list.items)
            .map_err(|e| ClientError::from_kube(e, &resource.kind, ""))
    }

    async fn create(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClientError> {
        let name = object_name(resource, object)?;
        debug!(kind = %resource.kind, namespace = ?namespace, name = %name, "Creating object");
        self.api(resource, namespace)
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| ClientError::from_kube(e, &resource.kind, &name))
    }

    async fn replace(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClientError> {
        let name = object_name(resource, object)?;
        debug!(kind = %resource.kind, namespace = ?namespace, name = %name, "Replacing object");
        self.api(resource, namespace)
            .replace(&name, &PostParams::default(), object)
            .await
            .map_err(|e| ClientError::from_kube(e, &resource.kind, &name))
    }

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), ClientError> {
        debug!(kind = %resource.kind, namespace = ?namespace, name = %name, "Deleting object");
        self.api(resource, namespace)
            .delete(name, &DeleteParams::background())
            .await
            .map(|_| ())
            .map_err(|e| ClientError::from_kube(e, &resource.kind, name))
    }

    async fn patch_merge(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject, ClientError> {
        self.api(resource, namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|e| ClientError::from_kube(e, &resource.kind, name))
    }

    async fn patch_status(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject, ClientError> {
        self.api(resource, namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|e| ClientError::from_kube(e, &resource.kind, name))
    }

    async fn create_subresource(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        subresource: &str,
        body: &Value,
    ) -> Result<Value, ClientError> {
        serde_json::to_vec(body).map_err(|e| ClientError::Serialization {
            kind: resource.kind.clone(),
            message: e.to_string(),
        })?;
        self.api(resource, namespace)
            .create_subresource::<Value, Value>(subresource, name, &PostParams::default(), body)
            .await
            .map_err(|e| ClientError::from_kube(e, &resource.kind, name))
    }

    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        command: &[String],
    ) -> Result<String, ClientError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = AttachParams::default().stderr(false);
        let mut attached = pods
            .exec(pod, command.to_vec(), &params)
            .await
            .map_err(|e| ClientError::from_kube(e, "Pod", pod))?;

        let mut output = String::new();
        if let Some(mut stdout) = attached.stdout() {
            stdout
                .read_to_string(&mut output)
                .await
                .map_err(|e| ClientError::Other(format!("failed to read exec output: {e}")))?;
        }
        attached
            .join()
            .await
            .map_err(|e| ClientError::Other(format!("exec in pod {pod} failed: {e}")))?;
        Ok(output)
    }
}

// ============================================================================
// Resource kinds
// ============================================================================

/// `ApiResource` of a kind from a group/version/kind triple and plural name.
#[must_use]
pub fn custom_resource(group: &str, version: &str, kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(group, version, kind), plural)
}

/// `ApiResource` of a typed kind.
#[must_use]
pub fn resource_of<K>() -> ApiResource
where
    K: Resource<DynamicType = ()>,
{
    ApiResource::erase::<K>(&())
}

/// Kinds owned by other operators that reconcilers read and write.
pub mod kinds {
    use super::custom_resource;
    use kube::api::ApiResource;

    /// `apps.3scale.net/v1alpha1` `APIManager`
    #[must_use]
    pub fn api_manager() -> ApiResource {
        custom_resource("apps.3scale.net", "v1alpha1", "APIManager", "apimanagers")
    }

    /// `integreatly.org/v1alpha1` `Grafana`
    #[must_use]
    pub fn grafana() -> ApiResource {
        custom_resource("integreatly.org", "v1alpha1", "Grafana", "grafanas")
    }

    /// `integreatly.org/v1alpha1` `BlobStorage` cloud resource request
    #[must_use]
    pub fn blob_storage() -> ApiResource {
        custom_resource("integreatly.org", "v1alpha1", "BlobStorage", "blobstorages")
    }

    /// `integreatly.org/v1alpha1` `Redis` cloud resource request
    #[must_use]
    pub fn redis() -> ApiResource {
        custom_resource("integreatly.org", "v1alpha1", "Redis", "redis")
    }

    /// `integreatly.org/v1alpha1` `Postgres` cloud resource request
    #[must_use]
    pub fn postgres() -> ApiResource {
        custom_resource("integreatly.org", "v1alpha1", "Postgres", "postgres")
    }

    /// `keycloak.org/v1alpha1` `KeycloakClient`
    #[must_use]
    pub fn keycloak_client() -> ApiResource {
        custom_resource("keycloak.org", "v1alpha1", "KeycloakClient", "keycloakclients")
    }

    /// `keycloak.org/v1alpha1` `KeycloakUser`
    #[must_use]
    pub fn keycloak_user() -> ApiResource {
        custom_resource("keycloak.org", "v1alpha1", "KeycloakUser", "keycloakusers")
    }

    /// `route.openshift.io/v1` `Route`
    #[must_use]
    pub fn route() -> ApiResource {
        custom_resource("route.openshift.io", "v1", "Route", "routes")
    }

    /// `oauth.openshift.io/v1` `OAuthClient` (cluster scoped)
    #[must_use]
    pub fn oauth_client() -> ApiResource {
        custom_resource("oauth.openshift.io", "v1", "OAuthClient", "oauthclients")
    }

    /// `console.openshift.io/v1` `ConsoleLink` (cluster scoped)
    #[must_use]
    pub fn console_link() -> ApiResource {
        custom_resource("console.openshift.io", "v1", "ConsoleLink", "consolelinks")
    }

    /// `user.openshift.io/v1` `Group` (cluster scoped)
    #[must_use]
    pub fn group() -> ApiResource {
        custom_resource("user.openshift.io", "v1", "Group", "groups")
    }

    /// `apps.openshift.io/v1` `DeploymentConfig`
    #[must_use]
    pub fn deployment_config() -> ApiResource {
        custom_resource("apps.openshift.io", "v1", "DeploymentConfig", "deploymentconfigs")
    }

    /// `operators.coreos.com/v1alpha1` `Subscription`
    #[must_use]
    pub fn subscription() -> ApiResource {
        custom_resource("operators.coreos.com", "v1alpha1", "Subscription", "subscriptions")
    }

    /// `operators.coreos.com/v1` `OperatorGroup`
    #[must_use]
    pub fn operator_group() -> ApiResource {
        custom_resource("operators.coreos.com", "v1", "OperatorGroup", "operatorgroups")
    }

    /// `operators.coreos.com/v1alpha1` `ClusterServiceVersion`
    #[must_use]
    pub fn cluster_service_version() -> ApiResource {
        custom_resource(
            "operators.coreos.com",
            "v1alpha1",
            "ClusterServiceVersion",
            "clusterserviceversions",
        )
    }

    /// `applicationmonitoring.integreatly.org/v1alpha1` `BlackboxTarget`
    #[must_use]
    pub fn blackbox_target() -> ApiResource {
        custom_resource(
            "applicationmonitoring.integreatly.org",
            "v1alpha1",
            "BlackboxTarget",
            "blackboxtargets",
        )
    }
}

// ============================================================================
// Typed conversion helpers
// ============================================================================

/// Convert a typed object into its dynamic form.
///
/// # Errors
///
/// Returns [`ClientError::Serialization`] if the object cannot be represented as JSON.
pub fn to_dynamic<K>(object: &K) -> Result<DynamicObject, ClientError>
where
    K: Resource<DynamicType = ()> + Serialize,
{
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|e| ClientError::Serialization {
            kind: K::kind(&()).to_string(),
            message: e.to_string(),
        })
}

/// Convert a dynamic object into a typed one.
///
/// # Errors
///
/// Returns [`ClientError::Serialization`] if the object does not match `K`.
pub fn from_dynamic<K>(mut object: DynamicObject) -> Result<K, ClientError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    // Typed deserializers require apiVersion and kind
    if object.types.is_none() {
        object.types = Some(TypeMeta {
            api_version: K::api_version(&()).to_string(),
            kind: K::kind(&()).to_string(),
        });
    }
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|e| ClientError::Serialization {
            kind: K::kind(&()).to_string(),
            message: e.to_string(),
        })
}

/// Fetch a typed object.
///
/// # Errors
///
/// Returns the client error, or a serialization error if the object does not match `K`.
pub async fn get_typed<K>(
    client: &dyn ClusterClient,
    namespace: Option<&str>,
    name: &str,
) -> Result<K, ClientError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    let object = client.get(&resource_of::<K>(), namespace, name).await?;
    from_dynamic(object)
}

/// Fetch a typed object, mapping not-found to `None`.
///
/// # Errors
///
/// Returns any client error other than not-found.
pub async fn get_typed_opt<K>(
    client: &dyn ClusterClient,
    namespace: Option<&str>,
    name: &str,
) -> Result<Option<K>, ClientError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    match get_typed(client, namespace, name).await {
        Ok(object) => Ok(Some(object)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// List typed objects.
///
/// # Errors
///
/// Returns the client error, or a serialization error if an object does not match `K`.
pub async fn list_typed<K>(
    client: &dyn ClusterClient,
    namespace: Option<&str>,
    label_selector: Option<&str>,
) -> Result<Vec<K>, ClientError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    client
        .list(&resource_of::<K>(), namespace, label_selector)
        .await?
        .into_iter()
        .map(from_dynamic)
        .collect()
}

/// Read a string field from a dynamic object's body by JSON pointer (e.g. `/spec/host`).
#[must_use]
pub fn string_at<'a>(object: &'a DynamicObject, pointer: &str) -> Option<&'a str> {
    object.data.pointer(pointer).and_then(Value::as_str)
}

/// Mutable JSON object at `path` below `value`.
///
/// Missing levels, and levels holding anything other than an object, are
/// replaced by empty objects.
pub fn object_at<'a>(value: &'a mut Value, path: &[&str]) -> &'a mut Value {
    let mut current = value;
    for key in path {
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        current = &mut current[*key];
    }
    if !current.is_object() {
        *current = Value::Object(serde_json::Map::new());
    }
    current
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
