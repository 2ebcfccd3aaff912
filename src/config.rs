// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Durable per-product configuration.
//!
//! Each product keeps a small YAML document (namespace, host, versions, ...) in the
//! `installation-config` ConfigMap of the operator namespace, one key per product.
//! Reconcilers read a [`ProductConfig`] snapshot once per pass through the
//! [`ConfigStore`] trait and write changes back explicitly. Products read each
//! other's snapshots too: 3scale needs the identity provider's realm and the
//! monitoring namespace.

use crate::client::{resource_of, ClusterClient};
use crate::constants::{CONFIG_MAP_NAME, OAUTH_CLIENT_SECRETS_NAME, OPERATOR_NAMESPACE_SUFFIX};
use crate::crd::{Installation, ProductName};
use crate::errors::{ClientError, ConfigError};
use crate::labels::add_managed_labels;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{DynamicObject, ObjectMeta};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Snapshot of one product's durable configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operator_namespace: String,
    /// Public URL, including the scheme
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub product_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operator_version: String,
    /// Identity realm (identity provider only)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub realm: String,
    /// Path checked by the admin UI blackbox target, relative to `host`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub blackbox_target_path: String,
}

impl ProductConfig {
    /// Fill in the product and operator namespaces from the installation.
    ///
    /// The product namespace defaults to `<prefix><default_namespace>`. The operator
    /// namespace is the product namespace when operators run alongside products,
    /// `<namespace>-operator` otherwise. Stored values are kept. Returns true when
    /// anything changed.
    pub fn resolve_namespaces(&mut self, installation: &Installation, default_namespace: &str) -> bool {
        let before = self.clone();
        if self.namespace.is_empty() {
            self.namespace = format!("{}{default_namespace}", installation.spec.namespace_prefix);
        }
        if self.operator_namespace.is_empty() {
            self.operator_namespace = if installation.spec.operators_in_product_namespace {
                self.namespace.clone()
            } else {
                format!("{}{OPERATOR_NAMESPACE_SUFFIX}", self.namespace)
            };
        }
        *self != before
    }
}

/// Read/write access to product configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the configuration of `product`. Missing configuration reads as default.
    async fn read(&self, product: ProductName) -> Result<ProductConfig, ConfigError>;

    /// Persist the configuration of `product`. Unchanged configuration is not written.
    async fn write(&self, product: ProductName, config: &ProductConfig) -> Result<(), ConfigError>;

    /// Namespace the operator itself runs in.
    fn operator_namespace(&self) -> &str;

    /// Name of the secret holding per-product OAuth client secrets.
    fn oauth_client_secrets_name(&self) -> &str {
        OAUTH_CLIENT_SECRETS_NAME
    }
}

/// Read the snapshot of `product` with its namespaces resolved.
///
/// Newly resolved namespaces are written back so other products see them.
///
/// # Errors
///
/// Returns the store error of the read or write.
pub async fn read_resolved(
    store: &dyn ConfigStore,
    installation: &Installation,
    product: ProductName,
    default_namespace: &str,
) -> Result<ProductConfig, ConfigError> {
    let mut config = store.read(product).await?;
    if config.resolve_namespaces(installation, default_namespace) {
        store.write(product, &config).await?;
    }
    Ok(config)
}

/// [`ConfigStore`] backed by a ConfigMap.
pub struct ConfigMapConfigStore {
    cluster: Arc<dyn ClusterClient>,
    namespace: String,
    name: String,
}

impl ConfigMapConfigStore {
    /// Store using the `installation-config` ConfigMap of `namespace`.
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterClient>, namespace: impl Into<String>) -> Self {
        Self {
            cluster,
            namespace: namespace.into(),
            name: CONFIG_MAP_NAME.to_string(),
        }
    }

    async fn stored(&self, product: ProductName) -> Result<Option<String>, ClientError> {
        match self
            .cluster
            .get(&resource_of::<ConfigMap>(), Some(&self.namespace), &self.name)
            .await
        {
            Ok(object) => Ok(object
                .data
                .pointer(&format!("/data/{}", product.as_str()))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ConfigStore for ConfigMapConfigStore {
    async fn read(&self, product: ProductName) -> Result<ProductConfig, ConfigError> {
        match self.stored(product).await? {
            Some(yaml) if !yaml.trim().is_empty() => {
                serde_yaml::from_str(&yaml).map_err(|source| ConfigError::Parse {
                    product: product.to_string(),
                    source,
                })
            }
            _ => Ok(ProductConfig::default()),
        }
    }

    async fn write(&self, product: ProductName, config: &ProductConfig) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(config).map_err(|source| ConfigError::Serialize {
            product: product.to_string(),
            source,
        })?;
        let resource = resource_of::<ConfigMap>();

        match self.stored(product).await {
            Ok(Some(current)) if current == yaml => return Ok(()),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }

        debug!(product = %product, configmap = %self.name, "Writing product configuration");
        let patch = json!({ "data": { product.as_str(): yaml } });
        match self
            .cluster
            .patch_merge(&resource, Some(&self.namespace), &self.name, &patch)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                let mut metadata = ObjectMeta {
                    name: Some(self.name.clone()),
                    namespace: Some(self.namespace.clone()),
                    ..Default::default()
                };
                add_managed_labels(&mut metadata);
                let mut object = DynamicObject::new(&self.name, &resource).within(&self.namespace);
                object.metadata = metadata;
                object.data = json!({
                    "data": BTreeMap::from([(product.as_str(), yaml)])
                });
                self.cluster
                    .create(&resource, Some(&self.namespace), &object)
                    .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn operator_namespace(&self) -> &str {
        &self.namespace
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
