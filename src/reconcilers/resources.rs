// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Create-or-update helpers for desired-state objects.
//!
//! Every object a step manages is re-asserted on each pass by a pure builder that
//! takes the observed object (or an empty skeleton when it does not exist yet) and
//! returns the desired one. The helpers write only when the desired object differs
//! from the observed one, so re-running a step against unchanged state performs no
//! writes and triggers no rollouts.
//!
//! Updates replace the object with the observed `resourceVersion`; a concurrent
//! writer makes the replace fail with a conflict that is retried on the next poll.
//!
//! # Example
//!
//! ```rust,no_run
//! use product_bundle_operator::client::ClusterClient;
//! use product_bundle_operator::reconcilers::resources::create_or_update_typed;
//! use k8s_openapi::api::core::v1::Secret;
//!
//! async fn example(client: &dyn ClusterClient) -> anyhow::Result<()> {
//!     let (_secret, result) = create_or_update_typed::<Secret, _>(
//!         client,
//!         Some("redhat-rhmi-3scale"),
//!         "system-smtp",
//!         |mut secret| {
//!             secret.type_ = Some("Opaque".to_string());
//!             Ok(secret)
//!         },
//!     )
//!     .await?;
//!     println!("{result:?}");
//!     Ok(())
//! }
//! ```

use crate::client::{from_dynamic, get_typed_opt, resource_of, to_dynamic, ClusterClient};
use crate::metrics;
use anyhow::{Context, Result};
use kube::api::{ApiResource, DynamicObject};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// What [`create_or_update`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationResult {
    /// The object did not exist and was created
    Created,
    /// The object existed and differed from the desired state
    Updated,
    /// The object already matched the desired state
    Unchanged,
}

impl OperationResult {
    /// True when a write was performed.
    #[must_use]
    pub fn changed(self) -> bool {
        self != Self::Unchanged
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn record(kind: &str, namespace: Option<&str>, name: &str, result: OperationResult) {
    if result.changed() {
        info!(kind, namespace = ?namespace, name, result = %result, "Reconciled object");
        metrics::record_resource_write(kind, result.as_str());
    } else {
        debug!(kind, namespace = ?namespace, name, "Object already up to date");
    }
}

/// Create or update a dynamic object.
///
/// `build` receives the observed object, or a skeleton carrying only the name and
/// namespace when the object does not exist, and returns the desired object.
///
/// # Errors
///
/// Returns the builder's error or the client error of the read or write.
pub async fn create_or_update<F>(
    client: &dyn ClusterClient,
    resource: &ApiResource,
    namespace: Option<&str>,
    name: &str,
    build: F,
) -> Result<(DynamicObject, OperationResult)>
where
    F: FnOnce(DynamicObject) -> Result<DynamicObject>,
{
    let observed = match client.get(resource, namespace, name).await {
        Ok(object) => Some(object),
        Err(e) if e.is_not_found() => None,
        Err(e) => {
            return Err(e).with_context(|| format!("failed to get {} {name}", resource.kind));
        }
    };

    let (object, result) = match observed {
        None => {
            let mut skeleton = DynamicObject::new(name, resource);
            skeleton.metadata.namespace = namespace.map(str::to_string);
            let desired = build(skeleton)?;
            let created = client
                .create(resource, namespace, &desired)
                .await
                .with_context(|| format!("failed to create {} {name}", resource.kind))?;
            (created, OperationResult::Created)
        }
        Some(observed) => {
            let desired = build(observed.clone())?;
            if serde_json::to_value(&desired)? == serde_json::to_value(&observed)? {
                (observed, OperationResult::Unchanged)
            } else {
                let updated = client
                    .replace(resource, namespace, &desired)
                    .await
                    .with_context(|| format!("failed to update {} {name}", resource.kind))?;
                (updated, OperationResult::Updated)
            }
        }
    };

    record(&resource.kind, namespace, name, result);
    Ok((object, result))
}

/// Create or update a typed object.
///
/// Same contract as [`create_or_update`]; the skeleton is `K::default()` with the
/// name and namespace set.
///
/// # Errors
///
/// Returns the builder's error, a conversion error, or the client error.
pub async fn create_or_update_typed<K, F>(
    client: &dyn ClusterClient,
    namespace: Option<&str>,
    name: &str,
    build: F,
) -> Result<(K, OperationResult)>
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Default + Clone,
    F: FnOnce(K) -> Result<K>,
{
    let kind = K::kind(&()).to_string();
    let resource = resource_of::<K>();
    let observed = get_typed_opt::<K>(client, namespace, name)
        .await
        .with_context(|| format!("failed to get {kind} {name}"))?;

    let (object, result) = match observed {
        None => {
            let mut skeleton = K::default();
            skeleton.meta_mut().name = Some(name.to_string());
            skeleton.meta_mut().namespace = namespace.map(str::to_string);
            let desired = to_dynamic(&build(skeleton)?)?;
            let created = client
                .create(&resource, namespace, &desired)
                .await
                .with_context(|| format!("failed to create {kind} {name}"))?;
            (from_dynamic(created)?, OperationResult::Created)
        }
        Some(observed) => {
            let desired = build(observed.clone())?;
            if serde_json::to_value(&desired)? == serde_json::to_value(&observed)? {
                (observed, OperationResult::Unchanged)
            } else {
                let updated = client
                    .replace(&resource, namespace, &to_dynamic(&desired)?)
                    .await
                    .with_context(|| format!("failed to update {kind} {name}"))?;
                (from_dynamic(updated)?, OperationResult::Updated)
            }
        }
    };

    record(&kind, namespace, name, result);
    Ok((object, result))
}

/// Delete an object if it exists. Returns true when a delete was issued.
///
/// # Errors
///
/// Returns any client error other than not-found.
pub async fn delete_if_exists(
    client: &dyn ClusterClient,
    resource: &ApiResource,
    namespace: Option<&str>,
    name: &str,
) -> Result<bool> {
    match client.delete(resource, namespace, name).await {
        Ok(()) => {
            info!(kind = %resource.kind, namespace = ?namespace, name, "Deleted object");
            Ok(true)
        }
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e).with_context(|| format!("failed to delete {} {name}", resource.kind)),
    }
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
