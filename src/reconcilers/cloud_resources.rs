// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloud resource requests (Redis, Postgres, blob storage).
//!
//! Datastores are provisioned by a separate cloud resource operator. Products
//! create a request custom resource in the installation namespace and wait for
//! the provisioning operator to report `status.phase: complete`. The connection
//! details then live in the secret named by `status.secretRef`.

use crate::client::{get_typed, string_at, ClusterClient};
use crate::constants::{CLOUD_RESOURCE_PHASE_COMPLETE, CLOUD_RESOURCE_TIER};
use crate::crd::{Installation, ProductName};
use crate::labels::{add_managed_labels, add_owner_annotations, PRODUCT_NAME_LABEL};
use crate::reconcilers::resources::create_or_update;
use anyhow::{anyhow, Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{ApiResource, DynamicObject};
use kube::ResourceExt;
use serde_json::json;

/// Create or update a cloud resource request named `name` for `product`.
///
/// The request and the secret it produces live in the installation namespace.
///
/// # Errors
///
/// Returns the client error if the request cannot be read or written.
pub async fn reconcile_cloud_resource(
    client: &dyn ClusterClient,
    installation: &Installation,
    resource: &ApiResource,
    name: &str,
    product: ProductName,
) -> Result<DynamicObject> {
    let namespace = installation.namespace().unwrap_or_default();
    let (request, _) = create_or_update(client, resource, Some(&namespace), name, |mut request| {
        add_managed_labels(&mut request.metadata);
        request
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(PRODUCT_NAME_LABEL.to_string(), product.as_str().to_string());
        add_owner_annotations(&mut request.metadata, installation);
        request.data["spec"] = json!({
            "type": installation.spec.r#type.as_str(),
            "tier": CLOUD_RESOURCE_TIER,
            "secretRef": {
                "name": name,
                "namespace": namespace,
            },
        });
        Ok(request)
    })
    .await?;
    Ok(request)
}

/// True once the provisioning operator reports the request complete.
#[must_use]
pub fn is_complete(request: &DynamicObject) -> bool {
    string_at(request, "/status/phase") == Some(CLOUD_RESOURCE_PHASE_COMPLETE)
}

/// Fetch the connection secret a completed request points at.
///
/// # Errors
///
/// Returns an error if the request has no `status.secretRef` or the secret
/// cannot be read.
pub async fn connection_secret(client: &dyn ClusterClient, request: &DynamicObject) -> Result<Secret> {
    let request_name = request.name_any();
    let name = string_at(request, "/status/secretRef/name")
        .ok_or_else(|| anyhow!("{request_name} has no status.secretRef.name"))?;
    let namespace = string_at(request, "/status/secretRef/namespace")
        .ok_or_else(|| anyhow!("{request_name} has no status.secretRef.namespace"))?;
    get_typed(client, Some(namespace), name)
        .await
        .with_context(|| format!("failed to get connection secret {namespace}/{name}"))
}

#[cfg(test)]
#[path = "cloud_resources_tests.rs"]
mod cloud_resources_tests;
