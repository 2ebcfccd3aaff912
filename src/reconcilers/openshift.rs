// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! OpenShift objects shared by product reconcilers.
//!
//! Routes are read to discover product hosts, deployment configs are rolled out
//! when their mounted configuration changes, and `OAuthClient`s and blackbox
//! targets are created for every product that exposes a UI.

use crate::client::{kinds, list_typed, string_at, ClusterClient};
use crate::crd::Installation;
use crate::labels::{add_managed_labels, add_owner_annotations};
use crate::reconcilers::resources::{create_or_update, delete_if_exists, OperationResult};
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use serde_json::json;
use tracing::info;

/// Blackbox exporter module used for every target
pub const BLACKBOX_MODULE: &str = "http_2xx";

/// Trigger a new rollout of deployment config `name`.
///
/// # Errors
///
/// Returns the client error, including not-found when the deployment config
/// does not exist yet.
pub async fn rollout_deployment_config(
    client: &dyn ClusterClient,
    namespace: &str,
    name: &str,
) -> Result<()> {
    let request = json!({
        "kind": "DeploymentRequest",
        "apiVersion": "apps.openshift.io/v1",
        "name": name,
        "force": true,
        "latest": true,
    });
    client
        .create_subresource(
            &kinds::deployment_config(),
            Some(namespace),
            name,
            "instantiate",
            &request,
        )
        .await
        .with_context(|| format!("failed to roll out deployment config {namespace}/{name}"))?;
    info!(namespace, deployment_config = name, "Triggered rollout");
    Ok(())
}

/// Host of route `name`, or `None` when the route or its host does not exist yet.
///
/// # Errors
///
/// Returns any client error other than not-found.
pub async fn route_host(
    client: &dyn ClusterClient,
    namespace: &str,
    name: &str,
) -> Result<Option<String>> {
    match client.get(&kinds::route(), Some(namespace), name).await {
        Ok(route) => Ok(string_at(&route, "/spec/host").map(str::to_string)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to get route {namespace}/{name}")),
    }
}

/// Hosts of every route in `namespace` matching `label_selector`.
///
/// # Errors
///
/// Returns the client error of the list.
pub async fn route_hosts(
    client: &dyn ClusterClient,
    namespace: &str,
    label_selector: Option<&str>,
) -> Result<Vec<String>> {
    let routes = client
        .list(&kinds::route(), Some(namespace), label_selector)
        .await
        .with_context(|| format!("failed to list routes in {namespace}"))?;
    Ok(routes
        .iter()
        .filter_map(|route| string_at(route, "/spec/host"))
        .map(str::to_string)
        .collect())
}

/// First route host in `namespace` matching `label_selector` that starts with `prefix`.
///
/// # Errors
///
/// Returns the client error of the list.
pub async fn find_route_host(
    client: &dyn ClusterClient,
    namespace: &str,
    label_selector: &str,
    prefix: &str,
) -> Result<Option<String>> {
    Ok(route_hosts(client, namespace, Some(label_selector))
        .await?
        .into_iter()
        .find(|host| host.starts_with(prefix)))
}

/// Name of a pod in phase `Running` matching `label_selector`.
///
/// # Errors
///
/// Returns the client error of the list.
pub async fn find_running_pod(
    client: &dyn ClusterClient,
    namespace: &str,
    label_selector: &str,
) -> Result<Option<String>> {
    let pods: Vec<Pod> = list_typed(client, Some(namespace), Some(label_selector))
        .await
        .with_context(|| format!("failed to list pods in {namespace}"))?;
    Ok(pods
        .iter()
        .find(|pod| {
            pod.status
                .as_ref()
                .and_then(|status| status.phase.as_deref())
                == Some("Running")
        })
        .map(ResourceExt::name_any))
}

/// Create or update the cluster-scoped `OAuthClient` `name`.
///
/// # Errors
///
/// Returns the client error of the read or write.
pub async fn reconcile_oauth_client(
    client: &dyn ClusterClient,
    installation: &Installation,
    name: &str,
    secret: &str,
    redirect_uris: Vec<String>,
) -> Result<OperationResult> {
    let (_, result) = create_or_update(client, &kinds::oauth_client(), None, name, |mut oauth| {
        add_managed_labels(&mut oauth.metadata);
        add_owner_annotations(&mut oauth.metadata, installation);
        oauth.data["secret"] = json!(secret);
        oauth.data["redirectURIs"] = json!(redirect_uris);
        oauth.data["grantMethod"] = json!("auto");
        Ok(oauth)
    })
    .await?;
    Ok(result)
}

/// Delete the `OAuthClient` `name` if it exists.
///
/// # Errors
///
/// Returns any client error other than not-found.
pub async fn remove_oauth_client(client: &dyn ClusterClient, name: &str) -> Result<bool> {
    delete_if_exists(client, &kinds::oauth_client(), None, name).await
}

/// Create or update a blackbox target probing `url`.
///
/// # Errors
///
/// Returns the client error of the read or write.
pub async fn reconcile_blackbox_target(
    client: &dyn ClusterClient,
    installation: &Installation,
    namespace: &str,
    name: &str,
    url: &str,
    service: &str,
) -> Result<OperationResult> {
    let (_, result) = create_or_update(
        client,
        &kinds::blackbox_target(),
        Some(namespace),
        name,
        |mut target| {
            add_owner_annotations(&mut target.metadata, installation);
            target.data["spec"] = json!({
                "blackboxTargets": [{
                    "module": BLACKBOX_MODULE,
                    "service": service,
                    "url": url,
                }],
            });
            Ok(target)
        },
    )
    .await?;
    Ok(result)
}

/// Join a host URL and a path with exactly one slash between them.
#[must_use]
pub fn join_url(host: &str, path: &str) -> String {
    if path.is_empty() {
        return host.to_string();
    }
    format!(
        "{}/{}",
        host.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
#[path = "openshift_tests.rs"]
mod openshift_tests;
