// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Product and operator namespaces.

use crate::client::{get_typed_opt, resource_of, ClusterClient};
use crate::crd::{Installation, StatusPhase};
use crate::labels::{
    add_managed_labels, add_owner_annotations, MANAGED_LABEL, MONITORING_KEY_LABEL,
    MONITORING_KEY_VALUE,
};
use crate::reconcilers::phase::{PhaseContext, PhaseResult};
use crate::reconcilers::resources::create_or_update_typed;
use k8s_openapi::api::core::v1::Namespace;
use tracing::info;

const TERMINATING: &str = "Terminating";

fn is_terminating(namespace: &Namespace) -> bool {
    namespace
        .status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        == Some(TERMINATING)
}

/// Create or label namespace `name` for `installation`.
///
/// Reports [`StatusPhase::InProgress`] while the namespace is terminating; it is
/// recreated on a later poll once it is gone.
///
/// # Errors
///
/// Returns a failed phase if the namespace cannot be read or written.
pub async fn reconcile_namespace(
    client: &dyn ClusterClient,
    name: &str,
    installation: &Installation,
) -> PhaseResult {
    let existing: Option<Namespace> = get_typed_opt(client, None, name)
        .await
        .failed_context(format!("failed to get namespace {name}"))?;
    if existing.as_ref().is_some_and(is_terminating) {
        info!(namespace = name, "Namespace is terminating, waiting");
        return Ok(StatusPhase::InProgress);
    }

    create_or_update_typed::<Namespace, _>(client, None, name, |mut namespace| {
        add_managed_labels(&mut namespace.metadata);
        let labels = namespace.metadata.labels.get_or_insert_with(Default::default);
        labels.insert(MANAGED_LABEL.to_string(), "true".to_string());
        labels.insert(MONITORING_KEY_LABEL.to_string(), MONITORING_KEY_VALUE.to_string());
        add_owner_annotations(&mut namespace.metadata, installation);
        Ok(namespace)
    })
    .await
    .failed_context(format!("failed to reconcile namespace {name}"))?;

    Ok(StatusPhase::Completed)
}

/// Delete namespace `name`.
///
/// Reports [`StatusPhase::Completed`] once the namespace no longer exists and
/// [`StatusPhase::InProgress`] while it is being deleted.
///
/// # Errors
///
/// Returns a failed phase if the namespace cannot be read or deleted.
pub async fn remove_namespace(client: &dyn ClusterClient, name: &str) -> PhaseResult {
    let existing: Option<Namespace> = get_typed_opt(client, None, name)
        .await
        .failed_context(format!("failed to get namespace {name}"))?;
    let Some(namespace) = existing else {
        return Ok(StatusPhase::Completed);
    };

    if !is_terminating(&namespace) {
        info!(namespace = name, "Deleting namespace");
        match client.delete(&resource_of::<Namespace>(), None, name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(StatusPhase::Completed),
            Err(e) => return Err(e).failed_context(format!("failed to delete namespace {name}")),
        }
    }
    Ok(StatusPhase::InProgress)
}

#[cfg(test)]
#[path = "namespaces_tests.rs"]
mod namespaces_tests;
