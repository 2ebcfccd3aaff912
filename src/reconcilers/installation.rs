// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Installation` controller reconciliation.
//!
//! One controller pass runs every product reconciler of the bundle in order,
//! or in reverse order while the `Installation` is being deleted. A product
//! that halts or fails does not stop the products after it; each one reports
//! its own phase into the `products` stage of the status, which is written back
//! in a single patch at the end of the pass.

use crate::constants::{ERROR_REQUEUE_DURATION_SECS, KIND_INSTALLATION};
use crate::context::Context;
use crate::crd::{Installation, StatusPhase};
use crate::errors::is_not_found;
use crate::events::{actions, reasons};
use crate::metrics;
use crate::reconcilers::status::InstallationStatusUpdater;
use crate::reconcilers::{GrafanaReconciler, ProductReconciler, ThreeScaleReconciler};
use crate::version;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Error surfaced to the controller runtime.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ReconcileError(#[from] anyhow::Error);

/// Product reconcilers in install order.
#[must_use]
pub fn product_reconcilers(ctx: &Arc<Context>) -> Vec<Box<dyn ProductReconciler>> {
    vec![
        Box::new(GrafanaReconciler::new(ctx.clone())),
        Box::new(ThreeScaleReconciler::new(ctx.clone())),
    ]
}

/// Reconcile one `Installation`.
///
/// Product errors are recorded in the status and do not fail the pass; only
/// a failed status write is returned as an error.
///
/// # Errors
///
/// Returns an error if the status patch is rejected.
pub async fn reconcile_installation(
    installation: Arc<Installation>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let result = run_products(&installation, &ctx, product_reconcilers(&ctx)).await;
    match &result {
        Ok(_) => metrics::record_reconciliation_success(KIND_INSTALLATION, start.elapsed()),
        Err(e) => {
            error!(installation = %installation.name_any(), error = %e, "Failed to reconcile Installation");
            metrics::record_reconciliation_error(KIND_INSTALLATION, start.elapsed());
        }
    }
    result
}

async fn run_products(
    installation: &Installation,
    ctx: &Arc<Context>,
    mut reconcilers: Vec<Box<dyn ProductReconciler>>,
) -> Result<Action, ReconcileError> {
    let name = installation.name_any();
    let deleting = installation.is_deleting();
    debug!(
        installation = %name,
        namespace = ?installation.namespace(),
        deleting,
        "Reconciling Installation"
    );

    if deleting {
        reconcilers.reverse();
    }

    let mut updater = InstallationStatusUpdater::new(installation);
    let mut errors = Vec::new();
    for reconciler in &reconcilers {
        let product = reconciler.product();
        let mut status = updater.product(product);
        match reconciler.reconcile(installation, &mut status).await {
            Ok(phase) if phase.is_completed() && !deleting && !reconciler.verify_version(&status) => {
                warn!(
                    product = %product,
                    version = %status.version,
                    operator_version = %status.operator_version,
                    "Product completed with unexpected versions"
                );
                status.phase = StatusPhase::InProgress;
            }
            Ok(phase) => status.phase = phase,
            Err(e) => {
                warn!(product = %product, phase = %e.phase, error = %e.error, "Product pass failed");
                status.phase = e.phase;
                errors.push(format!("{product}: {:#}", e.error));
            }
        }
        updater.set_product(status);
    }

    updater.set_last_error((!errors.is_empty()).then(|| errors.join("; ")));
    updater.set_observed_generation(installation.meta().generation);
    let previous = installation.status.as_ref().map(|s| s.phase);
    let phase = updater.finish(deleting);
    if phase.is_completed() && !deleting {
        updater.set_version(Some(version::operator_version().to_string()));
    }

    if let Err(e) = updater.apply(ctx.cluster.as_ref()).await {
        // The last finalizer going away lets the API server drop the object
        if deleting && is_not_found(&e) {
            info!(installation = %name, "Installation removed");
            return Ok(Action::await_change());
        }
        return Err(e.into());
    }

    if phase.is_completed() && !deleting && previous != Some(StatusPhase::Completed) {
        ctx.events
            .publish(
                &installation.object_ref(&()),
                EventType::Normal,
                reasons::INSTALLATION_COMPLETED,
                actions::RECONCILE,
                Some("All products are installed".to_string()),
            )
            .await;
    }

    let requeue = ctx.requeue.interval(phase);
    info!(
        installation = %name,
        phase = %phase,
        requeue_secs = requeue.as_secs(),
        "Installation reconciled"
    );
    Ok(Action::requeue(requeue))
}

/// Requeue after a failed pass.
#[must_use]
pub fn error_policy(
    installation: Arc<Installation>,
    err: &ReconcileError,
    _ctx: Arc<Context>,
) -> Action {
    warn!(installation = %installation.name_any(), error = %err, "Requeueing after error");
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

#[cfg(test)]
#[path = "installation_tests.rs"]
mod installation_tests;
