// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-product finalizers on the `Installation`.
//!
//! Each product holds its own finalizer (`finalizer.<product>.bundle.platform.io`)
//! on the `Installation` so the resource cannot disappear before every product has
//! torn itself down. [`reconcile_finalizer`] is the first thing a product
//! reconciler runs on every pass:
//!
//! - not deleting: make sure the finalizer is present, then continue forward
//! - deleting with the finalizer present: run the teardown steps instead of the
//!   forward sequence; remove the finalizer once they all converge
//! - deleting without the finalizer: teardown already finished in an earlier pass
//!
//! # Example
//!
//! ```rust,ignore
//! match reconcile_finalizer(cluster, &sequencer, installation, &teardown, self, &mut pass).await? {
//!     FinalizerOutcome::Continue => {}
//!     FinalizerOutcome::Halted(phase) => return Ok(phase),
//!     FinalizerOutcome::Finished => return Ok(StatusPhase::Completed),
//! }
//! ```

use crate::client::{get_typed, resource_of, ClusterClient};
use crate::constants::{API_GROUP, FINALIZER_PREFIX};
use crate::crd::{Installation, ProductName, StatusPhase};
use crate::events::{actions, reasons};
use crate::reconcilers::phase::{PhaseError, Sequencer, Step};
use anyhow::{Context, Result};
use kube::ResourceExt;
use serde_json::json;
use tracing::info;

/// Finalizer held by `product` on the `Installation`.
#[must_use]
pub fn finalizer_name(product: ProductName) -> String {
    format!("{FINALIZER_PREFIX}.{}.{API_GROUP}", product.as_str())
}

/// What the caller should do after [`reconcile_finalizer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalizerOutcome {
    /// Not deleting; run the forward steps
    Continue,
    /// Teardown has not converged; report this phase
    Halted(StatusPhase),
    /// Teardown is done and the finalizer is gone; report completed
    Finished,
}

fn has_finalizer(installation: &Installation, finalizer: &str) -> bool {
    installation.finalizers().iter().any(|f| f == finalizer)
}

async fn patch_finalizers(
    client: &dyn ClusterClient,
    installation: &Installation,
    finalizers: Vec<String>,
) -> Result<()> {
    let name = installation.name_any();
    let namespace = installation.namespace();
    let patch = json!({
        "metadata": {
            "finalizers": finalizers,
            "resourceVersion": installation.resource_version(),
        }
    });
    client
        .patch_merge(&resource_of::<Installation>(), namespace.as_deref(), &name, &patch)
        .await
        .with_context(|| format!("failed to update finalizers of Installation {name}"))?;
    Ok(())
}

/// Add `finalizer` to the latest copy of the installation if it is missing.
///
/// Returns true when a patch was sent.
///
/// # Errors
///
/// Returns an error if the installation cannot be read or patched.
pub async fn ensure_finalizer(
    client: &dyn ClusterClient,
    installation: &Installation,
    finalizer: &str,
) -> Result<bool> {
    if has_finalizer(installation, finalizer) {
        return Ok(false);
    }
    let latest: Installation =
        get_typed(client, installation.namespace().as_deref(), &installation.name_any()).await?;
    if has_finalizer(&latest, finalizer) {
        return Ok(false);
    }

    info!(finalizer, installation = %latest.name_any(), "Adding finalizer");
    let mut finalizers = latest.finalizers().to_vec();
    finalizers.push(finalizer.to_string());
    patch_finalizers(client, &latest, finalizers).await?;
    Ok(true)
}

/// Remove `finalizer` from the latest copy of the installation if present.
///
/// Returns true when a patch was sent.
///
/// # Errors
///
/// Returns an error if the installation cannot be read or patched.
pub async fn remove_finalizer(
    client: &dyn ClusterClient,
    installation: &Installation,
    finalizer: &str,
) -> Result<bool> {
    let latest: Installation =
        get_typed(client, installation.namespace().as_deref(), &installation.name_any()).await?;
    if !has_finalizer(&latest, finalizer) {
        return Ok(false);
    }

    info!(finalizer, installation = %latest.name_any(), "Removing finalizer");
    let finalizers = latest
        .finalizers()
        .iter()
        .filter(|f| *f != finalizer)
        .cloned()
        .collect();
    patch_finalizers(client, &latest, finalizers).await?;
    Ok(true)
}

/// Finalizer handling for one product.
///
/// Runs `teardown` through `sequencer` when the installation is being deleted and
/// still carries the product's finalizer. Teardown errors and non-completed phases
/// halt teardown and are retried on the next poll; the finalizer is only removed
/// once every teardown step reports completed.
///
/// # Errors
///
/// Returns the first teardown error, or a failed [`PhaseError`] when the
/// finalizer cannot be added or removed.
pub async fn reconcile_finalizer<R, S>(
    client: &dyn ClusterClient,
    sequencer: &Sequencer<'_>,
    installation: &Installation,
    teardown: &[Step<R, S>],
    reconciler: &R,
    state: &mut S,
) -> Result<FinalizerOutcome, PhaseError> {
    let product = sequencer.product();
    let finalizer = finalizer_name(product);

    if !installation.is_deleting() {
        ensure_finalizer(client, installation, &finalizer)
            .await
            .map_err(PhaseError::failed)?;
        return Ok(FinalizerOutcome::Continue);
    }

    if !has_finalizer(installation, &finalizer) {
        return Ok(FinalizerOutcome::Finished);
    }

    info!(product = %product, "Installation is being deleted, running teardown");
    let phase = sequencer.run(teardown, reconciler, state).await?;
    if !phase.is_completed() {
        return Ok(FinalizerOutcome::Halted(phase));
    }

    remove_finalizer(client, installation, &finalizer)
        .await
        .map_err(PhaseError::failed)?;
    sequencer
        .normal(
            reasons::PRODUCT_UNINSTALLED,
            actions::UNINSTALL,
            format!("{product} was removed"),
        )
        .await;
    Ok(FinalizerOutcome::Finished)
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
