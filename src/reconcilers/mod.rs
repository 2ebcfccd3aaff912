// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Product reconcilers and the machinery they share.
//!
//! Every product of the bundle is installed by a [`ProductReconciler`]. A
//! reconciler builds two named step lists per pass: teardown steps, run while the
//! `Installation` is being deleted, and forward steps, run otherwise.
//! [`reconcile_product`] composes them in a fixed order:
//!
//! 1. **Finalizer** - make sure the product's finalizer is on the `Installation`,
//!    or run teardown and release it when the `Installation` is being deleted
//! 2. **Forward steps** - namespaces, secrets, subscription, product objects
//! 3. **Status** - copy host and versions into the product status and publish a
//!    `ProductCompleted` event the first time the product completes
//!
//! Steps share a [`ProductPass`]: the `Installation` and a snapshot of the
//! product's configuration, read once at the start of the pass.
//!
//! # Available Reconcilers
//!
//! - [`GrafanaReconciler`] - Customer monitoring dashboards
//! - [`ThreeScaleReconciler`] - API management
//!
//! # Example: Reconciling one product
//!
//! ```rust,no_run
//! use product_bundle_operator::context::Context;
//! use product_bundle_operator::crd::{Installation, ProductName, ProductStatus};
//! use product_bundle_operator::reconcilers::{GrafanaReconciler, ProductReconciler};
//! use std::sync::Arc;
//!
//! async fn reconcile_grafana(ctx: Arc<Context>, installation: &Installation) {
//!     let reconciler = GrafanaReconciler::new(ctx);
//!     let mut status = ProductStatus::new(ProductName::Grafana);
//!     match reconciler.reconcile(installation, &mut status).await {
//!         Ok(phase) => println!("grafana is {phase}"),
//!         Err(e) => eprintln!("grafana failed: {e}"),
//!     }
//! }
//! ```

pub mod cloud_resources;
pub mod finalizers;
pub mod grafana;
pub mod installation;
pub mod marketplace;
pub mod namespaces;
pub mod openshift;
pub mod phase;
pub mod resources;
pub mod secrets;
pub mod status;
pub mod threescale;

pub use grafana::GrafanaReconciler;
pub use installation::{error_policy, reconcile_installation, ReconcileError};
pub use threescale::ThreeScaleReconciler;

use crate::config::ProductConfig;
use crate::context::Context;
use crate::crd::{Installation, ProductName, ProductStatus, StatusPhase};
use crate::events::{actions, reasons};
use crate::metrics;
use async_trait::async_trait;
use finalizers::{reconcile_finalizer, FinalizerOutcome};
use kube::Resource;
use phase::{PhaseResult, Sequencer, Step};
use tracing::info;

/// Installs, upgrades and tears down one product.
#[async_trait]
pub trait ProductReconciler: Send + Sync {
    /// Product this reconciler installs.
    fn product(&self) -> ProductName;

    /// True when `status` reports the product and operator versions this
    /// reconciler installs.
    fn verify_version(&self, status: &ProductStatus) -> bool;

    /// Run one pass for `installation`, updating `status` on completion.
    ///
    /// # Errors
    ///
    /// Returns the first step error, carrying the phase the product is left in.
    async fn reconcile(&self, installation: &Installation, status: &mut ProductStatus) -> PhaseResult;
}

/// State shared by the steps of one pass.
#[derive(Clone, Debug)]
pub struct ProductPass {
    pub installation: Installation,
    /// Snapshot read at the start of the pass. Steps update it and persist
    /// changes explicitly.
    pub config: ProductConfig,
}

impl ProductPass {
    #[must_use]
    pub fn new(installation: &Installation, config: ProductConfig) -> Self {
        Self {
            installation: installation.clone(),
            config,
        }
    }

    /// Product namespace
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Namespace the product operator runs in
    #[must_use]
    pub fn operator_namespace(&self) -> &str {
        &self.config.operator_namespace
    }
}

/// Versions a product reports once installed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProductVersions {
    pub product: &'static str,
    pub operator: &'static str,
}

/// Run one product pass: finalizer, forward steps, then status write-back.
///
/// Forward steps never run when the finalizer handler reports teardown finished
/// or halted.
///
/// # Errors
///
/// Returns the first teardown or forward step error.
pub async fn reconcile_product<R>(
    ctx: &Context,
    reconciler: &R,
    pass: &mut ProductPass,
    teardown: &[Step<R, ProductPass>],
    forward: &[Step<R, ProductPass>],
    status: &mut ProductStatus,
    versions: ProductVersions,
) -> PhaseResult
where
    R: ProductReconciler,
{
    let product = reconciler.product();
    let installation = pass.installation.clone();
    let sequencer = Sequencer::new(product, ctx.events.as_ref(), installation.object_ref(&()));

    match reconcile_finalizer(
        ctx.cluster.as_ref(),
        &sequencer,
        &installation,
        teardown,
        reconciler,
        pass,
    )
    .await?
    {
        FinalizerOutcome::Continue => {}
        FinalizerOutcome::Halted(phase) => return Ok(phase),
        FinalizerOutcome::Finished => {
            metrics::record_product_installed(pass.namespace(), product, false);
            return Ok(StatusPhase::Completed);
        }
    }

    let phase = sequencer.run(forward, reconciler, pass).await?;
    if !phase.is_completed() {
        return Ok(phase);
    }

    status.host.clone_from(&pass.config.host);
    status.version = versions.product.to_string();
    status.operator_version = versions.operator.to_string();
    metrics::record_product_installed(pass.namespace(), product, true);

    if !status.phase.is_completed() {
        sequencer
            .normal(
                reasons::PRODUCT_COMPLETED,
                actions::RECONCILE,
                format!("{product} was installed"),
            )
            .await;
    }
    info!(product = %product, "Product reconciled successfully");
    Ok(StatusPhase::Completed)
}

#[cfg(test)]
mod mod_tests;
