// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Installation` status bookkeeping.
//!
//! Product reconcilers only fill in the [`ProductStatus`] they are handed. The
//! installation controller collects those into the `products` stage, derives
//! the aggregate phase and the `Ready` condition, and writes everything back in
//! a single status patch through [`InstallationStatusUpdater`].
//!
//! # Condition Format
//!
//! Conditions follow the Kubernetes conventions:
//! - `type`: the aspect being reported (`Ready`)
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: a programmatic identifier (CamelCase)
//! - `message`: a human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp of the last status flip
//!
//! # Example
//!
//! ```rust,no_run
//! use product_bundle_operator::client::ClusterClient;
//! use product_bundle_operator::crd::{Installation, ProductName, ProductStatus, StatusPhase};
//! use product_bundle_operator::reconcilers::status::InstallationStatusUpdater;
//!
//! async fn record(cluster: &dyn ClusterClient, installation: &Installation) -> anyhow::Result<()> {
//!     let mut updater = InstallationStatusUpdater::new(installation);
//!     let mut grafana = ProductStatus::new(ProductName::Grafana);
//!     grafana.phase = StatusPhase::Completed;
//!     updater.set_product(grafana);
//!     updater.finish(false);
//!     updater.apply(cluster).await
//! }
//! ```

use crate::client::{resource_of, ClusterClient};
use crate::crd::{
    Condition, Installation, InstallationStage, InstallationStatus, ProductName, ProductStatus,
    StatusPhase, PRODUCTS_STAGE,
};
use crate::status_reasons::{
    CONDITION_TYPE_READY, REASON_ALL_PRODUCTS_COMPLETED, REASON_PRODUCTS_INSTALLING,
    REASON_PRODUCT_FAILED, REASON_UNINSTALLED, REASON_UNINSTALLING, STATUS_FALSE, STATUS_TRUE,
};
use anyhow::{Context as _, Result};
use chrono::Utc;
use kube::ResourceExt;
use serde_json::{json, Value};
use tracing::debug;

/// Create a new condition stamped with the current time.
///
/// # Example
///
/// ```rust,no_run
/// # use product_bundle_operator::reconcilers::status::create_condition;
/// let condition = create_condition("Ready", "True", "AllProductsCompleted", "Installed");
/// assert_eq!(condition.r#type, "Ready");
/// ```
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in place, without an API call.
///
/// `lastTransitionTime` is kept when the status value does not flip.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) else {
        conditions.push(create_condition(condition_type, status, reason, message));
        return;
    };

    if existing.status != status || existing.last_transition_time.is_none() {
        existing.last_transition_time = Some(Utc::now().to_rfc3339());
    }
    existing.status = status.to_string();
    existing.reason = Some(reason.to_string());
    existing.message = Some(message.to_string());
}

/// True when both lists carry the same type, status, reason and message for
/// every condition. Transition times are ignored.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    current.len() == new.len()
        && new.iter().all(|n| {
            find_condition(current, &n.r#type).is_some_and(|c| {
                c.status == n.status && c.reason == n.reason && c.message == n.message
            })
        })
}

/// Aggregate phase of a set of product phases.
///
/// Any failure fails the whole. Otherwise the aggregate is `Completed` only
/// when every product completed; an empty set has nothing to report.
#[must_use]
pub fn aggregate_phase<I>(phases: I) -> StatusPhase
where
    I: IntoIterator<Item = StatusPhase>,
{
    let mut seen = false;
    let mut completed = true;
    for phase in phases {
        seen = true;
        if phase == StatusPhase::Failed {
            return StatusPhase::Failed;
        }
        completed &= phase.is_completed();
    }
    match (seen, completed) {
        (false, _) => StatusPhase::Initial,
        (true, true) => StatusPhase::Completed,
        (true, false) => StatusPhase::InProgress,
    }
}

/// Collects status changes of one controller pass and writes them in one
/// status patch.
pub struct InstallationStatusUpdater {
    namespace: Option<String>,
    name: String,
    current_status: Option<InstallationStatus>,
    new_status: InstallationStatus,
}

impl InstallationStatusUpdater {
    /// Start from the status currently recorded on `installation`.
    #[must_use]
    pub fn new(installation: &Installation) -> Self {
        let current_status = installation.status.clone();
        let new_status = current_status.clone().unwrap_or_default();

        Self {
            namespace: installation.namespace(),
            name: installation.name_any(),
            current_status,
            new_status,
        }
    }

    /// Recorded status of `product`, or a fresh entry.
    #[must_use]
    pub fn product(&self, product: ProductName) -> ProductStatus {
        self.new_status
            .stages
            .get(PRODUCTS_STAGE)
            .and_then(|stage| stage.products.get(product.as_str()))
            .cloned()
            .unwrap_or_else(|| ProductStatus::new(product))
    }

    /// Store the status of one product in the `products` stage.
    pub fn set_product(&mut self, status: ProductStatus) {
        let stage = self
            .new_status
            .stages
            .entry(PRODUCTS_STAGE.to_string())
            .or_insert_with(|| InstallationStage {
                name: PRODUCTS_STAGE.to_string(),
                ..Default::default()
            });
        stage.products.insert(status.name.clone(), status);
    }

    pub fn set_last_error(&mut self, error: Option<String>) {
        self.new_status.last_error = error;
    }

    /// Record the operator version that completed the installation.
    pub fn set_version(&mut self, version: Option<String>) {
        self.new_status.version = version;
    }

    pub fn set_observed_generation(&mut self, generation: Option<i64>) {
        self.new_status.observed_generation = generation;
    }

    pub fn set_condition(&mut self, condition_type: &str, status: &str, reason: &str, message: &str) {
        update_condition_in_memory(
            &mut self.new_status.conditions,
            condition_type,
            status,
            reason,
            message,
        );
    }

    /// Derive stage and installation phases and the `Ready` condition from the
    /// product statuses collected so far. Returns the aggregate phase.
    pub fn finish(&mut self, deleting: bool) -> StatusPhase {
        let mut pending = Vec::new();
        let mut failed = Vec::new();
        let phase = match self.new_status.stages.get_mut(PRODUCTS_STAGE) {
            Some(stage) => {
                for product in stage.products.values() {
                    match product.phase {
                        StatusPhase::Failed => failed.push(product.name.clone()),
                        phase if !phase.is_completed() => pending.push(product.name.clone()),
                        _ => {}
                    }
                }
                stage.phase = aggregate_phase(stage.products.values().map(|p| p.phase));
                stage.phase
            }
            None => StatusPhase::Initial,
        };
        self.new_status.phase = phase;

        let (status, reason, message) = match (deleting, phase) {
            (true, StatusPhase::Completed) => (
                STATUS_FALSE,
                REASON_UNINSTALLED,
                "All products were uninstalled".to_string(),
            ),
            (true, _) => (
                STATUS_FALSE,
                REASON_UNINSTALLING,
                format!("Uninstalling products: {}", pending.join(", ")),
            ),
            (false, StatusPhase::Completed) => (
                STATUS_TRUE,
                REASON_ALL_PRODUCTS_COMPLETED,
                "All products are installed".to_string(),
            ),
            (false, StatusPhase::Failed) => (
                STATUS_FALSE,
                REASON_PRODUCT_FAILED,
                format!("Products failed: {}", failed.join(", ")),
            ),
            (false, _) => (
                STATUS_FALSE,
                REASON_PRODUCTS_INSTALLING,
                format!("Waiting on products: {}", pending.join(", ")),
            ),
        };
        self.set_condition(CONDITION_TYPE_READY, status, reason, &message);
        phase
    }

    /// Status that [`apply`](Self::apply) would write.
    #[must_use]
    pub fn status(&self) -> &InstallationStatus {
        &self.new_status
    }

    /// True when the collected status differs semantically from the recorded one.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        let Some(current) = &self.current_status else {
            return true;
        };
        current.phase != self.new_status.phase
            || current.stages != self.new_status.stages
            || current.observed_generation != self.new_status.observed_generation
            || current.last_error != self.new_status.last_error
            || current.version != self.new_status.version
            || !conditions_equal(&current.conditions, &self.new_status.conditions)
    }

    /// Merge patch for the status subresource. A cleared error is sent as
    /// `null` so the merge removes it.
    fn patch(&self) -> Value {
        let mut patch = json!({ "status": self.new_status });
        if self.new_status.last_error.is_none() {
            patch["status"]["lastError"] = Value::Null;
        }
        patch
    }

    /// Write the collected status, skipping the call when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the status patch is rejected.
    pub async fn apply(&self, cluster: &dyn ClusterClient) -> Result<()> {
        if !self.has_changes() {
            debug!(
                namespace = ?self.namespace,
                name = %self.name,
                "Installation status unchanged, skipping update"
            );
            return Ok(());
        }

        cluster
            .patch_status(
                &resource_of::<Installation>(),
                self.namespace.as_deref(),
                &self.name,
                &self.patch(),
            )
            .await
            .with_context(|| format!("failed to update status of installation {}", self.name))?;

        debug!(
            name = %self.name,
            phase = %self.new_status.phase,
            "Updated installation status"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
