// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator subscriptions through the Operator Lifecycle Manager (OLM).
//!
//! Product operators are installed by creating an `OperatorGroup` and a
//! `Subscription` in the operator namespace. OLM resolves the subscription into
//! a `ClusterServiceVersion` whose phase tells whether the operator is running.
//! This operator never installs operators itself; it only asserts the
//! subscription and reports the phase OLM observes.

use crate::client::{kinds, string_at, ClusterClient};
use crate::constants::{
    CATALOG_SOURCE_NAME, CSV_PHASE_FAILED, CSV_PHASE_SUCCEEDED, OPERATOR_GROUP_NAME,
    SUBSCRIPTION_CHANNEL,
};
use crate::crd::StatusPhase;
use crate::labels::add_managed_labels;
use crate::reconcilers::resources::create_or_update;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

/// Operator package to subscribe to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionTarget {
    /// Package name in the catalog (e.g. "integreatly-3scale")
    pub package: String,
    /// Namespace the operator is installed into
    pub namespace: String,
    /// Catalog channel
    pub channel: String,
}

impl SubscriptionTarget {
    /// Subscription to `package` on the default channel.
    #[must_use]
    pub fn new(package: &str, namespace: &str) -> Self {
        Self {
            package: package.to_string(),
            namespace: namespace.to_string(),
            channel: SUBSCRIPTION_CHANNEL.to_string(),
        }
    }
}

/// Subscription manager seam.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// Make sure the operator for `target` is subscribed and report its install phase.
    ///
    /// `watched_namespaces` are the namespaces the operator should watch.
    async fn reconcile_subscription(
        &self,
        target: &SubscriptionTarget,
        watched_namespaces: &[String],
    ) -> Result<StatusPhase>;
}

/// [`Marketplace`] backed by OLM objects.
pub struct OperatorLifecycleMarketplace {
    cluster: Arc<dyn ClusterClient>,
}

impl OperatorLifecycleMarketplace {
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self { cluster }
    }
}

/// Map a `ClusterServiceVersion` phase onto a [`StatusPhase`].
#[must_use]
pub fn csv_phase(phase: Option<&str>) -> StatusPhase {
    match phase {
        Some(CSV_PHASE_SUCCEEDED) => StatusPhase::Completed,
        Some(CSV_PHASE_FAILED) => StatusPhase::Failed,
        _ => StatusPhase::InProgress,
    }
}

#[async_trait]
impl Marketplace for OperatorLifecycleMarketplace {
    async fn reconcile_subscription(
        &self,
        target: &SubscriptionTarget,
        watched_namespaces: &[String],
    ) -> Result<StatusPhase> {
        let client = self.cluster.as_ref();
        let namespace = Some(target.namespace.as_str());

        create_or_update(
            client,
            &kinds::operator_group(),
            namespace,
            OPERATOR_GROUP_NAME,
            |mut group| {
                add_managed_labels(&mut group.metadata);
                group.data["spec"] = json!({ "targetNamespaces": watched_namespaces });
                Ok(group)
            },
        )
        .await?;

        let (subscription, _) = create_or_update(
            client,
            &kinds::subscription(),
            namespace,
            &target.package,
            |mut subscription| {
                add_managed_labels(&mut subscription.metadata);
                subscription.data["spec"] = json!({
                    "channel": target.channel,
                    "installPlanApproval": "Automatic",
                    "name": target.package,
                    "source": CATALOG_SOURCE_NAME,
                    "sourceNamespace": target.namespace,
                });
                Ok(subscription)
            },
        )
        .await?;

        let Some(csv_name) = string_at(&subscription, "/status/installedCSV") else {
            debug!(package = %target.package, "Subscription has no installed CSV yet");
            return Ok(StatusPhase::InProgress);
        };

        let csv = match client
            .get(&kinds::cluster_service_version(), namespace, csv_name)
            .await
        {
            Ok(csv) => csv,
            Err(e) if e.is_not_found() => return Ok(StatusPhase::InProgress),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to get CSV {csv_name}"));
            }
        };

        let phase = csv_phase(string_at(&csv, "/status/phase"));
        info!(package = %target.package, csv = csv_name, phase = %phase, "Checked operator install");
        Ok(phase)
    }
}

#[cfg(test)]
#[path = "marketplace_tests.rs"]
mod marketplace_tests;
