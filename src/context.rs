// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the installation controller.
//!
//! The controller and every product reconciler receive an `Arc<Context>` holding
//! the collaborators they talk to:
//! - the cluster, through [`ClusterClient`]
//! - the product configuration store
//! - the operator marketplace (subscriptions)
//! - the event recorder
//! - a factory for 3scale admin API clients
//!
//! Production wiring lives in [`Context::new`]; tests assemble a `Context` from
//! a [`FakeCluster`](crate::fake::FakeCluster) and mocks.

use crate::client::{ClusterClient, KubeClusterClient};
use crate::config::{ConfigMapConfigStore, ConfigStore};
use crate::constants::{CONTROLLER_NAME, REQUEUE_WHEN_NOT_READY_SECS, REQUEUE_WHEN_READY_SECS};
use crate::crd::{Installation, StatusPhase};
use crate::events::{EventRecorder, KubeEventRecorder};
use crate::reconcilers::marketplace::{Marketplace, OperatorLifecycleMarketplace};
use crate::threescale::{admin_base_url, ThreeScaleApi, ThreeScaleHttpClient};
use kube::Client;
use std::sync::Arc;
use std::time::Duration;

/// Builds a 3scale admin API client for an installation.
pub type ThreeScaleApiFactory = Arc<dyn Fn(&Installation) -> Arc<dyn ThreeScaleApi> + Send + Sync>;

/// Requeue intervals of the installation controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequeueSettings {
    /// Delay after a pass that left every product completed
    pub ready: Duration,
    /// Delay after a pass that left any product pending
    pub pending: Duration,
}

impl Default for RequeueSettings {
    fn default() -> Self {
        Self {
            ready: Duration::from_secs(REQUEUE_WHEN_READY_SECS),
            pending: Duration::from_secs(REQUEUE_WHEN_NOT_READY_SECS),
        }
    }
}

impl RequeueSettings {
    /// Requeue delay for an installation left in `phase`.
    #[must_use]
    pub fn interval(&self, phase: StatusPhase) -> Duration {
        if phase.is_completed() {
            self.ready
        } else {
            self.pending
        }
    }
}

/// Shared context passed to the controller and product reconcilers.
#[derive(Clone)]
pub struct Context {
    /// Cluster API access
    pub cluster: Arc<dyn ClusterClient>,

    /// Durable per-product configuration
    pub config: Arc<dyn ConfigStore>,

    /// Operator subscriptions
    pub marketplace: Arc<dyn Marketplace>,

    /// Kubernetes events on the `Installation`
    pub events: Arc<dyn EventRecorder>,

    /// 3scale admin API client factory
    pub threescale: ThreeScaleApiFactory,

    /// Requeue intervals
    pub requeue: RequeueSettings,
}

impl Context {
    /// Production context over a Kubernetes client.
    ///
    /// Product configuration is kept in `operator_namespace`.
    #[must_use]
    pub fn new(client: Client, operator_namespace: &str, requeue: RequeueSettings) -> Self {
        let cluster: Arc<dyn ClusterClient> = Arc::new(KubeClusterClient::new(client.clone()));
        let http = reqwest::Client::new();
        let threescale: ThreeScaleApiFactory = Arc::new(move |installation: &Installation| {
            Arc::new(ThreeScaleHttpClient::new(
                http.clone(),
                admin_base_url(installation),
            )) as Arc<dyn ThreeScaleApi>
        });

        Self {
            config: Arc::new(ConfigMapConfigStore::new(cluster.clone(), operator_namespace)),
            marketplace: Arc::new(OperatorLifecycleMarketplace::new(cluster.clone())),
            events: Arc::new(KubeEventRecorder::new(client, CONTROLLER_NAME)),
            cluster,
            threescale,
            requeue,
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
