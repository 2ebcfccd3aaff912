// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use k8s_openapi::api::core::v1::Namespace;
use kube::client::Client;
use product_bundle_operator::client::{get_typed, resource_of};
use product_bundle_operator::context::Context;
use product_bundle_operator::crd::{Installation, InstallationSpec, StatusPhase};
use product_bundle_operator::fake::{fake_context, FakeCluster, FakeMarketplace, FakeThreeScale};
use std::sync::Arc;

pub const INSTALLATION_NS: &str = "redhat-rhmi-operator";
pub const INSTALLATION_NAME: &str = "rhmi";

/// Namespaces the bundle creates for the default `redhat-rhmi-` prefix.
pub const PRODUCT_NAMESPACES: [&str; 4] = [
    "redhat-rhmi-customer-monitoring",
    "redhat-rhmi-customer-monitoring-operator",
    "redhat-rhmi-3scale",
    "redhat-rhmi-3scale-operator",
];

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Fake cluster, marketplace and 3scale portal wired into one context
pub struct TestBundle {
    pub cluster: Arc<FakeCluster>,
    pub marketplace: Arc<FakeMarketplace>,
    pub threescale: Arc<FakeThreeScale>,
    pub ctx: Arc<Context>,
}

impl TestBundle {
    pub fn new(phase: StatusPhase) -> Self {
        let cluster = Arc::new(FakeCluster::new());
        let marketplace = Arc::new(FakeMarketplace::new(phase));
        let threescale = Arc::new(FakeThreeScale::new());
        let ctx = Arc::new(fake_context(
            cluster.clone(),
            marketplace.clone(),
            threescale.clone(),
            INSTALLATION_NS,
        ));
        Self {
            cluster,
            marketplace,
            threescale,
            ctx,
        }
    }

    /// Seed a fresh managed installation and return it.
    pub fn seed_installation(&self) -> Installation {
        let installation = create_installation();
        self.cluster.insert_typed(&installation);
        installation
    }

    /// The installation as currently stored.
    pub async fn installation(&self) -> Installation {
        get_typed(self.cluster.as_ref(), Some(INSTALLATION_NS), INSTALLATION_NAME)
            .await
            .unwrap()
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.cluster
            .contains(&resource_of::<Namespace>(), None, name)
    }
}

/// A managed installation with the `redhat-rhmi-` prefix
pub fn create_installation() -> Installation {
    let mut installation = Installation::new(
        INSTALLATION_NAME,
        InstallationSpec {
            namespace_prefix: "redhat-rhmi-".to_string(),
            routing_subdomain: "apps.example.com".to_string(),
            ..Default::default()
        },
    );
    installation.metadata.namespace = Some(INSTALLATION_NS.to_string());
    installation.metadata.generation = Some(1);
    installation
}
