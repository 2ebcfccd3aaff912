// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared fixtures for the 3scale reconciler tests

use super::ThreeScaleReconciler;
use crate::client::kinds;
use crate::config::{ConfigStore, ProductConfig};
use crate::context::Context;
use crate::crd::{Installation, InstallationSpec, ProductName, StatusPhase};
use crate::fake::{fake_context, FakeCluster, FakeMarketplace, FakeThreeScale};
use crate::labels::ZYNC_ROUTE_TO_LABEL;
use crate::reconcilers::ProductPass;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::DynamicObject;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

pub(super) const INSTALLATION_NS: &str = "redhat-rhmi-operator";
pub(super) const PRODUCT_NS: &str = "redhat-rhmi-3scale";
pub(super) const OPERATOR_NS: &str = "redhat-rhmi-3scale-operator";
pub(super) const RHSSO_NS: &str = "redhat-rhmi-rhsso";
pub(super) const MONITORING_NS: &str = "redhat-rhmi-middleware-monitoring-operator";
pub(super) const SEED_ADMIN: &str = "3scale-admin";
pub(super) const ADMIN_HOST: &str = "3scale-admin.apps.example.com";
pub(super) const MASTER_HOST: &str = "master.apps.example.com";
pub(super) const DEVELOPER_HOST: &str = "3scale.apps.example.com";

// =====================================================
// Helper Functions
// =====================================================

pub(super) struct Harness {
    pub cluster: Arc<FakeCluster>,
    pub marketplace: Arc<FakeMarketplace>,
    pub threescale: Arc<FakeThreeScale>,
    pub ctx: Arc<Context>,
    pub reconciler: ThreeScaleReconciler,
}

pub(super) fn create_test_harness(phase: StatusPhase) -> Harness {
    let cluster = Arc::new(FakeCluster::new());
    let marketplace = Arc::new(FakeMarketplace::new(phase));
    let threescale = Arc::new(FakeThreeScale::new());
    let ctx = Arc::new(fake_context(
        cluster.clone(),
        marketplace.clone(),
        threescale.clone(),
        INSTALLATION_NS,
    ));
    Harness {
        cluster,
        marketplace,
        threescale,
        reconciler: ThreeScaleReconciler::new(ctx.clone()),
        ctx,
    }
}

pub(super) fn create_test_installation() -> Installation {
    let mut installation = Installation::new(
        "rhmi",
        InstallationSpec {
            namespace_prefix: "redhat-rhmi-".to_string(),
            routing_subdomain: "apps.example.com".to_string(),
            smtp_secret: Some("redhat-rhmi-smtp".to_string()),
            ..Default::default()
        },
    );
    installation.metadata.namespace = Some(INSTALLATION_NS.to_string());
    installation
}

pub(super) fn create_test_pass(installation: &Installation) -> ProductPass {
    ProductPass::new(
        installation,
        ProductConfig {
            namespace: PRODUCT_NS.to_string(),
            operator_namespace: OPERATOR_NS.to_string(),
            ..Default::default()
        },
    )
}

pub(super) fn create_test_secret(namespace: &str, name: &str, data: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Default::default()
    }
}

/// A route created by zync for `target`.
pub(super) fn create_test_route(name: &str, target: &str, host: &str) -> DynamicObject {
    let mut route = DynamicObject::new(name, &kinds::route()).within(PRODUCT_NS);
    route.metadata.labels = Some(BTreeMap::from([(
        ZYNC_ROUTE_TO_LABEL.to_string(),
        target.to_string(),
    )]));
    route.data = json!({"spec": {"host": host}});
    route
}

/// A `KeycloakUser` of the identity provider realm.
pub(super) fn create_test_keycloak_user(name: &str, username: &str, email: &str) -> DynamicObject {
    let mut user = DynamicObject::new(name, &kinds::keycloak_user()).within(RHSSO_NS);
    user.data = json!({"spec": {"user": {"username": username, "email": email}}});
    user
}

pub(super) fn seed_oauth_client_secret(cluster: &FakeCluster) {
    cluster.insert_typed(&create_test_secret(
        INSTALLATION_NS,
        "oauth-client-secrets",
        &[("3scale", "oauth-secret")],
    ));
}

pub(super) fn seed_system_seed(cluster: &FakeCluster) {
    cluster.insert_typed(&create_test_secret(
        PRODUCT_NS,
        "system-seed",
        &[("ADMIN_ACCESS_TOKEN", "token"), ("ADMIN_USER", SEED_ADMIN)],
    ));
}

/// The three portal routes zync creates.
pub(super) fn seed_portal_routes(cluster: &FakeCluster) {
    for route in [
        create_test_route("zync-admin", "system-provider", ADMIN_HOST),
        create_test_route("zync-developer", "system-developer", DEVELOPER_HOST),
        create_test_route("zync-master", "system-master", MASTER_HOST),
    ] {
        cluster.insert(&kinds::route(), route);
    }
}

pub(super) async fn write_rhsso_config(ctx: &Context) {
    ctx.config
        .write(
            ProductName::Rhsso,
            &ProductConfig {
                namespace: RHSSO_NS.to_string(),
                realm: "openshift".to_string(),
                host: "https://sso.apps.example.com".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
}

pub(super) async fn write_monitoring_config(ctx: &Context) {
    ctx.config
        .write(
            ProductName::Monitoring,
            &ProductConfig {
                namespace: MONITORING_NS.to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
}

/// Mark a cloud resource request complete with a connection secret in the
/// installation namespace.
pub(super) fn complete_request(
    cluster: &FakeCluster,
    resource: &kube::api::ApiResource,
    name: &str,
    data: &[(&str, &str)],
) {
    cluster.insert_typed(&create_test_secret(INSTALLATION_NS, name, data));
    cluster.update_data(
        resource,
        Some(INSTALLATION_NS),
        name,
        &json!({
            "status": {
                "phase": "complete",
                "secretRef": {"name": name, "namespace": INSTALLATION_NS},
            },
        }),
    );
}
