// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `grafana.rs`

#[cfg(test)]
mod tests {
    use crate::client::{get_typed, kinds, resource_of, string_at};
    use crate::config::ConfigStore;
    use crate::context::Context;
    use crate::crd::{Installation, InstallationSpec, ProductName, ProductStatus, StatusPhase};
    use crate::events::{reasons, MockEventRecorder};
    use crate::fake::{fake_context, FakeCluster, FakeMarketplace, FakeThreeScale};
    use crate::reconcilers::finalizers::finalizer_name;
    use crate::reconcilers::secrets::secret_value;
    use crate::reconcilers::{GrafanaReconciler, ProductReconciler};
    use k8s_openapi::api::core::v1::{Namespace, Secret};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use k8s_openapi::jiff::Timestamp as Utc;
    use kube::api::DynamicObject;
    use serde_json::json;
    use std::sync::Arc;

    const INSTALLATION_NS: &str = "redhat-rhmi-operator";
    const PRODUCT_NS: &str = "redhat-rhmi-customer-monitoring";
    const OPERATOR_NS: &str = "redhat-rhmi-customer-monitoring-operator";

    struct Harness {
        cluster: Arc<FakeCluster>,
        marketplace: Arc<FakeMarketplace>,
        ctx: Arc<Context>,
    }

    fn harness(phase: StatusPhase) -> Harness {
        let cluster = Arc::new(FakeCluster::new());
        let marketplace = Arc::new(FakeMarketplace::new(phase));
        let ctx = Arc::new(fake_context(
            cluster.clone(),
            marketplace.clone(),
            Arc::new(FakeThreeScale::new()),
            INSTALLATION_NS,
        ));
        Harness {
            cluster,
            marketplace,
            ctx,
        }
    }

    fn installation() -> Installation {
        let mut installation = Installation::new(
            "rhmi",
            InstallationSpec {
                namespace_prefix: "redhat-rhmi-".to_string(),
                routing_subdomain: "apps.example.com".to_string(),
                ..Default::default()
            },
        );
        installation.metadata.namespace = Some(INSTALLATION_NS.to_string());
        installation
    }

    fn seed(cluster: &FakeCluster, installation: &Installation) {
        cluster.insert_typed(installation);
    }

    fn grafana_route() -> DynamicObject {
        let mut route = DynamicObject::new("grafana-route", &kinds::route()).within(OPERATOR_NS);
        route.data = json!({"spec": {"host": "grafana.apps.example.com"}});
        route
    }

    #[tokio::test]
    async fn test_first_pass_waits_on_subscription() {
        let h = harness(StatusPhase::InProgress);
        let inst = installation();
        seed(&h.cluster, &inst);
        let mut status = ProductStatus::new(ProductName::Grafana);

        let phase = GrafanaReconciler::new(h.ctx.clone())
            .reconcile(&inst, &mut status)
            .await
            .unwrap();

        assert_eq!(phase, StatusPhase::InProgress);
        let namespaces = resource_of::<Namespace>();
        assert!(h.cluster.contains(&namespaces, None, OPERATOR_NS));
        assert!(h.cluster.contains(&namespaces, None, PRODUCT_NS));
        let secret: Secret = get_typed(h.cluster.as_ref(), Some(OPERATOR_NS), "grafana-k8s-proxy")
            .await
            .unwrap();
        assert_eq!(secret_value(&secret, "session_secret").unwrap().len(), 60);
        assert!(!h.cluster.contains(&kinds::grafana(), Some(OPERATOR_NS), "grafana"));
        assert_eq!(h.marketplace.targets()[0].package, "integreatly-grafana");
        assert_eq!(h.marketplace.targets()[0].namespace, OPERATOR_NS);

        let stored: Installation =
            get_typed(h.cluster.as_ref(), Some(INSTALLATION_NS), "rhmi").await.unwrap();
        assert!(stored
            .metadata
            .finalizers
            .unwrap()
            .contains(&finalizer_name(ProductName::Grafana)));
    }

    #[tokio::test]
    async fn test_waits_for_route_after_creating_grafana() {
        let h = harness(StatusPhase::Completed);
        let inst = installation();
        seed(&h.cluster, &inst);
        let mut status = ProductStatus::new(ProductName::Grafana);

        let phase = GrafanaReconciler::new(h.ctx.clone())
            .reconcile(&inst, &mut status)
            .await
            .unwrap();

        assert_eq!(phase, StatusPhase::InProgress);
        let grafana = h
            .cluster
            .object(&kinds::grafana(), Some(OPERATOR_NS), "grafana")
            .unwrap();
        assert_eq!(string_at(&grafana, "/spec/ingress/termination"), Some("reencrypt"));
        assert_eq!(
            string_at(&grafana, "/spec/containers/0/image"),
            Some("quay.io/openshift/origin-oauth-proxy:4.2")
        );
        assert_eq!(grafana.data["spec"]["secrets"], json!(["grafana-k8s-tls", "grafana-k8s-proxy"]));
        assert!(status.host.is_empty());
    }

    #[tokio::test]
    async fn test_completes_with_host_and_versions_then_is_idempotent() {
        let h = harness(StatusPhase::Completed);
        let inst = installation();
        seed(&h.cluster, &inst);
        h.cluster.insert(&kinds::route(), grafana_route());
        let reconciler = GrafanaReconciler::new(h.ctx.clone());
        let mut status = ProductStatus::new(ProductName::Grafana);

        let phase = reconciler.reconcile(&inst, &mut status).await.unwrap();
        status.phase = phase;

        assert_eq!(phase, StatusPhase::Completed);
        assert_eq!(status.host, "https://grafana.apps.example.com");
        assert_eq!(status.version, "6.6.0");
        assert_eq!(status.operator_version, "3.2.0");
        let config = h.ctx.config.read(ProductName::Grafana).await.unwrap();
        assert_eq!(config.host, "https://grafana.apps.example.com");
        assert_eq!(config.product_version, "6.6.0");
        assert_eq!(config.namespace, PRODUCT_NS);

        let session = secret_value(
            &get_typed::<Secret>(h.cluster.as_ref(), Some(OPERATOR_NS), "grafana-k8s-proxy")
                .await
                .unwrap(),
            "session_secret",
        )
        .unwrap();
        let writes = h.cluster.mutation_count();

        let phase = reconciler.reconcile(&inst, &mut status).await.unwrap();

        assert_eq!(phase, StatusPhase::Completed);
        assert_eq!(h.cluster.mutation_count(), writes);
        let unchanged = secret_value(
            &get_typed::<Secret>(h.cluster.as_ref(), Some(OPERATOR_NS), "grafana-k8s-proxy")
                .await
                .unwrap(),
            "session_secret",
        )
        .unwrap();
        assert_eq!(session, unchanged);
    }

    #[tokio::test]
    async fn test_completion_event_published_once() {
        let h = harness(StatusPhase::Completed);
        let inst = installation();
        seed(&h.cluster, &inst);
        h.cluster.insert(&kinds::route(), grafana_route());
        let mut events = MockEventRecorder::new();
        events
            .expect_publish()
            .withf(|_, _, reason, _, note| {
                reason == reasons::PRODUCT_COMPLETED && note.as_deref() == Some("grafana was installed")
            })
            .times(1)
            .return_const(());
        let mut ctx = (*h.ctx).clone();
        ctx.events = Arc::new(events);
        let reconciler = GrafanaReconciler::new(Arc::new(ctx));
        let mut status = ProductStatus::new(ProductName::Grafana);

        status.phase = reconciler.reconcile(&inst, &mut status).await.unwrap();
        status.phase = reconciler.reconcile(&inst, &mut status).await.unwrap();

        assert_eq!(status.phase, StatusPhase::Completed);
    }

    #[tokio::test]
    async fn test_deletion_runs_teardown_only() {
        let h = harness(StatusPhase::Completed);
        let inst = installation();
        seed(&h.cluster, &inst);
        let reconciler = GrafanaReconciler::new(h.ctx.clone());
        let mut status = ProductStatus::new(ProductName::Grafana);
        reconciler.reconcile(&inst, &mut status).await.unwrap();
        let subscriptions = h.marketplace.targets().len();

        let mut deleting: Installation =
            get_typed(h.cluster.as_ref(), Some(INSTALLATION_NS), "rhmi").await.unwrap();
        deleting.metadata.deletion_timestamp = Some(Time(Utc::now()));
        h.cluster.insert_typed(&deleting);
        let deleting: Installation =
            get_typed(h.cluster.as_ref(), Some(INSTALLATION_NS), "rhmi").await.unwrap();

        let first = reconciler.reconcile(&deleting, &mut status).await.unwrap();
        assert_eq!(first, StatusPhase::InProgress);
        assert!(!h.cluster.contains(&resource_of::<Namespace>(), None, PRODUCT_NS));

        let deleting: Installation =
            get_typed(h.cluster.as_ref(), Some(INSTALLATION_NS), "rhmi").await.unwrap();
        let second = reconciler.reconcile(&deleting, &mut status).await.unwrap();
        assert_eq!(second, StatusPhase::InProgress);
        assert!(!h.cluster.contains(&resource_of::<Namespace>(), None, OPERATOR_NS));

        let deleting: Installation =
            get_typed(h.cluster.as_ref(), Some(INSTALLATION_NS), "rhmi").await.unwrap();
        let third = reconciler.reconcile(&deleting, &mut status).await.unwrap();

        assert_eq!(third, StatusPhase::Completed);
        assert_eq!(h.marketplace.targets().len(), subscriptions);
        let stored: Installation =
            get_typed(h.cluster.as_ref(), Some(INSTALLATION_NS), "rhmi").await.unwrap();
        assert!(stored.metadata.finalizers.unwrap_or_default().is_empty());
    }

    #[test]
    fn test_verify_version() {
        let h = harness(StatusPhase::Completed);
        let reconciler = GrafanaReconciler::new(h.ctx);
        let mut status = ProductStatus::new(ProductName::Grafana);
        assert!(!reconciler.verify_version(&status));

        status.version = "6.6.0".to_string();
        status.operator_version = "3.2.0".to_string();
        assert!(reconciler.verify_version(&status));

        status.operator_version = "3.1.0".to_string();
        assert!(!reconciler.verify_version(&status));
    }
}
