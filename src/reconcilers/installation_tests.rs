// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `installation.rs`

#[cfg(test)]
mod tests {
    use super::super::{
        error_policy, product_reconcilers, reconcile_installation, run_products, ReconcileError,
    };
    use crate::client::{get_typed, resource_of};
    use crate::context::Context;
    use crate::crd::{Installation, InstallationSpec, ProductName, StatusPhase};
    use crate::crd::ProductStatus;
    use crate::fake::{fake_context, FakeCluster, FakeMarketplace, FakeThreeScale};
    use crate::reconcilers::phase::PhaseResult;
    use crate::reconcilers::ProductReconciler;
    use crate::status_reasons::REASON_ALL_PRODUCTS_COMPLETED;
    use crate::version::operator_version;
    use async_trait::async_trait;
    use crate::reconcilers::finalizers::finalizer_name;
    use crate::reconcilers::status::find_condition;
    use crate::status_reasons::{REASON_PRODUCTS_INSTALLING, REASON_UNINSTALLED};
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use k8s_openapi::jiff::Timestamp as Utc;
    use kube::api::DynamicObject;
    use kube::runtime::controller::Action;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const INSTALLATION_NS: &str = "redhat-rhmi-operator";

    fn context(cluster: &Arc<FakeCluster>, phase: StatusPhase) -> Arc<Context> {
        Arc::new(fake_context(
            cluster.clone(),
            Arc::new(FakeMarketplace::new(phase)),
            Arc::new(FakeThreeScale::new()),
            INSTALLATION_NS,
        ))
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
        installation.metadata.generation = Some(1);
        installation
    }

    /// Completes immediately, reporting `version`.
    struct Stub {
        version: &'static str,
    }

    #[async_trait]
    impl ProductReconciler for Stub {
        fn product(&self) -> ProductName {
            ProductName::Grafana
        }

        fn verify_version(&self, status: &ProductStatus) -> bool {
            status.version == "6.6.0"
        }

        async fn reconcile(&self, _installation: &Installation, status: &mut ProductStatus) -> PhaseResult {
            status.version = self.version.to_string();
            Ok(StatusPhase::Completed)
        }
    }

    fn stub(version: &'static str) -> Vec<Box<dyn ProductReconciler>> {
        vec![Box::new(Stub { version })]
    }

    async fn stored(cluster: &FakeCluster) -> Installation {
        get_typed(cluster, Some(INSTALLATION_NS), "rhmi").await.unwrap()
    }

    #[test]
    fn test_products_run_grafana_first() {
        let cluster = Arc::new(FakeCluster::new());
        let products: Vec<_> = product_reconcilers(&context(&cluster, StatusPhase::Completed))
            .iter()
            .map(|r| r.product())
            .collect();

        assert_eq!(products, vec![ProductName::Grafana, ProductName::ThreeScale]);
    }

    #[tokio::test]
    async fn test_first_pass_records_every_product() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert_typed(&installation());
        let ctx = context(&cluster, StatusPhase::InProgress);

        let action = reconcile_installation(Arc::new(installation()), ctx)
            .await
            .unwrap();

        assert_eq!(action, Action::requeue(Duration::from_secs(30)));
        let stored = stored(&cluster).await;
        let finalizers = stored.metadata.finalizers.clone().unwrap();
        assert!(finalizers.contains(&finalizer_name(ProductName::Grafana)));
        assert!(finalizers.contains(&finalizer_name(ProductName::ThreeScale)));

        let status = stored.status.clone().unwrap();
        assert_eq!(status.phase, StatusPhase::InProgress);
        assert_eq!(status.observed_generation, Some(1));
        assert!(status.last_error.is_none());
        for product in [ProductName::Grafana, ProductName::ThreeScale] {
            assert_eq!(
                stored.product_status(product).unwrap().phase,
                StatusPhase::InProgress
            );
        }
        let ready = find_condition(&status.conditions, "Ready").unwrap();
        assert_eq!(ready.reason.as_deref(), Some(REASON_PRODUCTS_INSTALLING));
    }

    #[tokio::test]
    async fn test_product_failure_is_recorded_and_others_still_run() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert_typed(&installation());
        let mut config = DynamicObject::new("installation-config", &resource_of::<ConfigMap>())
            .within(INSTALLATION_NS);
        config.data = json!({"data": {"grafana": "namespace: [unclosed"}});
        cluster.insert(&resource_of::<ConfigMap>(), config);
        let ctx = context(&cluster, StatusPhase::InProgress);

        let action = reconcile_installation(Arc::new(installation()), ctx)
            .await
            .unwrap();

        assert_eq!(action, Action::requeue(Duration::from_secs(30)));
        let stored = stored(&cluster).await;
        let status = stored.status.clone().unwrap();
        assert_eq!(status.phase, StatusPhase::Failed);
        assert!(status.last_error.unwrap().starts_with("grafana: "));
        assert_eq!(
            stored.product_status(ProductName::Grafana).unwrap().phase,
            StatusPhase::Failed
        );
        assert_eq!(
            stored.product_status(ProductName::ThreeScale).unwrap().phase,
            StatusPhase::InProgress
        );
    }

    #[tokio::test]
    async fn test_deletion_without_finalizers_completes_and_settles() {
        let cluster = Arc::new(FakeCluster::new());
        let mut deleting = installation();
        deleting.metadata.deletion_timestamp = Some(Time(Utc::now()));
        cluster.insert_typed(&deleting);
        let ctx = context(&cluster, StatusPhase::Completed);

        let action = reconcile_installation(Arc::new(deleting), ctx.clone())
            .await
            .unwrap();

        assert_eq!(action, Action::requeue(Duration::from_secs(300)));
        let after_first = stored(&cluster).await;
        let status = after_first.status.clone().unwrap();
        assert_eq!(status.phase, StatusPhase::Completed);
        let ready = find_condition(&status.conditions, "Ready").unwrap();
        assert_eq!(ready.status, "False");
        assert_eq!(ready.reason.as_deref(), Some(REASON_UNINSTALLED));

        let mutations = cluster.mutation_count();
        reconcile_installation(Arc::new(after_first), ctx).await.unwrap();
        assert_eq!(cluster.mutation_count(), mutations);
    }

    #[tokio::test]
    async fn test_missing_installation_fails_pass() {
        let cluster = Arc::new(FakeCluster::new());
        let ctx = context(&cluster, StatusPhase::Completed);

        let result = reconcile_installation(Arc::new(installation()), ctx).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_removed_installation_during_deletion_awaits_change() {
        let cluster = Arc::new(FakeCluster::new());
        let ctx = context(&cluster, StatusPhase::Completed);
        let mut deleting = installation();
        deleting.metadata.deletion_timestamp = Some(Time(Utc::now()));

        let action = reconcile_installation(Arc::new(deleting), ctx).await.unwrap();

        assert_eq!(action, Action::await_change());
    }

    #[test]
    fn test_error_policy_requeues_after_thirty_seconds() {
        let cluster = Arc::new(FakeCluster::new());
        let err = ReconcileError::from(anyhow::anyhow!("boom"));

        let action = error_policy(
            Arc::new(installation()),
            &err,
            context(&cluster, StatusPhase::Completed),
        );

        assert_eq!(action, Action::requeue(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_completed_product_with_unexpected_version_stays_in_progress() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert_typed(&installation());
        let ctx = context(&cluster, StatusPhase::Completed);

        let action = run_products(&installation(), &ctx, stub("6.5.0")).await.unwrap();

        assert_eq!(action, Action::requeue(Duration::from_secs(30)));
        let stored = stored(&cluster).await;
        assert_eq!(
            stored.product_status(ProductName::Grafana).unwrap().phase,
            StatusPhase::InProgress
        );
        let status = stored.status.unwrap();
        assert_eq!(status.phase, StatusPhase::InProgress);
        assert!(status.version.is_none());
    }

    #[tokio::test]
    async fn test_completed_installation_records_operator_version() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert_typed(&installation());
        let ctx = context(&cluster, StatusPhase::Completed);

        let action = run_products(&installation(), &ctx, stub("6.6.0")).await.unwrap();

        assert_eq!(action, Action::requeue(Duration::from_secs(300)));
        let status = stored(&cluster).await.status.unwrap();
        assert_eq!(status.phase, StatusPhase::Completed);
        assert_eq!(status.version.as_deref(), Some(operator_version()));
        let ready = find_condition(&status.conditions, "Ready").unwrap();
        assert_eq!(ready.reason.as_deref(), Some(REASON_ALL_PRODUCTS_COMPLETED));
    }
}
