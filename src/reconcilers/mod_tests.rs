// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `reconcile_product`.

#[cfg(test)]
mod tests {
    use super::super::{reconcile_product, ProductPass, ProductReconciler, ProductVersions};
    use crate::client::get_typed;
    use crate::config::ProductConfig;
    use crate::context::Context;
    use crate::crd::{Installation, InstallationSpec, ProductName, ProductStatus, StatusPhase};
    use crate::events::{reasons, MockEventRecorder};
    use crate::fake::{fake_context, FakeCluster, FakeMarketplace, FakeThreeScale};
    use crate::reconcilers::finalizers::finalizer_name;
    use crate::reconcilers::phase::{PhaseResult, Step};
    use async_trait::async_trait;
    use futures::FutureExt;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use k8s_openapi::jiff::Timestamp as Utc;
    use std::sync::{Arc, Mutex};

    const INSTALLATION_NS: &str = "redhat-rhmi-operator";
    const HOST: &str = "https://toy.apps.example.com";
    const VERSIONS: ProductVersions = ProductVersions {
        product: "1.2",
        operator: "0.3.0",
    };

    /// Product whose forward and teardown steps report scripted phases.
    struct Toy {
        ctx: Arc<Context>,
        forward: Vec<StatusPhase>,
        teardown: Vec<StatusPhase>,
        ran: Mutex<Vec<String>>,
    }

    impl Toy {
        fn new(ctx: Arc<Context>, forward: Vec<StatusPhase>, teardown: Vec<StatusPhase>) -> Self {
            Self {
                ctx,
                forward,
                teardown,
                ran: Mutex::new(Vec::new()),
            }
        }

        fn ran(&self) -> Vec<String> {
            self.ran.lock().unwrap().clone()
        }

        async fn forward_step(&self, index: usize, pass: &mut ProductPass) -> PhaseResult {
            self.ran.lock().unwrap().push(format!("forward-{index}"));
            pass.config.host = HOST.to_string();
            Ok(self.forward[index])
        }

        async fn teardown_step(&self, index: usize, _pass: &mut ProductPass) -> PhaseResult {
            self.ran.lock().unwrap().push(format!("teardown-{index}"));
            Ok(self.teardown[index])
        }
    }

    #[async_trait]
    impl ProductReconciler for Toy {
        fn product(&self) -> ProductName {
            ProductName::Grafana
        }

        fn verify_version(&self, status: &ProductStatus) -> bool {
            status.version == VERSIONS.product
        }

        async fn reconcile(&self, installation: &Installation, status: &mut ProductStatus) -> PhaseResult {
            let config = ProductConfig {
                namespace: "redhat-rhmi-toy".to_string(),
                operator_namespace: "redhat-rhmi-toy-operator".to_string(),
                ..Default::default()
            };
            let mut pass = ProductPass::new(installation, config);
            let forward = [
                Step::new("forward-0", |r: &Toy, pass| r.forward_step(0, pass).boxed()),
                Step::new("forward-1", |r: &Toy, pass| r.forward_step(1, pass).boxed()),
            ];
            let teardown = [Step::new("teardown-0", |r: &Toy, pass| {
                r.teardown_step(0, pass).boxed()
            })];
            reconcile_product(&self.ctx, self, &mut pass, &teardown, &forward, status, VERSIONS)
                .await
        }
    }

    fn context(cluster: &Arc<FakeCluster>, events: MockEventRecorder) -> Arc<Context> {
        let mut ctx = fake_context(
            cluster.clone(),
            Arc::new(FakeMarketplace::new(StatusPhase::Completed)),
            Arc::new(FakeThreeScale::new()),
            INSTALLATION_NS,
        );
        ctx.events = Arc::new(events);
        Arc::new(ctx)
    }

    fn events_expecting(reason: &'static str, times: usize) -> MockEventRecorder {
        let mut events = MockEventRecorder::new();
        events
            .expect_publish()
            .withf(move |_reference, _type, r, _action, _note| r == reason)
            .times(times)
            .return_const(());
        events
    }

    fn installation() -> Installation {
        let mut installation = Installation::new("rhmi", InstallationSpec::default());
        installation.metadata.namespace = Some(INSTALLATION_NS.to_string());
        installation
    }

    fn deleting_installation() -> Installation {
        let mut installation = installation();
        installation.metadata.deletion_timestamp = Some(Time(Utc::now()));
        installation.metadata.finalizers = Some(vec![finalizer_name(ProductName::Grafana)]);
        installation
    }

    async fn stored(cluster: &FakeCluster) -> Installation {
        get_typed(cluster, Some(INSTALLATION_NS), "rhmi").await.unwrap()
    }

    #[tokio::test]
    async fn test_completed_pass_writes_status_and_announces_once() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert_typed(&installation());
        let ctx = context(&cluster, events_expecting(reasons::PRODUCT_COMPLETED, 1));
        let toy = Toy::new(ctx, vec![StatusPhase::Completed; 2], vec![]);
        let mut status = ProductStatus::new(ProductName::Grafana);

        let phase = toy.reconcile(&installation(), &mut status).await.unwrap();

        assert_eq!(phase, StatusPhase::Completed);
        assert_eq!(status.host, HOST);
        assert_eq!(status.version, "1.2");
        assert_eq!(status.operator_version, "0.3.0");
        assert_eq!(toy.ran(), vec!["forward-0", "forward-1"]);
        assert!(stored(&cluster)
            .await
            .metadata
            .finalizers
            .unwrap()
            .contains(&finalizer_name(ProductName::Grafana)));

        status.phase = phase;
        let phase = toy.reconcile(&stored(&cluster).await, &mut status).await.unwrap();
        assert_eq!(phase, StatusPhase::Completed);
    }

    #[tokio::test]
    async fn test_halted_pass_leaves_status_untouched() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert_typed(&installation());
        let ctx = context(&cluster, events_expecting(reasons::PRODUCT_COMPLETED, 0));
        let toy = Toy::new(
            ctx,
            vec![StatusPhase::AwaitingComponents, StatusPhase::Completed],
            vec![],
        );
        let mut status = ProductStatus::new(ProductName::Grafana);

        let phase = toy.reconcile(&installation(), &mut status).await.unwrap();

        assert_eq!(phase, StatusPhase::AwaitingComponents);
        assert_eq!(toy.ran(), vec!["forward-0"]);
        assert!(status.host.is_empty());
        assert!(status.version.is_empty());
    }

    #[tokio::test]
    async fn test_deletion_runs_only_teardown_then_releases_finalizer() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert_typed(&deleting_installation());
        let ctx = context(&cluster, events_expecting(reasons::PRODUCT_UNINSTALLED, 1));
        let toy = Toy::new(
            ctx,
            vec![StatusPhase::Completed; 2],
            vec![StatusPhase::Completed],
        );
        let mut status = ProductStatus::new(ProductName::Grafana);

        let phase = toy
            .reconcile(&deleting_installation(), &mut status)
            .await
            .unwrap();

        assert_eq!(phase, StatusPhase::Completed);
        assert_eq!(toy.ran(), vec!["teardown-0"]);
        assert!(stored(&cluster)
            .await
            .metadata
            .finalizers
            .unwrap_or_default()
            .is_empty());
        assert!(status.host.is_empty());
    }

    #[tokio::test]
    async fn test_unfinished_teardown_keeps_finalizer() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert_typed(&deleting_installation());
        let ctx = context(&cluster, events_expecting(reasons::PRODUCT_UNINSTALLED, 0));
        let toy = Toy::new(
            ctx,
            vec![StatusPhase::Completed; 2],
            vec![StatusPhase::InProgress],
        );
        let mut status = ProductStatus::new(ProductName::Grafana);

        let phase = toy
            .reconcile(&deleting_installation(), &mut status)
            .await
            .unwrap();

        assert_eq!(phase, StatusPhase::InProgress);
        assert_eq!(toy.ran(), vec!["teardown-0"]);
        assert_eq!(cluster.mutation_count(), 0);
        assert_eq!(
            stored(&cluster).await.metadata.finalizers.unwrap(),
            vec![finalizer_name(ProductName::Grafana)]
        );
    }
}
