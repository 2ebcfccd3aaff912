// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `openshift.rs`

#[cfg(test)]
mod tests {
    use crate::client::{kinds, string_at};
    use crate::crd::{Installation, InstallationSpec};
    use crate::fake::{FakeCluster, Mutation};
    use crate::labels::{DEPLOYMENT_CONFIG_LABEL, ZYNC_ROUTE_TO_LABEL};
    use crate::reconcilers::openshift::{
        find_route_host, find_running_pod, join_url, reconcile_blackbox_target,
        reconcile_oauth_client, remove_oauth_client, rollout_deployment_config, route_host,
    };
    use crate::reconcilers::resources::OperationResult;
    use k8s_openapi::api::core::v1::{Pod, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::api::DynamicObject;
    use serde_json::json;
    use std::collections::BTreeMap;

    const NS: &str = "redhat-rhmi-3scale";

    fn installation() -> Installation {
        let mut installation = Installation::new("rhmi", InstallationSpec::default());
        installation.metadata.namespace = Some("redhat-rhmi-operator".to_string());
        installation
    }

    fn route(name: &str, host: &str, route_to: &str) -> DynamicObject {
        let mut route = DynamicObject::new(name, &kinds::route()).within(NS);
        route.metadata.labels = Some(BTreeMap::from([(
            ZYNC_ROUTE_TO_LABEL.to_string(),
            route_to.to_string(),
        )]));
        route.data = json!({"spec": {"host": host}});
        route
    }

    fn pod(name: &str, phase: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(NS.to_string()),
                labels: Some(BTreeMap::from([(
                    DEPLOYMENT_CONFIG_LABEL.to_string(),
                    "system-sidekiq".to_string(),
                )])),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_rollout_posts_instantiate() {
        let cluster = FakeCluster::new();
        cluster.insert(
            &kinds::deployment_config(),
            DynamicObject::new("system-app", &kinds::deployment_config()).within(NS),
        );

        rollout_deployment_config(&cluster, NS, "system-app").await.unwrap();

        assert_eq!(
            cluster.mutations(),
            vec![Mutation::Subresource {
                kind: "DeploymentConfig".to_string(),
                name: "system-app".to_string(),
                subresource: "instantiate".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_rollout_of_missing_deployment_config_fails() {
        let cluster = FakeCluster::new();

        assert!(rollout_deployment_config(&cluster, NS, "system-app").await.is_err());
    }

    #[tokio::test]
    async fn test_route_host_missing_is_none() {
        let cluster = FakeCluster::new();

        assert_eq!(route_host(&cluster, NS, "grafana-route").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_route_host_by_prefix() {
        let cluster = FakeCluster::new();
        cluster.insert(&kinds::route(), route("a", "3scale.apps.example.com", "system-provider"));
        cluster.insert(&kinds::route(), route("b", "3scale-admin.apps.example.com", "system-provider"));
        cluster.insert(&kinds::route(), route("c", "master.apps.example.com", "system-master"));

        let host = find_route_host(
            &cluster,
            NS,
            &format!("{ZYNC_ROUTE_TO_LABEL}=system-provider"),
            "3scale-admin.",
        )
        .await
        .unwrap();

        assert_eq!(host.as_deref(), Some("3scale-admin.apps.example.com"));
    }

    #[tokio::test]
    async fn test_find_running_pod_skips_pending() {
        let cluster = FakeCluster::new();
        cluster.insert_typed(&pod("sidekiq-1", "Pending"));
        cluster.insert_typed(&pod("sidekiq-2", "Running"));

        let pod = find_running_pod(&cluster, NS, &format!("{DEPLOYMENT_CONFIG_LABEL}=system-sidekiq"))
            .await
            .unwrap();

        assert_eq!(pod.as_deref(), Some("sidekiq-2"));
    }

    #[tokio::test]
    async fn test_oauth_client_fields_and_removal() {
        let cluster = FakeCluster::new();
        let inst = installation();

        let result = reconcile_oauth_client(
            &cluster,
            &inst,
            "redhat-rhmi-3scale",
            "s3cret",
            vec!["https://master.apps.example.com".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(result, OperationResult::Created);
        let oauth = cluster
            .object(&kinds::oauth_client(), None, "redhat-rhmi-3scale")
            .unwrap();
        assert_eq!(string_at(&oauth, "/secret"), Some("s3cret"));
        assert_eq!(string_at(&oauth, "/grantMethod"), Some("auto"));
        assert_eq!(oauth.data["redirectURIs"], json!(["https://master.apps.example.com"]));

        assert!(remove_oauth_client(&cluster, "redhat-rhmi-3scale").await.unwrap());
        assert!(!remove_oauth_client(&cluster, "redhat-rhmi-3scale").await.unwrap());
    }

    #[tokio::test]
    async fn test_blackbox_target_spec() {
        let cluster = FakeCluster::new();

        reconcile_blackbox_target(
            &cluster,
            &installation(),
            "redhat-rhmi-middleware-monitoring-operator",
            "integreatly-3scale-admin-ui",
            "https://3scale-admin.apps.example.com/p/login/",
            "3scale-admin-ui",
        )
        .await
        .unwrap();

        let target = cluster
            .object(
                &kinds::blackbox_target(),
                Some("redhat-rhmi-middleware-monitoring-operator"),
                "integreatly-3scale-admin-ui",
            )
            .unwrap();
        assert_eq!(
            target.data["spec"],
            json!({"blackboxTargets": [{
                "module": "http_2xx",
                "service": "3scale-admin-ui",
                "url": "https://3scale-admin.apps.example.com/p/login/",
            }]})
        );
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://a.example.com/", "/p/login/"), "https://a.example.com/p/login/");
        assert_eq!(join_url("https://a.example.com", "p/login/"), "https://a.example.com/p/login/");
        assert_eq!(join_url("https://a.example.com", ""), "https://a.example.com");
    }
}
