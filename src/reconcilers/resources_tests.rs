// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resources.rs`

#[cfg(test)]
mod tests {
    use crate::client::{kinds, resource_of, ClusterClient};
    use crate::fake::{FakeCluster, Mutation};
    use crate::reconcilers::resources::{
        create_or_update, create_or_update_typed, delete_if_exists, OperationResult,
    };
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::ByteString;
    use kube::api::DynamicObject;
    use serde_json::json;
    use std::collections::BTreeMap;

    const NS: &str = "redhat-rhmi-3scale";

    fn smtp_secret(password: &str) -> impl FnOnce(Secret) -> anyhow::Result<Secret> + '_ {
        move |mut secret| {
            secret.data = Some(BTreeMap::from([(
                "password".to_string(),
                ByteString(password.as_bytes().to_vec()),
            )]));
            Ok(secret)
        }
    }

    #[tokio::test]
    async fn test_typed_create_then_unchanged() {
        let cluster = FakeCluster::new();

        let (secret, first) =
            create_or_update_typed::<Secret, _>(&cluster, Some(NS), "system-smtp", smtp_secret("a"))
                .await
                .unwrap();
        let (_, second) =
            create_or_update_typed::<Secret, _>(&cluster, Some(NS), "system-smtp", smtp_secret("a"))
                .await
                .unwrap();

        assert_eq!(first, OperationResult::Created);
        assert_eq!(second, OperationResult::Unchanged);
        assert_eq!(secret.metadata.namespace.as_deref(), Some(NS));
        assert_eq!(cluster.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_typed_update_on_change() {
        let cluster = FakeCluster::new();
        create_or_update_typed::<Secret, _>(&cluster, Some(NS), "system-smtp", smtp_secret("a"))
            .await
            .unwrap();

        let (secret, result) =
            create_or_update_typed::<Secret, _>(&cluster, Some(NS), "system-smtp", smtp_secret("b"))
                .await
                .unwrap();

        assert_eq!(result, OperationResult::Updated);
        assert!(result.changed());
        let data = secret.data.unwrap();
        assert_eq!(data["password"].0, b"b".to_vec());
        assert_eq!(
            cluster.mutations()[1],
            Mutation::Replace {
                kind: "Secret".to_string(),
                name: "system-smtp".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_builder_error_writes_nothing() {
        let cluster = FakeCluster::new();

        let result = create_or_update(&cluster, &kinds::api_manager(), Some(NS), "3scale", |_| {
            anyhow::bail!("missing wildcard domain")
        })
        .await;

        assert!(result.is_err());
        assert_eq!(cluster.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_dynamic_builder_sees_observed_object() {
        let cluster = FakeCluster::new();
        let mut existing = DynamicObject::new("3scale", &kinds::api_manager()).within(NS);
        existing.data = json!({"spec": {"wildcardDomain": "apps.example.com"}, "status": {"deployments": {}}});
        cluster.insert(&kinds::api_manager(), existing);

        let (object, result) =
            create_or_update(&cluster, &kinds::api_manager(), Some(NS), "3scale", |mut observed| {
                assert_eq!(observed.data["spec"]["wildcardDomain"], "apps.example.com");
                observed.data["spec"]["highAvailability"] = json!({"enabled": true});
                Ok(observed)
            })
            .await
            .unwrap();

        assert_eq!(result, OperationResult::Updated);
        assert_eq!(object.data["spec"]["highAvailability"]["enabled"], true);
        assert_eq!(object.data["status"], json!({"deployments": {}}));
    }

    #[tokio::test]
    async fn test_delete_if_exists() {
        let cluster = FakeCluster::new();
        let resource = kinds::console_link();
        cluster.insert(&resource, DynamicObject::new("link", &resource));

        assert!(delete_if_exists(&cluster, &resource, None, "link").await.unwrap());
        assert!(!delete_if_exists(&cluster, &resource, None, "link").await.unwrap());
        assert!(cluster.get(&resource, None, "link").await.is_err());
    }
}
