// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `secrets.rs`

#[cfg(test)]
mod tests {
    use crate::client::get_typed;
    use crate::crd::{Installation, InstallationSpec, PullSecretSpec};
    use crate::errors::is_not_found;
    use crate::fake::FakeCluster;
    use crate::labels::OWNER_NAME_ANNOTATION;
    use crate::reconcilers::resources::OperationResult;
    use crate::reconcilers::secrets::{
        copy_pull_secret, copy_secret, generate_password, reconcile_owned_secret, secret_value,
        secret_value_or_empty, string_data,
    };
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn secret(namespace: &str, name: &str, pairs: &[(&str, &str)]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(string_data(pairs.iter().copied())),
            type_: Some("kubernetes.io/dockerconfigjson".to_string()),
            ..Default::default()
        }
    }

    fn installation(pull_secret: Option<PullSecretSpec>) -> Installation {
        let mut installation = Installation::new(
            "rhmi",
            InstallationSpec {
                pull_secret,
                ..Default::default()
            },
        );
        installation.metadata.namespace = Some("redhat-rhmi-operator".to_string());
        installation
    }

    #[test]
    fn test_generate_password_length() {
        let password = generate_password(43);
        assert_eq!(BASE64.decode(&password).unwrap().len(), 43);
        assert_ne!(password, generate_password(43));
    }

    #[test]
    fn test_secret_values() {
        let s = secret("ns", "s", &[("user", "admin")]);
        assert_eq!(secret_value(&s, "user").unwrap(), "admin");
        assert!(secret_value(&s, "password").unwrap_err().to_string().contains("password"));
        assert_eq!(secret_value_or_empty(&s, "password"), "");
    }

    #[tokio::test]
    async fn test_copy_secret_copies_data_and_type() {
        let cluster = FakeCluster::new();
        cluster.insert_typed(&secret("src", "seed", &[("ADMIN_USER", "admin")]));

        let first = copy_secret(&cluster, "src", "seed", "dst", "seed").await.unwrap();
        let second = copy_secret(&cluster, "src", "seed", "dst", "seed").await.unwrap();

        assert_eq!(first, OperationResult::Created);
        assert_eq!(second, OperationResult::Unchanged);
        let copied: Secret = get_typed(&cluster, Some("dst"), "seed").await.unwrap();
        assert_eq!(secret_value(&copied, "ADMIN_USER").unwrap(), "admin");
        assert_eq!(copied.type_.as_deref(), Some("kubernetes.io/dockerconfigjson"));
    }

    #[tokio::test]
    async fn test_copy_missing_secret_is_not_found() {
        let cluster = FakeCluster::new();

        let err = copy_secret(&cluster, "src", "seed", "dst", "seed").await.unwrap_err();

        assert!(is_not_found(&err));
    }

    #[tokio::test]
    async fn test_copy_pull_secret() {
        let cluster = FakeCluster::new();
        cluster.insert_typed(&secret("openshift-config", "pull-secret", &[(".dockerconfigjson", "{}")]));
        let inst = installation(Some(PullSecretSpec {
            name: "pull-secret".to_string(),
            namespace: "openshift-config".to_string(),
        }));

        let result = copy_pull_secret(&cluster, &inst, "redhat-rhmi-3scale", "threescale-registry-auth")
            .await
            .unwrap();

        assert_eq!(result, OperationResult::Created);
        assert!(cluster.contains(
            &crate::client::resource_of::<Secret>(),
            Some("redhat-rhmi-3scale"),
            "threescale-registry-auth"
        ));
    }

    #[tokio::test]
    async fn test_copy_pull_secret_without_spec_is_noop() {
        let cluster = FakeCluster::new();

        let result = copy_pull_secret(&cluster, &installation(None), "ns", "auth").await.unwrap();

        assert_eq!(result, OperationResult::Unchanged);
        assert_eq!(cluster.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_owned_secret_is_annotated_and_idempotent() {
        let cluster = FakeCluster::new();
        let inst = installation(None);

        reconcile_owned_secret(&cluster, &inst, "ns", "backend-redis", string_data([("URL", "redis://a:1/0")]))
            .await
            .unwrap();
        let second =
            reconcile_owned_secret(&cluster, &inst, "ns", "backend-redis", string_data([("URL", "redis://a:1/0")]))
                .await
                .unwrap();

        assert_eq!(second, OperationResult::Unchanged);
        let stored: Secret = get_typed(&cluster, Some("ns"), "backend-redis").await.unwrap();
        assert_eq!(stored.metadata.annotations.unwrap()[OWNER_NAME_ANNOTATION], "rhmi");
    }
}
