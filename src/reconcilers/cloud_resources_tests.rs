// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `cloud_resources.rs`

#[cfg(test)]
mod tests {
    use crate::client::{kinds, string_at};
    use crate::crd::{Installation, InstallationSpec, InstallationType, ProductName};
    use crate::fake::FakeCluster;
    use crate::labels::PRODUCT_NAME_LABEL;
    use crate::reconcilers::cloud_resources::{
        connection_secret, is_complete, reconcile_cloud_resource,
    };
    use crate::reconcilers::secrets::secret_value;
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::ByteString;
    use kube::api::DynamicObject;
    use serde_json::json;
    use std::collections::BTreeMap;

    const INSTALLATION_NS: &str = "redhat-rhmi-operator";

    fn installation() -> Installation {
        let mut installation = Installation::new(
            "rhmi",
            InstallationSpec {
                r#type: InstallationType::Workshop,
                ..Default::default()
            },
        );
        installation.metadata.namespace = Some(INSTALLATION_NS.to_string());
        installation
    }

    fn secret(name: &str, data: &[(&str, &str)]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(INSTALLATION_NS.to_string()),
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

    #[tokio::test]
    async fn test_request_spec_and_labels() {
        let cluster = FakeCluster::new();

        let request = reconcile_cloud_resource(
            &cluster,
            &installation(),
            &kinds::redis(),
            "threescale-redis-rhmi",
            ProductName::ThreeScale,
        )
        .await
        .unwrap();

        assert_eq!(request.metadata.namespace.as_deref(), Some(INSTALLATION_NS));
        assert_eq!(
            request.data["spec"],
            json!({
                "type": "workshop",
                "tier": "production",
                "secretRef": {"name": "threescale-redis-rhmi", "namespace": INSTALLATION_NS},
            })
        );
        assert_eq!(
            request.metadata.labels.as_ref().unwrap()[PRODUCT_NAME_LABEL],
            "3scale"
        );
        assert!(!is_complete(&request));
    }

    #[tokio::test]
    async fn test_request_keeps_status_and_is_written_once() {
        let cluster = FakeCluster::new();
        let inst = installation();
        reconcile_cloud_resource(&cluster, &inst, &kinds::postgres(), "pg", ProductName::ThreeScale)
            .await
            .unwrap();
        cluster.update_data(
            &kinds::postgres(),
            Some(INSTALLATION_NS),
            "pg",
            &json!({"status": {"phase": "complete"}}),
        );

        let request =
            reconcile_cloud_resource(&cluster, &inst, &kinds::postgres(), "pg", ProductName::ThreeScale)
                .await
                .unwrap();

        assert!(is_complete(&request));
        assert_eq!(cluster.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_connection_secret_follows_secret_ref() {
        let cluster = FakeCluster::new();
        cluster.insert_typed(&secret("pg-conn", &[("host", "db.local")]));
        let mut request = DynamicObject::new("pg", &kinds::postgres()).within(INSTALLATION_NS);
        request.data = json!({
            "status": {
                "phase": "complete",
                "secretRef": {"name": "pg-conn", "namespace": INSTALLATION_NS}
            }
        });

        let found = connection_secret(&cluster, &request).await.unwrap();

        assert_eq!(secret_value(&found, "host").unwrap(), "db.local");
        assert_eq!(string_at(&request, "/status/phase"), Some("complete"));
    }

    #[tokio::test]
    async fn test_connection_secret_without_ref_is_error() {
        let cluster = FakeCluster::new();
        let request = DynamicObject::new("pg", &kinds::postgres()).within(INSTALLATION_NS);

        let err = connection_secret(&cluster, &request).await.unwrap_err();

        assert!(err.to_string().contains("secretRef"));
    }
}
