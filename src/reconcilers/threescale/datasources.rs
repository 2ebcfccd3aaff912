// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! SMTP settings and external datastores of 3scale.
//!
//! Redis, Postgres and blob storage are requested from the cloud resource
//! operator. Once a request reports complete, its connection secret is
//! translated into the secret layout the `APIManager` reads.

use super::ThreeScaleReconciler;
use crate::client::{get_typed, kinds};
use crate::constants::{
    EXTERNAL_BACKEND_REDIS_SECRET_NAME, EXTERNAL_POSTGRES_SECRET_NAME,
    EXTERNAL_SYSTEM_REDIS_SECRET_NAME, THREESCALE_BACKEND_REDIS_PREFIX,
    THREESCALE_BLOB_STORAGE_PREFIX, THREESCALE_POSTGRES_PREFIX, THREESCALE_REDIS_SUFFIX,
    THREESCALE_ROLLOUT_DEPLOYMENTS, THREESCALE_SMTP_SECRET_NAME, THREESCALE_SYSTEM_REDIS_PREFIX,
};
use crate::crd::{Installation, ProductName, StatusPhase};
use crate::reconcilers::cloud_resources::{connection_secret, is_complete, reconcile_cloud_resource};
use crate::reconcilers::openshift::rollout_deployment_config;
use crate::reconcilers::phase::{PhaseContext, PhaseResult};
use crate::reconcilers::secrets::{reconcile_owned_secret, secret_value_or_empty, string_data};
use crate::reconcilers::ProductPass;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// `system-smtp` key and the key of the installation's SMTP secret it is read from.
const SMTP_KEYS: [(&str, &str); 7] = [
    ("address", "host"),
    ("authentication", "authentication"),
    ("domain", "domain"),
    ("openssl.verify.mode", "openssl.verify.mode"),
    ("password", "password"),
    ("port", "port"),
    ("username", "username"),
];

pub(super) fn backend_redis_name() -> String {
    format!("{THREESCALE_BACKEND_REDIS_PREFIX}{THREESCALE_REDIS_SUFFIX}")
}

pub(super) fn system_redis_name() -> String {
    format!("{THREESCALE_SYSTEM_REDIS_PREFIX}{THREESCALE_REDIS_SUFFIX}")
}

pub(super) fn postgres_name(installation: &Installation) -> String {
    format!("{THREESCALE_POSTGRES_PREFIX}{}", installation.name_any())
}

pub(super) fn blob_storage_name(installation: &Installation) -> String {
    format!("{THREESCALE_BLOB_STORAGE_PREFIX}{}", installation.name_any())
}

/// Contents of `system-smtp`. Missing source values become empty strings.
pub(super) fn smtp_data(source: Option<&Secret>) -> BTreeMap<String, ByteString> {
    string_data(SMTP_KEYS.iter().map(|(key, source_key)| {
        let value = source
            .map(|secret| secret_value_or_empty(secret, source_key))
            .unwrap_or_default();
        (*key, value)
    }))
}

/// Contents of `backend-redis`: storage on database 0, queues on database 1.
pub(super) fn backend_redis_data(credentials: &Secret) -> BTreeMap<String, ByteString> {
    let uri = secret_value_or_empty(credentials, "uri");
    let port = secret_value_or_empty(credentials, "port");
    string_data([
        ("REDIS_STORAGE_URL", format!("redis://{uri}:{port}/0")),
        ("REDIS_QUEUES_URL", format!("redis://{uri}:{port}/1")),
    ])
}

/// Contents of `system-redis`.
pub(super) fn system_redis_data(credentials: &Secret) -> BTreeMap<String, ByteString> {
    let url = format!(
        "redis://{}:{}/1",
        secret_value_or_empty(credentials, "uri"),
        secret_value_or_empty(credentials, "port")
    );
    string_data([("URL", url.clone()), ("MESSAGE_BUS_URL", url)])
}

/// Contents of `system-database`.
pub(super) fn postgres_data(credentials: &Secret) -> BTreeMap<String, ByteString> {
    let username = secret_value_or_empty(credentials, "username");
    let password = secret_value_or_empty(credentials, "password");
    let url = format!(
        "postgresql://{username}:{password}@{}:{}/{}",
        secret_value_or_empty(credentials, "host"),
        secret_value_or_empty(credentials, "port"),
        secret_value_or_empty(credentials, "database"),
    );
    string_data([("URL", url), ("DB_USER", username), ("DB_PASSWORD", password)])
}

impl ThreeScaleReconciler {
    /// Copy the installation's SMTP settings into `system-smtp`.
    ///
    /// A missing SMTP secret is not an error; 3scale then runs with empty settings.
    /// Rollout failures are logged and do not fail the step.
    pub(super) async fn smtp_credentials(&self, pass: &mut ProductPass) -> PhaseResult {
        let source = self.smtp_source(&pass.installation).await;
        let result = reconcile_owned_secret(
            self.cluster(),
            &pass.installation,
            pass.namespace(),
            THREESCALE_SMTP_SECRET_NAME,
            smtp_data(source.as_ref()),
        )
        .await
        .failed_context("failed to create or update 3scale smtp secret")?;

        if result.changed() {
            for name in THREESCALE_ROLLOUT_DEPLOYMENTS {
                if let Err(e) = rollout_deployment_config(self.cluster(), pass.namespace(), name).await {
                    warn!(deployment_config = name, error = %format!("{e:#}"), "Failed to roll out after SMTP change");
                }
            }
        }
        Ok(StatusPhase::Completed)
    }

    async fn smtp_source(&self, installation: &Installation) -> Option<Secret> {
        let Some(name) = installation.spec.smtp_secret.as_deref() else {
            warn!("No SMTP secret configured, 3scale will not send email");
            return None;
        };
        let namespace = installation.namespace().unwrap_or_default();
        match get_typed::<Secret>(self.cluster(), Some(&namespace), name).await {
            Ok(secret) => Some(secret),
            Err(e) => {
                warn!(secret = name, namespace = %namespace, error = %e, "Could not obtain SMTP credentials secret");
                None
            }
        }
    }

    /// Request two Redis caches and a Postgres database, then publish their
    /// connection secrets in the product namespace.
    pub(super) async fn external_datasources(&self, pass: &mut ProductPass) -> PhaseResult {
        let cluster = self.cluster();
        let installation = &pass.installation;

        info!("Reconciling external datastores");
        let backend_redis = reconcile_cloud_resource(
            cluster,
            installation,
            &kinds::redis(),
            &backend_redis_name(),
            ProductName::ThreeScale,
        )
        .await
        .failed_context("failed to reconcile backend redis request")?;
        let system_redis = reconcile_cloud_resource(
            cluster,
            installation,
            &kinds::redis(),
            &system_redis_name(),
            ProductName::ThreeScale,
        )
        .await
        .failed_context("failed to reconcile system redis request")?;
        let postgres = reconcile_cloud_resource(
            cluster,
            installation,
            &kinds::postgres(),
            &postgres_name(installation),
            ProductName::ThreeScale,
        )
        .await
        .failed_context("failed to reconcile postgres request")?;

        for request in [&backend_redis, &system_redis, &postgres] {
            if !is_complete(request) {
                info!(request = %request.name_any(), "Waiting for cloud resource to be provisioned");
                return Ok(StatusPhase::AwaitingComponents);
            }
        }

        let credentials = connection_secret(cluster, &backend_redis)
            .await
            .failed_context("failed to get backend redis credential secret")?;
        reconcile_owned_secret(
            cluster,
            installation,
            pass.namespace(),
            EXTERNAL_BACKEND_REDIS_SECRET_NAME,
            backend_redis_data(&credentials),
        )
        .await
        .failed_context(format!("failed to reconcile {EXTERNAL_BACKEND_REDIS_SECRET_NAME} secret"))?;

        let credentials = connection_secret(cluster, &system_redis)
            .await
            .failed_context("failed to get system redis credential secret")?;
        reconcile_owned_secret(
            cluster,
            installation,
            pass.namespace(),
            EXTERNAL_SYSTEM_REDIS_SECRET_NAME,
            system_redis_data(&credentials),
        )
        .await
        .failed_context(format!("failed to reconcile {EXTERNAL_SYSTEM_REDIS_SECRET_NAME} secret"))?;

        let credentials = connection_secret(cluster, &postgres)
            .await
            .failed_context("failed to get postgres credential secret")?;
        reconcile_owned_secret(
            cluster,
            installation,
            pass.namespace(),
            EXTERNAL_POSTGRES_SECRET_NAME,
            postgres_data(&credentials),
        )
        .await
        .failed_context(format!("failed to reconcile {EXTERNAL_POSTGRES_SECRET_NAME} secret"))?;

        Ok(StatusPhase::Completed)
    }

    /// Request the bucket used for system file storage.
    pub(super) async fn blob_storage(&self, pass: &mut ProductPass) -> PhaseResult {
        let request = reconcile_cloud_resource(
            self.cluster(),
            &pass.installation,
            &kinds::blob_storage(),
            &blob_storage_name(&pass.installation),
            ProductName::ThreeScale,
        )
        .await
        .failed_context("failed to reconcile blob storage request")?;

        if !is_complete(&request) {
            info!(request = %request.name_any(), "Waiting for blob storage to be provisioned");
            return Ok(StatusPhase::AwaitingComponents);
        }
        Ok(StatusPhase::Completed)
    }
}

#[cfg(test)]
#[path = "datasources_tests.rs"]
mod datasources_tests;
