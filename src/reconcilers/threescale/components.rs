// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The `APIManager` and the routes it exposes.

use super::datasources::blob_storage_name;
use super::{ThreeScaleReconciler, ROUTE_TO_PROVIDER};
use crate::client::{kinds, object_at};
use crate::constants::{
    API_MANAGER_NAME, S3_CREDENTIALS_SECRET_NAME, SYSTEM_SIDEKIQ_NAME, THREESCALE_EXPECTED_ROUTES,
    THREESCALE_MIN_REPLICAS, THREESCALE_ROUTE_SYNC_COMMAND,
};
use crate::crd::{Installation, InstallationType, ProductName, StatusPhase};
use crate::labels::{add_owner_annotations, DEPLOYMENT_CONFIG_LABEL};
use crate::reconcilers::cloud_resources::connection_secret;
use crate::reconcilers::openshift::find_running_pod;
use crate::reconcilers::phase::{PhaseContext, PhaseResult};
use crate::reconcilers::resources::create_or_update;
use crate::reconcilers::secrets::reconcile_owned_secret;
use crate::reconcilers::ProductPass;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::DynamicObject;
use kube::ResourceExt;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::info;

/// Host prefix of the admin portal route
pub(super) const ADMIN_HOST_PREFIX: &str = "3scale-admin.";

/// Components whose replica count is kept at or above the minimum.
const SCALED_COMPONENTS: [[&str; 2]; 9] = [
    ["system", "appSpec"],
    ["system", "sidekiqSpec"],
    ["apicast", "productionSpec"],
    ["apicast", "stagingSpec"],
    ["backend", "listenerSpec"],
    ["backend", "workerSpec"],
    ["backend", "cronSpec"],
    ["zync", "appSpec"],
    ["zync", "queSpec"],
];

/// Map the blob storage connection secret to the AWS keys 3scale expects.
///
/// Unknown keys are copied as-is; in-cluster object stores add their own.
pub(super) fn s3_credentials_data(blob_storage: &Secret) -> BTreeMap<String, ByteString> {
    blob_storage
        .data
        .iter()
        .flatten()
        .map(|(key, value)| {
            let key = match key.as_str() {
                "credentialKeyID" => "AWS_ACCESS_KEY_ID",
                "credentialSecretKey" => "AWS_SECRET_ACCESS_KEY",
                "bucketName" => "AWS_BUCKET",
                "bucketRegion" => "AWS_REGION",
                other => other,
            };
            (key.to_string(), value.clone())
        })
        .collect()
}

/// Apply the managed fields of the `APIManager` spec onto `apim`.
///
/// Replica counts below the minimum are raised; higher counts set by an
/// administrator are kept.
pub(super) fn apply_api_manager_spec(apim: &mut DynamicObject, installation: &Installation) {
    let spec = object_at(&mut apim.data, &["spec"]);
    spec["highAvailability"] = json!({"enabled": true});
    spec["podDisruptionBudget"] = json!({"enabled": true});
    spec["resourceRequirementsEnabled"] =
        json!(installation.spec.r#type != InstallationType::Workshop);
    spec["wildcardDomain"] = json!(installation.spec.routing_subdomain);
    object_at(spec, &["system", "database", "postgresql"]);
    object_at(spec, &["system"])["fileStorage"] = json!({
        "simpleStorageService": {
            "configurationSecretRef": {"name": S3_CREDENTIALS_SECRET_NAME},
        },
    });

    for path in SCALED_COMPONENTS {
        let component = object_at(spec, &path);
        let replicas = component["replicas"].as_i64().unwrap_or(0);
        if replicas < THREESCALE_MIN_REPLICAS {
            component["replicas"] = json!(THREESCALE_MIN_REPLICAS);
        }
    }
}

/// True when the 3scale operator reports every deployment ready.
pub(super) fn deployments_ready(apim: &DynamicObject) -> bool {
    let deployments = &apim.data["status"]["deployments"];
    let count = |state: &str| deployments[state].as_array().map_or(0, Vec::len);
    count("starting") == 0 && count("stopped") == 0 && count("ready") > 0
}

impl ThreeScaleReconciler {
    /// Publish the blob storage credentials as `s3-credentials`.
    pub(super) async fn s3_credentials(&self, pass: &mut ProductPass) -> PhaseResult {
        let namespace = pass.installation.namespace().unwrap_or_default();
        let request = self
            .cluster()
            .get(
                &kinds::blob_storage(),
                Some(&namespace),
                &blob_storage_name(&pass.installation),
            )
            .await
            .failed_context("failed to get blob storage custom resource")?;
        let blob_storage = connection_secret(self.cluster(), &request)
            .await
            .failed_context("failed to get blob storage connection secret")?;

        reconcile_owned_secret(
            self.cluster(),
            &pass.installation,
            pass.namespace(),
            S3_CREDENTIALS_SECRET_NAME,
            s3_credentials_data(&blob_storage),
        )
        .await
        .failed_context("failed to create or update blob storage aws credentials secret")?;
        Ok(StatusPhase::Completed)
    }

    /// Assert the `APIManager` and wait for its deployments, then record the
    /// admin portal host.
    pub(super) async fn api_manager(&self, pass: &mut ProductPass) -> PhaseResult {
        let (apim, _) = create_or_update(
            self.cluster(),
            &kinds::api_manager(),
            Some(pass.namespace()),
            API_MANAGER_NAME,
            |mut apim| {
                add_owner_annotations(&mut apim.metadata, &pass.installation);
                apply_api_manager_spec(&mut apim, &pass.installation);
                Ok(apim)
            },
        )
        .await
        .failed_context("failed to reconcile APIManager")?;

        if !deployments_ready(&apim) {
            info!(namespace = %pass.namespace(), "Waiting for 3scale deployments to be ready");
            return Ok(StatusPhase::InProgress);
        }

        let host = self
            .zync_route_host(pass, ROUTE_TO_PROVIDER, ADMIN_HOST_PREFIX)
            .await
            .failed_context("failed to get 3scale admin route")?;
        if let Some(host) = host {
            pass.config.host = format!("https://{host}");
            self.ctx
                .config
                .write(ProductName::ThreeScale, &pass.config)
                .await
                .failed_context("failed to persist 3scale host")?;
        }
        Ok(StatusPhase::Completed)
    }

    /// Make sure zync created every route, resyncing them when some are missing.
    ///
    /// Routes go missing after a restore or when the product namespace was
    /// recreated; zync only recreates them when asked to.
    pub(super) async fn routes(&self, pass: &mut ProductPass) -> PhaseResult {
        let routes = self
            .cluster()
            .list(&kinds::route(), Some(pass.namespace()), None)
            .await
            .failed_context("failed to list 3scale routes")?;
        if routes.len() >= THREESCALE_EXPECTED_ROUTES {
            return Ok(StatusPhase::Completed);
        }

        let selector = format!("{DEPLOYMENT_CONFIG_LABEL}={SYSTEM_SIDEKIQ_NAME}");
        let Some(pod) = find_running_pod(self.cluster(), pass.namespace(), &selector)
            .await
            .failed_context("failed to list system-sidekiq pods")?
        else {
            info!("Waiting on system-sidekiq pod to start before resyncing routes");
            return Ok(StatusPhase::InProgress);
        };

        let command: Vec<String> = THREESCALE_ROUTE_SYNC_COMMAND
            .iter()
            .map(ToString::to_string)
            .collect();
        let output = self
            .cluster()
            .exec(pass.namespace(), &pod, &command)
            .await
            .failed_context("failed to resync 3scale routes")?;
        info!(pod = %pod, routes = routes.len(), output = %output.trim(), "Resynced 3scale routes");
        Ok(StatusPhase::InProgress)
    }
}

#[cfg(test)]
#[path = "components_tests.rs"]
mod components_tests;
