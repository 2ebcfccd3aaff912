// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! 3scale (API management) reconciler.
//!
//! 3scale is deployed by its own operator from an `APIManager` custom resource.
//! Its datastores are provisioned through cloud resource requests; this
//! reconciler turns their connection secrets into the secrets the `APIManager`
//! expects, then wires the running product into the identity provider, the
//! platform's users, monitoring and the OpenShift console.
//!
//! The steps are grouped by concern:
//!
//! - `datasources` - SMTP settings, Redis, Postgres and blob storage requests
//! - `components` - S3 credentials, the `APIManager` and its routes
//! - `identity` - identity provider client, authentication provider and user sync
//! - `access` - blackbox targets, OAuth client, service discovery, secret
//!   backups, RBAC and the console link

mod access;
mod components;
mod datasources;
mod identity;

use crate::client::{get_typed, ClusterClient};
use crate::config::read_resolved;
use crate::constants::{
    SYSTEM_SEED_SECRET_NAME, THREESCALE_DEFAULT_NAMESPACE, THREESCALE_OPERATOR_VERSION,
    THREESCALE_PACKAGE, THREESCALE_REGISTRY_SECRET_NAME, THREESCALE_ROLLOUT_DEPLOYMENTS,
    THREESCALE_VERSION,
};
use crate::context::Context;
use crate::crd::{Installation, ProductName, ProductStatus, StatusPhase};
use crate::labels::ZYNC_ROUTE_TO_LABEL;
use crate::reconcilers::marketplace::SubscriptionTarget;
use crate::reconcilers::namespaces::{reconcile_namespace, remove_namespace};
use crate::reconcilers::openshift::{find_route_host, rollout_deployment_config};
use crate::reconcilers::phase::{PhaseContext, PhaseResult, Step};
use crate::reconcilers::secrets::{copy_pull_secret, secret_value};
use crate::reconcilers::{reconcile_product, ProductPass, ProductReconciler, ProductVersions};
use crate::threescale::ThreeScaleApi;
use crate::version::verify_product_and_operator_version;
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use futures::FutureExt;
use k8s_openapi::api::core::v1::Secret;
use std::sync::Arc;

/// Zync route target of the admin portal
const ROUTE_TO_PROVIDER: &str = "system-provider";
/// Zync route target of the developer portal
const ROUTE_TO_DEVELOPER: &str = "system-developer";
/// Zync route target of the master portal
const ROUTE_TO_MASTER: &str = "system-master";

const ADMIN_ACCESS_TOKEN_KEY: &str = "ADMIN_ACCESS_TOKEN";
const ADMIN_USER_KEY: &str = "ADMIN_USER";

const VERSIONS: ProductVersions = ProductVersions {
    product: THREESCALE_VERSION,
    operator: THREESCALE_OPERATOR_VERSION,
};

/// Installs 3scale API management.
pub struct ThreeScaleReconciler {
    ctx: Arc<Context>,
}

impl ThreeScaleReconciler {
    #[must_use]
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    fn teardown_steps() -> [Step<Self, ProductPass>; 4] {
        [
            Step::new("remove product namespace", |r, pass| {
                r.remove_product_namespace(pass).boxed()
            }),
            Step::new("remove operator namespace", |r, pass| {
                r.remove_operator_namespace(pass).boxed()
            }),
            Step::new("remove oauth client", |r, pass| r.remove_oauth_client(pass).boxed()),
            Step::new("remove console link", |r, pass| r.remove_console_link(pass).boxed()),
        ]
    }

    fn forward_steps() -> [Step<Self, ProductPass>; 19] {
        [
            Step::new("operator namespace", |r, pass| r.operator_namespace(pass).boxed()),
            Step::new("product namespace", |r, pass| r.product_namespace(pass).boxed()),
            Step::new("restore system secrets", |r, pass| {
                r.restore_system_secrets(pass).boxed()
            }),
            Step::new("pull secret", |r, pass| r.pull_secret(pass).boxed()),
            Step::new("subscription", |r, pass| r.subscription(pass).boxed()),
            Step::new("smtp credentials", |r, pass| r.smtp_credentials(pass).boxed()),
            Step::new("external datasources", |r, pass| {
                r.external_datasources(pass).boxed()
            }),
            Step::new("blob storage", |r, pass| r.blob_storage(pass).boxed()),
            Step::new("s3 credentials", |r, pass| r.s3_credentials(pass).boxed()),
            Step::new("api manager", |r, pass| r.api_manager(pass).boxed()),
            Step::new("routes", |r, pass| r.routes(pass).boxed()),
            Step::new("identity integration", |r, pass| {
                r.identity_integration(pass).boxed()
            }),
            Step::new("blackbox targets", |r, pass| r.blackbox_targets(pass).boxed()),
            Step::new("user sync", |r, pass| r.sync_users(pass).boxed()),
            Step::new("oauth client", |r, pass| r.oauth_client(pass).boxed()),
            Step::new("service discovery", |r, pass| r.service_discovery(pass).boxed()),
            Step::new("backup system secrets", |r, pass| {
                r.backup_system_secrets(pass).boxed()
            }),
            Step::new("route edit role", |r, pass| r.route_edit_role(pass).boxed()),
            Step::new("console link", |r, pass| r.console_link(pass).boxed()),
        ]
    }

    async fn remove_product_namespace(&self, pass: &mut ProductPass) -> PhaseResult {
        remove_namespace(self.cluster(), pass.namespace()).await
    }

    async fn remove_operator_namespace(&self, pass: &mut ProductPass) -> PhaseResult {
        remove_namespace(self.cluster(), pass.operator_namespace()).await
    }

    async fn operator_namespace(&self, pass: &mut ProductPass) -> PhaseResult {
        reconcile_namespace(self.cluster(), pass.operator_namespace(), &pass.installation).await
    }

    async fn product_namespace(&self, pass: &mut ProductPass) -> PhaseResult {
        reconcile_namespace(self.cluster(), pass.namespace(), &pass.installation).await
    }

    async fn pull_secret(&self, pass: &mut ProductPass) -> PhaseResult {
        copy_pull_secret(
            self.cluster(),
            &pass.installation,
            pass.namespace(),
            THREESCALE_REGISTRY_SECRET_NAME,
        )
        .await
        .failed_context("failed to reconcile pull secret")?;
        Ok(StatusPhase::Completed)
    }

    async fn subscription(&self, pass: &mut ProductPass) -> PhaseResult {
        let target = SubscriptionTarget::new(THREESCALE_PACKAGE, pass.operator_namespace());
        self.ctx
            .marketplace
            .reconcile_subscription(&target, &[pass.namespace().to_string()])
            .await
            .failed_context(format!("failed to reconcile subscription {THREESCALE_PACKAGE}"))
    }

    fn cluster(&self) -> &dyn ClusterClient {
        self.ctx.cluster.as_ref()
    }

    /// Admin API client of the installation's admin portal.
    fn api(&self, installation: &Installation) -> Arc<dyn ThreeScaleApi> {
        (self.ctx.threescale)(installation)
    }

    /// The `system-seed` secret the 3scale operator generates.
    async fn seed_secret(&self, pass: &ProductPass) -> Result<Secret> {
        get_typed(self.cluster(), Some(pass.namespace()), SYSTEM_SEED_SECRET_NAME)
            .await
            .with_context(|| format!("failed to get secret {SYSTEM_SEED_SECRET_NAME}"))
    }

    /// Client secret shared by the identity client, the OAuth client and service discovery.
    async fn oauth_client_secret(&self) -> Result<String> {
        let name = self.ctx.config.oauth_client_secrets_name();
        let secret: Secret = get_typed(
            self.cluster(),
            Some(self.ctx.config.operator_namespace()),
            name,
        )
        .await
        .with_context(|| format!("could not find {name} secret"))?;
        secret_value(&secret, ProductName::ThreeScale.as_str())
    }

    /// Host of the first route zync created for `target` whose host starts with `prefix`.
    async fn zync_route_host(
        &self,
        pass: &ProductPass,
        target: &str,
        prefix: &str,
    ) -> Result<Option<String>> {
        find_route_host(
            self.cluster(),
            pass.namespace(),
            &format!("{ZYNC_ROUTE_TO_LABEL}={target}"),
            prefix,
        )
        .await
    }

    /// Restart the system deployments so they pick up changed configuration.
    async fn rollout_system(&self, pass: &ProductPass) -> Result<()> {
        for name in THREESCALE_ROLLOUT_DEPLOYMENTS {
            rollout_deployment_config(self.cluster(), pass.namespace(), name).await?;
        }
        Ok(())
    }
}

/// Name of the cluster-scoped `OAuthClient` of 3scale.
fn oauth_client_name(installation: &Installation) -> String {
    format!(
        "{}{}",
        installation.spec.namespace_prefix,
        ProductName::ThreeScale.as_str()
    )
}

#[async_trait]
impl ProductReconciler for ThreeScaleReconciler {
    fn product(&self) -> ProductName {
        ProductName::ThreeScale
    }

    fn verify_version(&self, status: &ProductStatus) -> bool {
        verify_product_and_operator_version(status, THREESCALE_VERSION, THREESCALE_OPERATOR_VERSION)
    }

    async fn reconcile(&self, installation: &Installation, status: &mut ProductStatus) -> PhaseResult {
        let config = read_resolved(
            self.ctx.config.as_ref(),
            installation,
            ProductName::ThreeScale,
            THREESCALE_DEFAULT_NAMESPACE,
        )
        .await
        .failed_context("failed to read 3scale configuration")?;
        let mut pass = ProductPass::new(installation, config);

        reconcile_product(
            &self.ctx,
            self,
            &mut pass,
            &Self::teardown_steps(),
            &Self::forward_steps(),
            status,
            VERSIONS,
        )
        .await
    }
}


#[cfg(test)]
#[path = "test_helpers.rs"]
mod test_helpers;
