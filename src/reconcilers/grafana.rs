// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Grafana (customer monitoring) reconciler.
//!
//! Grafana runs in the operator namespace behind an OpenShift OAuth proxy
//! sidecar. The reconciler subscribes to the Grafana operator, asserts the
//! proxy session secret and the `Grafana` custom resource, then reads the route
//! the Grafana operator creates to publish the product host.

use crate::client::kinds;
use crate::config::read_resolved;
use crate::constants::{
    GRAFANA_CR_NAME, GRAFANA_DEFAULT_NAMESPACE, GRAFANA_OPERATOR_VERSION, GRAFANA_PACKAGE,
    GRAFANA_PROXY_SECRET_NAME, GRAFANA_ROUTE_NAME, GRAFANA_SESSION_SECRET_BYTES, GRAFANA_VERSION,
};
use crate::context::Context;
use crate::crd::{Installation, ProductName, ProductStatus, StatusPhase};
use crate::labels::add_owner_annotations;
use crate::reconcilers::marketplace::SubscriptionTarget;
use crate::reconcilers::namespaces::{reconcile_namespace, remove_namespace};
use crate::reconcilers::openshift::route_host;
use crate::reconcilers::phase::{PhaseContext, PhaseResult, Step};
use crate::reconcilers::resources::{create_or_update, create_or_update_typed};
use crate::reconcilers::secrets::generate_password;
use crate::reconcilers::{reconcile_product, ProductPass, ProductReconciler, ProductVersions};
use crate::version::verify_product_and_operator_version;
use async_trait::async_trait;
use futures::FutureExt;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

const SESSION_SECRET_KEY: &str = "session_secret";
const PROXY_IMAGE: &str = "quay.io/openshift/origin-oauth-proxy:4.2";
const PROXY_PORT: i32 = 9091;
const PROXY_PORT_NAME: &str = "grafana-proxy";
const TLS_SECRET_NAME: &str = "grafana-k8s-tls";

const VERSIONS: ProductVersions = ProductVersions {
    product: GRAFANA_VERSION,
    operator: GRAFANA_OPERATOR_VERSION,
};

/// Installs Grafana for customer monitoring.
pub struct GrafanaReconciler {
    ctx: Arc<Context>,
}

impl GrafanaReconciler {
    #[must_use]
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    fn teardown_steps() -> [Step<Self, ProductPass>; 2] {
        [
            Step::new("remove product namespace", |r, pass| {
                r.remove_product_namespace(pass).boxed()
            }),
            Step::new("remove operator namespace", |r, pass| {
                r.remove_operator_namespace(pass).boxed()
            }),
        ]
    }

    fn forward_steps() -> [Step<Self, ProductPass>; 7] {
        [
            Step::new("operator namespace", |r, pass| r.operator_namespace(pass).boxed()),
            Step::new("product namespace", |r, pass| r.product_namespace(pass).boxed()),
            Step::new("proxy secret", |r, pass| r.proxy_secret(pass).boxed()),
            Step::new("subscription", |r, pass| r.subscription(pass).boxed()),
            Step::new("grafana", |r, pass| r.grafana(pass).boxed()),
            Step::new("host", |r, pass| r.host(pass).boxed()),
            Step::new("version", |r, pass| r.version(pass).boxed()),
        ]
    }

    async fn remove_product_namespace(&self, pass: &mut ProductPass) -> PhaseResult {
        remove_namespace(self.ctx.cluster.as_ref(), pass.namespace()).await
    }

    async fn remove_operator_namespace(&self, pass: &mut ProductPass) -> PhaseResult {
        remove_namespace(self.ctx.cluster.as_ref(), pass.operator_namespace()).await
    }

    async fn operator_namespace(&self, pass: &mut ProductPass) -> PhaseResult {
        reconcile_namespace(
            self.ctx.cluster.as_ref(),
            pass.operator_namespace(),
            &pass.installation,
        )
        .await
    }

    async fn product_namespace(&self, pass: &mut ProductPass) -> PhaseResult {
        reconcile_namespace(self.ctx.cluster.as_ref(), pass.namespace(), &pass.installation).await
    }

    /// Session secret of the OAuth proxy. Generated once and kept afterwards.
    async fn proxy_secret(&self, pass: &mut ProductPass) -> PhaseResult {
        create_or_update_typed::<Secret, _>(
            self.ctx.cluster.as_ref(),
            Some(pass.operator_namespace()),
            GRAFANA_PROXY_SECRET_NAME,
            |mut secret| {
                add_owner_annotations(&mut secret.metadata, &pass.installation);
                secret
                    .data
                    .get_or_insert_with(Default::default)
                    .entry(SESSION_SECRET_KEY.to_string())
                    .or_insert_with(|| {
                        ByteString(generate_password(GRAFANA_SESSION_SECRET_BYTES).into_bytes())
                    });
                Ok(secret)
            },
        )
        .await
        .failed_context("failed to reconcile grafana proxy secret")?;
        Ok(StatusPhase::Completed)
    }

    async fn subscription(&self, pass: &mut ProductPass) -> PhaseResult {
        let target = SubscriptionTarget::new(GRAFANA_PACKAGE, pass.operator_namespace());
        self.ctx
            .marketplace
            .reconcile_subscription(&target, &[pass.namespace().to_string()])
            .await
            .failed_context(format!("failed to reconcile subscription {GRAFANA_PACKAGE}"))
    }

    async fn grafana(&self, pass: &mut ProductPass) -> PhaseResult {
        create_or_update(
            self.ctx.cluster.as_ref(),
            &kinds::grafana(),
            Some(pass.operator_namespace()),
            GRAFANA_CR_NAME,
            |mut grafana| {
                add_owner_annotations(&mut grafana.metadata, &pass.installation);
                grafana.data["spec"] = grafana_spec();
                Ok(grafana)
            },
        )
        .await
        .failed_context("failed to reconcile grafana custom resource")?;
        Ok(StatusPhase::Completed)
    }

    /// Publish the host of the route the Grafana operator creates.
    async fn host(&self, pass: &mut ProductPass) -> PhaseResult {
        let Some(host) = route_host(
            self.ctx.cluster.as_ref(),
            pass.operator_namespace(),
            GRAFANA_ROUTE_NAME,
        )
        .await
        .failed_context("failed to get grafana route")?
        else {
            info!(route = GRAFANA_ROUTE_NAME, "Waiting for grafana route");
            return Ok(StatusPhase::InProgress);
        };

        pass.config.host = format!("https://{host}");
        self.ctx
            .config
            .write(ProductName::Grafana, &pass.config)
            .await
            .failed_context("failed to persist grafana host")?;
        Ok(StatusPhase::Completed)
    }

    async fn version(&self, pass: &mut ProductPass) -> PhaseResult {
        pass.config.product_version = GRAFANA_VERSION.to_string();
        pass.config.operator_version = GRAFANA_OPERATOR_VERSION.to_string();
        self.ctx
            .config
            .write(ProductName::Grafana, &pass.config)
            .await
            .failed_context("failed to persist grafana version")?;
        Ok(StatusPhase::Completed)
    }
}

/// Desired spec of the `Grafana` custom resource.
fn grafana_spec() -> Value {
    let redirect_reference = json!({
        "kind": "OAuthRedirectReference",
        "apiVersion": "v1",
        "reference": {"kind": "Route", "name": GRAFANA_ROUTE_NAME},
    });
    json!({
        "config": {
            "log": {"mode": "console", "level": "warn"},
            "auth": {"disable_login_form": false, "disable_signout_menu": true},
            "auth.basic": {"enabled": true},
            "auth.anonymous": {"enabled": true},
        },
        "containers": [{
            "name": PROXY_PORT_NAME,
            "image": PROXY_IMAGE,
            "args": [
                "-provider=openshift",
                "-pass-basic-auth=false",
                format!("-https-address=:{PROXY_PORT}"),
                "-http-address=",
                "-email-domain=*",
                "-upstream=http://localhost:3000",
                r#"-openshift-sar={"resource":"namespaces","verb":"get"}"#,
                r#"-openshift-delegate-urls={"/":{"resource":"namespaces","verb":"get"}}"#,
                "-tls-cert=/etc/tls/private/tls.crt",
                "-tls-key=/etc/tls/private/tls.key",
                "-client-secret-file=/var/run/secrets/kubernetes.io/serviceaccount/token",
                format!("-cookie-secret-file=/etc/proxy/secrets/{SESSION_SECRET_KEY}"),
                "-openshift-service-account=grafana-serviceaccount",
                "-openshift-ca=/etc/pki/tls/cert.pem",
                "-openshift-ca=/var/run/secrets/kubernetes.io/serviceaccount/ca.crt",
                "-skip-auth-regex=^/metrics",
            ],
            "ports": [{"containerPort": PROXY_PORT, "name": PROXY_PORT_NAME}],
            "volumeMounts": [
                {"mountPath": "/etc/tls/private", "name": format!("secret-{TLS_SECRET_NAME}")},
                {"mountPath": "/etc/proxy/secrets", "name": format!("secret-{GRAFANA_PROXY_SECRET_NAME}")},
            ],
        }],
        "secrets": [TLS_SECRET_NAME, GRAFANA_PROXY_SECRET_NAME],
        "service": {
            "ports": [{"name": PROXY_PORT_NAME, "port": PROXY_PORT, "protocol": "TCP"}],
            "annotations": {"service.alpha.openshift.io/serving-cert-secret-name": TLS_SECRET_NAME},
        },
        "ingress": {"enabled": true, "targetPort": PROXY_PORT_NAME, "termination": "reencrypt"},
        "client": {"preferService": true},
        "compat": {"fixAnnotations": true},
        "serviceAccount": {
            "annotations": {
                "serviceaccounts.openshift.io/oauth-redirectreference.primary": redirect_reference.to_string(),
            },
        },
    })
}

#[async_trait]
impl ProductReconciler for GrafanaReconciler {
    fn product(&self) -> ProductName {
        ProductName::Grafana
    }

    fn verify_version(&self, status: &ProductStatus) -> bool {
        verify_product_and_operator_version(status, GRAFANA_VERSION, GRAFANA_OPERATOR_VERSION)
    }

    async fn reconcile(&self, installation: &Installation, status: &mut ProductStatus) -> PhaseResult {
        let config = read_resolved(
            self.ctx.config.as_ref(),
            installation,
            ProductName::Grafana,
            GRAFANA_DEFAULT_NAMESPACE,
        )
        .await
        .failed_context("failed to read grafana configuration")?;
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
#[path = "grafana_tests.rs"]
mod grafana_tests;
