// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! How users and the platform reach 3scale: blackbox monitoring, the OpenShift
//! OAuth client and service discovery, RBAC on routes and the console link.
//! Also keeps a copy of the operator-generated system secrets next to the
//! installation so a recreated product namespace gets the same credentials.

use super::{oauth_client_name, ThreeScaleReconciler, ROUTE_TO_DEVELOPER, ROUTE_TO_MASTER, VERSIONS};
use crate::client::kinds;
use crate::constants::{
    DEDICATED_ADMINS_GROUP, SERVICE_DISCOVERY_KEY, SYSTEM_CONFIG_MAP_NAME,
    THREESCALE_BACKED_UP_SECRETS, THREESCALE_BLACKBOX_ADMIN_PATH, THREESCALE_CONSOLE_LINK_NAME,
    THREESCALE_ROUTE_EDIT_BINDING, THREESCALE_ROUTE_EDIT_ROLE,
};
use crate::crd::{ProductName, StatusPhase};
use crate::errors::{is_conflict, is_not_found};
use crate::labels::add_owner_annotations;
use crate::reconcilers::openshift::{join_url, reconcile_blackbox_target, reconcile_oauth_client};
use crate::reconcilers::phase::{PhaseContext, PhaseError, PhaseResult};
use crate::reconcilers::resources::{create_or_update, create_or_update_typed, delete_if_exists};
use crate::reconcilers::secrets::copy_secret;
use crate::reconcilers::ProductPass;
use anyhow::anyhow;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use kube::ResourceExt;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

const BLACKBOX_ADMIN_UI: &str = "integreatly-3scale-admin-ui";
const BLACKBOX_DEVELOPER: &str = "integreatly-3scale-system-developer";
const BLACKBOX_MASTER: &str = "integreatly-3scale-system-master";

/// Host prefix of the developer portal route
const DEVELOPER_HOST_PREFIX: &str = "3scale.";

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

const CONSOLE_LINK_SECTION: &str = "OpenShift Managed Services";
const CONSOLE_LINK_TEXT: &str = "API Management";
const CONSOLE_LINK_ICON: &str = "data:image/svg+xml;base64,PHN2ZyB4bWxucz0iaHR0cDovL3d3dy53My5vcmcvMjAwMC9zdmciIHZpZXdCb3g9IjAgMCAxNiAxNiI+PGNpcmNsZSBjeD0iOCIgY3k9IjgiIHI9IjciIGZpbGw9IiNlZTAwMDAiLz48L3N2Zz4=";

/// Body of `service_discovery.yml` in the `system` ConfigMap.
pub(super) fn service_discovery_config(client_id: &str, client_secret: &str) -> String {
    format!(
        "production:\n  enabled: true\n  authentication_method: oauth\n  oauth_server_type: builtin\n  client_id: '{client_id}'\n  client_secret: '{client_secret}'\n"
    )
}

/// Spec of the application menu entry pointing at the admin portal.
pub(super) fn console_link_spec(host: &str) -> Value {
    json!({
        "applicationMenu": {
            "imageURL": CONSOLE_LINK_ICON,
            "section": CONSOLE_LINK_SECTION,
        },
        "href": format!("{host}/auth/rhsso/bounce"),
        "text": CONSOLE_LINK_TEXT,
        "location": "ApplicationMenu",
    })
}

fn route_edit_rules() -> Vec<PolicyRule> {
    vec![PolicyRule {
        api_groups: Some(vec!["route.openshift.io".to_string()]),
        resources: Some(vec!["routes".to_string()]),
        verbs: ["get", "update", "list", "watch", "patch"]
            .iter()
            .map(ToString::to_string)
            .collect(),
        ..Default::default()
    }]
}

impl ThreeScaleReconciler {
    /// Restore backed up system secrets into the product namespace.
    ///
    /// A backup overwrites the product namespace secret of the same name. A
    /// missing backup (first install) is skipped.
    pub(super) async fn restore_system_secrets(&self, pass: &mut ProductPass) -> PhaseResult {
        let backup_ns = pass.installation.namespace().unwrap_or_default();
        for name in THREESCALE_BACKED_UP_SECRETS {
            match copy_secret(self.cluster(), &backup_ns, name, pass.namespace(), name).await {
                Ok(result) => debug!(secret = name, result = %result, "Restored system secret"),
                Err(e) if is_not_found(&e) || is_conflict(&e) => {
                    debug!(secret = name, "No system secret backup to restore");
                }
                Err(e) => return Err(PhaseError::failed(e.context(format!("failed to restore secret {name}")))),
            }
        }
        Ok(StatusPhase::Completed)
    }

    /// Copy the system secrets out of the product namespace.
    pub(super) async fn backup_system_secrets(&self, pass: &mut ProductPass) -> PhaseResult {
        let backup_ns = pass.installation.namespace().unwrap_or_default();
        for name in THREESCALE_BACKED_UP_SECRETS {
            copy_secret(self.cluster(), pass.namespace(), name, &backup_ns, name)
                .await
                .failed_context(format!("failed to back up secret {name}"))?;
        }
        Ok(StatusPhase::Completed)
    }

    /// Register blackbox targets for the admin, developer and master portals.
    pub(super) async fn blackbox_targets(&self, pass: &mut ProductPass) -> PhaseResult {
        let monitoring = self
            .ctx
            .config
            .read(ProductName::Monitoring)
            .await
            .in_progress_context("error reading monitoring config")?;
        if monitoring.namespace.is_empty() {
            return Err(PhaseError::in_progress(anyhow!(
                "monitoring namespace is not known yet"
            )));
        }
        let namespace = monitoring.namespace.as_str();

        let admin_path = if pass.config.blackbox_target_path.is_empty() {
            THREESCALE_BLACKBOX_ADMIN_PATH
        } else {
            pass.config.blackbox_target_path.as_str()
        };
        reconcile_blackbox_target(
            self.cluster(),
            &pass.installation,
            namespace,
            BLACKBOX_ADMIN_UI,
            &join_url(&pass.config.host, admin_path),
            "3scale-admin-ui",
        )
        .await
        .in_progress_context("error creating threescale blackbox target")?;

        let developer = self
            .zync_route_host(pass, ROUTE_TO_DEVELOPER, DEVELOPER_HOST_PREFIX)
            .await
            .in_progress_context("error getting threescale system-developer route")?
            .ok_or_else(|| PhaseError::in_progress(anyhow!("threescale system-developer route not found")))?;
        reconcile_blackbox_target(
            self.cluster(),
            &pass.installation,
            namespace,
            BLACKBOX_DEVELOPER,
            &format!("https://{developer}"),
            "3scale-developer-console-ui",
        )
        .await
        .in_progress_context("error creating threescale blackbox target (system-developer)")?;

        let master = self
            .zync_route_host(pass, ROUTE_TO_MASTER, "")
            .await
            .in_progress_context("error getting threescale system-master route")?
            .ok_or_else(|| PhaseError::in_progress(anyhow!("threescale system-master route not found")))?;
        reconcile_blackbox_target(
            self.cluster(),
            &pass.installation,
            namespace,
            BLACKBOX_MASTER,
            &format!("https://{master}"),
            "3scale-system-admin-ui",
        )
        .await
        .in_progress_context("error creating threescale blackbox target (system-master)")?;

        Ok(StatusPhase::Completed)
    }

    /// Register the OpenShift OAuth client used to sign in to the master portal.
    pub(super) async fn oauth_client(&self, pass: &mut ProductPass) -> PhaseResult {
        let secret = self
            .oauth_client_secret()
            .await
            .failed_context("failed to get oauth client secret")?;
        let Some(master) = self
            .zync_route_host(pass, ROUTE_TO_MASTER, "")
            .await
            .failed_context("failed to get threescale system-master route")?
        else {
            info!("Waiting for the system-master route");
            return Ok(StatusPhase::InProgress);
        };

        reconcile_oauth_client(
            self.cluster(),
            &pass.installation,
            &oauth_client_name(&pass.installation),
            &secret,
            vec![format!("https://{master}")],
        )
        .await
        .failed_context("failed to reconcile 3scale oauth client")?;
        Ok(StatusPhase::Completed)
    }

    /// Point 3scale service discovery at the OpenShift OAuth server.
    ///
    /// A changed configuration restarts the system deployments.
    pub(super) async fn service_discovery(&self, pass: &mut ProductPass) -> PhaseResult {
        if pass.config.product_version != VERSIONS.product
            || pass.config.operator_version != VERSIONS.operator
        {
            pass.config.product_version = VERSIONS.product.to_string();
            pass.config.operator_version = VERSIONS.operator.to_string();
            self.ctx
                .config
                .write(ProductName::ThreeScale, &pass.config)
                .await
                .failed_context("failed to persist 3scale versions")?;
        }

        let secret = self
            .oauth_client_secret()
            .await
            .in_progress_context("failed to get oauth client secret")?;
        let config = service_discovery_config(&oauth_client_name(&pass.installation), &secret);
        let (_, result) = create_or_update_typed::<ConfigMap, _>(
            self.cluster(),
            Some(pass.namespace()),
            SYSTEM_CONFIG_MAP_NAME,
            |mut system| {
                system
                    .data
                    .get_or_insert_with(BTreeMap::new)
                    .insert(SERVICE_DISCOVERY_KEY.to_string(), config);
                Ok(system)
            },
        )
        .await
        .in_progress_context("failed to update service discovery configuration")?;

        if result.changed() {
            self.rollout_system(pass)
                .await
                .in_progress_context("failed to roll out system after service discovery change")?;
        }
        Ok(StatusPhase::Completed)
    }

    /// Let dedicated admins edit the routes of the product namespace.
    pub(super) async fn route_edit_role(&self, pass: &mut ProductPass) -> PhaseResult {
        create_or_update_typed::<Role, _>(
            self.cluster(),
            Some(pass.namespace()),
            THREESCALE_ROUTE_EDIT_ROLE,
            |mut role| {
                add_owner_annotations(&mut role.metadata, &pass.installation);
                role.rules = Some(route_edit_rules());
                Ok(role)
            },
        )
        .await
        .failed_context("failed to reconcile 3scale route edit role")?;

        create_or_update_typed::<RoleBinding, _>(
            self.cluster(),
            Some(pass.namespace()),
            THREESCALE_ROUTE_EDIT_BINDING,
            |mut binding| {
                add_owner_annotations(&mut binding.metadata, &pass.installation);
                binding.role_ref = RoleRef {
                    api_group: RBAC_API_GROUP.to_string(),
                    kind: "Role".to_string(),
                    name: THREESCALE_ROUTE_EDIT_ROLE.to_string(),
                };
                binding.subjects = Some(vec![Subject {
                    api_group: Some(RBAC_API_GROUP.to_string()),
                    kind: "Group".to_string(),
                    name: DEDICATED_ADMINS_GROUP.to_string(),
                    ..Default::default()
                }]);
                Ok(binding)
            },
        )
        .await
        .failed_context("failed to reconcile 3scale route edit role binding")?;
        Ok(StatusPhase::Completed)
    }

    /// Add the admin portal to the console application menu.
    pub(super) async fn console_link(&self, pass: &mut ProductPass) -> PhaseResult {
        if pass.config.host.is_empty() {
            info!("3scale admin host is not known yet, skipping console link");
            return Ok(StatusPhase::InProgress);
        }
        create_or_update(
            self.cluster(),
            &kinds::console_link(),
            None,
            THREESCALE_CONSOLE_LINK_NAME,
            |mut link| {
                link.data["spec"] = console_link_spec(&pass.config.host);
                Ok(link)
            },
        )
        .await
        .failed_context("error creating or updating 3scale console link")?;
        Ok(StatusPhase::Completed)
    }

    pub(super) async fn remove_oauth_client(&self, pass: &mut ProductPass) -> PhaseResult {
        crate::reconcilers::openshift::remove_oauth_client(
            self.cluster(),
            &oauth_client_name(&pass.installation),
        )
        .await
        .failed_context("failed to remove 3scale oauth client")?;
        Ok(StatusPhase::Completed)
    }

    pub(super) async fn remove_console_link(&self, _pass: &mut ProductPass) -> PhaseResult {
        delete_if_exists(
            self.cluster(),
            &kinds::console_link(),
            None,
            THREESCALE_CONSOLE_LINK_NAME,
        )
        .await
        .failed_context("error removing 3scale console link")?;
        Ok(StatusPhase::Completed)
    }
}

#[cfg(test)]
#[path = "access_tests.rs"]
mod access_tests;
