// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Identity provider integration and user synchronization.
//!
//! 3scale signs users in through the identity provider's realm. Users that exist
//! in the realm are mirrored into the admin portal; portal users that no longer
//! exist in the realm are removed, except the seed admin the 3scale operator
//! created. Members of the dedicated admins group, and every user of a workshop
//! install, are promoted to portal admins.

use super::{ThreeScaleReconciler, ADMIN_ACCESS_TOKEN_KEY, ADMIN_USER_KEY};
use crate::client::{kinds, object_at, string_at};
use crate::constants::{
    DEDICATED_ADMINS_GROUP, RHSSO_INTEGRATION_NAME, THREESCALE_ADMIN_ROLE, THREESCALE_CLIENT_ID,
    THREESCALE_USER_CREATED_ATTRIBUTE,
};
use crate::crd::{Installation, InstallationType, ProductName, StatusPhase};
use crate::errors::ClientError;
use crate::labels::{SSO_INSTANCE_LABEL, SSO_INSTANCE_VALUE};
use crate::reconcilers::phase::{PhaseContext, PhaseError, PhaseResult};
use crate::reconcilers::resources::create_or_update;
use crate::reconcilers::secrets::secret_value_or_empty;
use crate::reconcilers::ProductPass;
use crate::threescale::{AuthProviderDetails, UserDetails};
use anyhow::anyhow;
use kube::api::DynamicObject;
use kube::ResourceExt;
use serde_json::{json, Value};
use tracing::{debug, info};

/// A user of the identity provider realm, read from its `KeycloakUser` resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct IdentityUser {
    /// Name of the `KeycloakUser` resource
    pub resource: String,
    pub username: String,
    pub email: String,
}

impl IdentityUser {
    fn from_resource(object: &DynamicObject) -> Option<Self> {
        Some(Self {
            resource: object.name_any(),
            username: string_at(object, "/spec/user/username")?.to_string(),
            email: string_at(object, "/spec/user/email")
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// Users to add to and remove from the portal. Usernames compare case-insensitively.
pub(super) fn user_diff<'a>(
    identity: &'a [IdentityUser],
    portal: &'a [UserDetails],
) -> (Vec<&'a IdentityUser>, Vec<&'a UserDetails>) {
    let added = identity
        .iter()
        .filter(|user| {
            !portal
                .iter()
                .any(|existing| existing.username.eq_ignore_ascii_case(&user.username))
        })
        .collect();
    let deleted = portal
        .iter()
        .filter(|user| {
            !identity
                .iter()
                .any(|wanted| wanted.username.eq_ignore_ascii_case(&user.username))
        })
        .collect();
    (added, deleted)
}

/// Portal users that should be admins but are not. The seed admin is never touched.
pub(super) fn users_to_promote<'a>(
    portal: &'a [UserDetails],
    admins: &[String],
    seed_admin: &str,
    workshop: bool,
) -> Vec<&'a UserDetails> {
    portal
        .iter()
        .filter(|user| user.username != seed_admin)
        .filter(|user| user.role != THREESCALE_ADMIN_ROLE)
        .filter(|user| {
            workshop
                || admins
                    .iter()
                    .any(|admin| admin.eq_ignore_ascii_case(&user.username))
        })
        .collect()
}

/// Spec of the `KeycloakClient` 3scale signs users in with.
pub(super) fn keycloak_client_spec(installation: &Installation, secret: &str) -> Value {
    let root_url = format!("https://3scale-admin.{}", installation.spec.routing_subdomain);
    let mapper = |name: &str, mapper: &str, consent: bool, consent_text: &str, config: Value| {
        json!({
            "name": name,
            "protocol": "openid-connect",
            "protocolMapper": mapper,
            "consentRequired": consent,
            "consentText": consent_text,
            "config": config,
        })
    };
    let user_attribute = |attribute: &str, claim: &str| {
        json!({
            "userinfo.token.claim": "true",
            "user.attribute": attribute,
            "id.token.claim": "true",
            "access.token.claim": "true",
            "claim.name": claim,
            "jsonType.label": "String",
        })
    };
    let property = "oidc-usermodel-property-mapper";

    json!({
        "realmSelector": {
            "matchLabels": {SSO_INSTANCE_LABEL: SSO_INSTANCE_VALUE},
        },
        "client": {
            "id": THREESCALE_CLIENT_ID,
            "clientId": THREESCALE_CLIENT_ID,
            "enabled": true,
            "secret": secret,
            "clientAuthenticatorType": "client-secret",
            "redirectUris": [format!("{root_url}/*")],
            "standardFlowEnabled": true,
            "rootUrl": root_url,
            "fullScopeAllowed": true,
            "access": {"view": true, "configure": true, "manage": true},
            "protocolMappers": [
                mapper("given name", property, true, "${givenName}", user_attribute("firstName", "given_name")),
                mapper("email verified", property, true, "${emailVerified}", user_attribute("emailVerified", "email_verified")),
                mapper("full name", "oidc-full-name-mapper", true, "${fullName}", json!({
                    "id.token.claim": "true",
                    "access.token.claim": "true",
                })),
                mapper("family name", property, true, "${familyName}", user_attribute("lastName", "family_name")),
                {
                    "name": "role list",
                    "protocol": "saml",
                    "protocolMapper": "saml-role-list-mapper",
                    "consentRequired": false,
                    "consentText": "${familyName}",
                    "config": {
                        "single": "false",
                        "attribute.nameformat": "Basic",
                        "attribute.name": "Role",
                    },
                },
                mapper("email", property, true, "${email}", user_attribute("email", "email")),
                mapper("org_name", property, false, "n.a.", user_attribute("org_name", "org_name")),
            ],
        },
    })
}

impl ThreeScaleReconciler {
    /// Register 3scale with the identity provider and make sure the admin
    /// portal offers it as an authentication provider.
    pub(super) async fn identity_integration(&self, pass: &mut ProductPass) -> PhaseResult {
        let rhsso = self
            .ctx
            .config
            .read(ProductName::Rhsso)
            .await
            .failed_context("failed to read identity provider configuration")?;
        if rhsso.namespace.is_empty() || rhsso.realm.is_empty() {
            info!("Identity provider namespace and realm are not known yet, cannot configure SSO integration");
            return Ok(StatusPhase::InProgress);
        }

        let secret = self
            .oauth_client_secret()
            .await
            .failed_context("failed to get oauth client secret")?;
        create_or_update(
            self.cluster(),
            &kinds::keycloak_client(),
            Some(&rhsso.namespace),
            THREESCALE_CLIENT_ID,
            |mut client| {
                client.data["spec"] = keycloak_client_spec(&pass.installation, &secret);
                Ok(client)
            },
        )
        .await
        .failed_context("could not create/update 3scale keycloak client")?;

        let seed = self
            .seed_secret(pass)
            .await
            .in_progress_context("failed to read 3scale admin token")?;
        let token = secret_value_or_empty(&seed, ADMIN_ACCESS_TOKEN_KEY);
        let api = self.api(&pass.installation);

        match api
            .get_authentication_provider_by_name(RHSSO_INTEGRATION_NAME, &token)
            .await
        {
            Ok(_) => debug!(provider = RHSSO_INTEGRATION_NAME, "Authentication provider exists"),
            Err(e) if e.is_not_found() => {
                let provider = AuthProviderDetails {
                    kind: "keycloak".to_string(),
                    name: RHSSO_INTEGRATION_NAME.to_string(),
                    client_id: THREESCALE_CLIENT_ID.to_string(),
                    client_secret: secret,
                    site: format!("{}/auth/realms/{}", rhsso.host, rhsso.realm),
                    skip_ssl_certificate_verification: true,
                    published: true,
                    ..Default::default()
                };
                api.add_authentication_provider(&provider, &token)
                    .await
                    .in_progress_context("failed to add rhsso authentication provider")?;
                info!(provider = RHSSO_INTEGRATION_NAME, "Added authentication provider");
            }
            Err(e) => {
                return Err(PhaseError::in_progress(
                    anyhow::Error::new(e).context("failed to look up rhsso authentication provider"),
                ));
            }
        }
        Ok(StatusPhase::Completed)
    }

    /// Mirror identity provider users into the admin portal and sync admin rights.
    pub(super) async fn sync_users(&self, pass: &mut ProductPass) -> PhaseResult {
        let rhsso = self
            .ctx
            .config
            .read(ProductName::Rhsso)
            .await
            .failed_context("failed to read identity provider configuration")?;
        let seed = self
            .seed_secret(pass)
            .await
            .failed_context("failed to read 3scale admin token")?;
        let token = secret_value_or_empty(&seed, ADMIN_ACCESS_TOKEN_KEY);
        let seed_admin = secret_value_or_empty(&seed, ADMIN_USER_KEY);
        if seed_admin.is_empty() {
            return Err(PhaseError::in_progress(anyhow!(
                "3scale seed secret has no {ADMIN_USER_KEY}"
            )));
        }

        let resources = self
            .cluster()
            .list(&kinds::keycloak_user(), Some(&rhsso.namespace), None)
            .await
            .failed_context("failed to list identity provider users")?;
        let identity: Vec<IdentityUser> = resources.iter().filter_map(IdentityUser::from_resource).collect();

        let api = self.api(&pass.installation);
        let portal = api
            .get_users(&token)
            .await
            .in_progress_context("failed to list 3scale users")?;

        let (added, deleted) = user_diff(&identity, &portal);
        for user in added {
            api.add_user(
                &user.username.to_lowercase(),
                &user.email.to_lowercase(),
                "",
                &token,
            )
            .await
            .in_progress_context(format!("failed to add 3scale user {}", user.username))?;
            info!(user = %user.username, "Added 3scale user");
        }
        for user in deleted.into_iter().filter(|user| user.username != seed_admin) {
            api.delete_user(user.id, &token)
                .await
                .in_progress_context(format!("failed to delete 3scale user {}", user.username))?;
            info!(user = %user.username, "Deleted 3scale user");
        }

        for user in &identity {
            create_or_update(
                self.cluster(),
                &kinds::keycloak_user(),
                Some(&rhsso.namespace),
                &user.resource,
                |mut resource| {
                    object_at(&mut resource.data, &["spec", "user", "attributes"])
                        [THREESCALE_USER_CREATED_ATTRIBUTE] = json!(["true"]);
                    Ok(resource)
                },
            )
            .await
            .in_progress_context(format!(
                "failed to update KeycloakUser {} with {THREESCALE_USER_CREATED_ATTRIBUTE} attribute",
                user.resource
            ))?;
        }

        let admins = self
            .dedicated_admins()
            .await
            .in_progress_context("failed to get dedicated admins group")?;
        let portal = api
            .get_users(&token)
            .await
            .in_progress_context("failed to list 3scale users")?;
        let workshop = pass.installation.spec.r#type == InstallationType::Workshop;
        for user in users_to_promote(&portal, &admins, &seed_admin, workshop) {
            api.set_user_as_admin(user.id, &token)
                .await
                .in_progress_context(format!("failed to promote 3scale user {}", user.username))?;
            info!(user = %user.username, "Promoted 3scale user to admin");
        }
        Ok(StatusPhase::Completed)
    }

    /// Members of the dedicated admins group. A missing group has no members.
    async fn dedicated_admins(&self) -> Result<Vec<String>, ClientError> {
        match self
            .cluster()
            .get(&kinds::group(), None, DEDICATED_ADMINS_GROUP)
            .await
        {
            Ok(group) => Ok(group.data["users"]
                .as_array()
                .map(|users| {
                    users
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod identity_tests;
