// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! 3scale admin API client.
//!
//! The reconciler talks to the admin portal through the [`ThreeScaleApi`] trait.
//! [`ThreeScaleHttpClient`] implements it with `reqwest` against
//! `https://3scale-admin.<routingSubdomain>/admin/api/...`, authenticating every
//! request with the `access_token` query parameter. A response with a status
//! other than the one the operation expects becomes
//! [`ThreeScaleError::UnexpectedStatus`] carrying the status code.

use super::types::{AuthProviderDetails, AuthProviders, NewUser, UserDetails, Users};
use crate::crd::Installation;
use crate::errors::ThreeScaleError;
use crate::metrics;
use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

const AUTH_PROVIDERS_PATH: &str = "/admin/api/account/authentication_providers.json";
const USERS_PATH: &str = "/admin/api/users.json";

/// Operations of the 3scale admin API used by the reconciler.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ThreeScaleApi: Send + Sync {
    /// Look up an authentication provider by name.
    ///
    /// Returns [`ThreeScaleError::NotFound`] when no provider has that name.
    async fn get_authentication_provider_by_name(
        &self,
        name: &str,
        access_token: &str,
    ) -> Result<AuthProviderDetails, ThreeScaleError>;

    /// Create an authentication provider. Expects `201 Created`.
    async fn add_authentication_provider(
        &self,
        provider: &AuthProviderDetails,
        access_token: &str,
    ) -> Result<(), ThreeScaleError>;

    /// List every user of the admin portal.
    async fn get_users(&self, access_token: &str) -> Result<Vec<UserDetails>, ThreeScaleError>;

    /// Create a user. Expects `201 Created`.
    async fn add_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        access_token: &str,
    ) -> Result<(), ThreeScaleError>;

    /// Delete a user. Expects `200 OK`.
    async fn delete_user(&self, id: i64, access_token: &str) -> Result<(), ThreeScaleError>;

    /// Give a user the admin role. Expects `200 OK`.
    async fn set_user_as_admin(&self, id: i64, access_token: &str) -> Result<(), ThreeScaleError>;
}

/// Admin portal base URL for an installation.
#[must_use]
pub fn admin_base_url(installation: &Installation) -> String {
    format!("https://3scale-admin.{}", installation.spec.routing_subdomain)
}

/// [`ThreeScaleApi`] over HTTP.
#[derive(Clone)]
pub struct ThreeScaleHttpClient {
    http: HttpClient,
    base_url: String,
}

impl ThreeScaleHttpClient {
    /// Client for the admin portal at `base_url`.
    #[must_use]
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send `request`, recording the outcome, and check the status.
    async fn send(
        &self,
        operation: &str,
        request: RequestBuilder,
        access_token: &str,
        expected: StatusCode,
    ) -> Result<Response, ThreeScaleError> {
        let response = match request.query(&[("access_token", access_token)]).send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_admin_api_request(operation, None);
                return Err(ThreeScaleError::Http(e.to_string()));
            }
        };
        let status = response.status();
        metrics::record_admin_api_request(operation, Some(status.as_u16()));
        debug!(operation, status = status.as_u16(), "3scale admin API response");

        if status != expected {
            return Err(ThreeScaleError::UnexpectedStatus {
                operation: operation.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ThreeScaleError> {
        response
            .json::<T>()
            .await
            .map_err(|e| ThreeScaleError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ThreeScaleApi for ThreeScaleHttpClient {
    async fn get_authentication_provider_by_name(
        &self,
        name: &str,
        access_token: &str,
    ) -> Result<AuthProviderDetails, ThreeScaleError> {
        let response = self
            .send(
                "get_authentication_providers",
                self.http.get(self.url(AUTH_PROVIDERS_PATH)),
                access_token,
                StatusCode::OK,
            )
            .await?;
        let providers: AuthProviders = Self::decode(response).await?;
        providers
            .authentication_providers
            .into_iter()
            .map(|p| p.authentication_provider)
            .find(|p| p.name == name)
            .ok_or_else(|| ThreeScaleError::NotFound {
                entity: "authentication provider".to_string(),
                name: name.to_string(),
            })
    }

    async fn add_authentication_provider(
        &self,
        provider: &AuthProviderDetails,
        access_token: &str,
    ) -> Result<(), ThreeScaleError> {
        self.send(
            "add_authentication_provider",
            self.http.post(self.url(AUTH_PROVIDERS_PATH)).form(provider),
            access_token,
            StatusCode::CREATED,
        )
        .await?;
        Ok(())
    }

    async fn get_users(&self, access_token: &str) -> Result<Vec<UserDetails>, ThreeScaleError> {
        let response = self
            .send(
                "get_users",
                self.http.get(self.url(USERS_PATH)),
                access_token,
                StatusCode::OK,
            )
            .await?;
        let users: Users = Self::decode(response).await?;
        Ok(users.users.into_iter().map(|u| u.user).collect())
    }

    async fn add_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        access_token: &str,
    ) -> Result<(), ThreeScaleError> {
        let user = NewUser {
            username,
            email,
            password,
        };
        self.send(
            "add_user",
            self.http.post(self.url(USERS_PATH)).form(&user),
            access_token,
            StatusCode::CREATED,
        )
        .await?;
        Ok(())
    }

    async fn delete_user(&self, id: i64, access_token: &str) -> Result<(), ThreeScaleError> {
        self.send(
            "delete_user",
            self.http.delete(self.url(&format!("/admin/api/users/{id}.json"))),
            access_token,
            StatusCode::OK,
        )
        .await?;
        Ok(())
    }

    async fn set_user_as_admin(&self, id: i64, access_token: &str) -> Result<(), ThreeScaleError> {
        self.send(
            "set_user_as_admin",
            self.http.put(self.url(&format!("/admin/api/users/{id}/admin.json"))),
            access_token,
            StatusCode::OK,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
