// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Wire types of the 3scale admin API.
//!
//! The admin API wraps every entity in a single-key object named after the
//! entity (`{"user": {...}}`), and every list in an object named after the
//! plural (`{"users": [...]}`).

use serde::{Deserialize, Serialize};

/// A 3scale user account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    /// `admin` or `member`
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct User {
    pub user: UserDetails,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct Users {
    #[serde(default)]
    pub users: Vec<User>,
}

/// An SSO authentication provider of the admin portal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthProviderDetails {
    #[serde(default, skip_serializing)]
    pub id: i64,
    pub kind: String,
    pub name: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub site: String,
    #[serde(default)]
    pub skip_ssl_certificate_verification: bool,
    #[serde(default)]
    pub published: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct AuthProvider {
    pub authentication_provider: AuthProviderDetails,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct AuthProviders {
    #[serde(default)]
    pub authentication_providers: Vec<AuthProvider>,
}

/// Form body of a new user.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}
