// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! 3scale admin portal integration.
//!
//! - [`client`] - [`ThreeScaleApi`] trait and its HTTP implementation
//! - [`types`] - Admin API wire types

pub mod client;
pub mod types;

pub use client::{admin_base_url, ThreeScaleApi, ThreeScaleHttpClient};
pub use types::{AuthProviderDetails, UserDetails};

#[cfg(test)]
pub use client::MockThreeScaleApi;
