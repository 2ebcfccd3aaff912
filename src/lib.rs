// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Product Bundle Operator
//!
//! A Kubernetes operator that installs, upgrades and tears down a bundle of
//! third-party product operators on a managed-service platform, driven by a
//! single `Installation` custom resource.
//!
//! ## Overview
//!
//! Every product is installed by a reconciler built from named, idempotent
//! steps. A pass runs the steps in order and stops at the first one that has
//! not converged; the next poll picks up from the top. Deleting the
//! `Installation` runs each product's teardown steps instead, and the
//! product's finalizer is released once teardown converges.
//!
//! ## Modules
//!
//! - [`crd`] - The `Installation` resource and status types
//! - [`reconcilers`] - Phase sequencing, finalizers and the product reconcilers
//! - [`client`] - Object-safe cluster access over dynamic objects
//! - [`config`] - Per-product configuration store
//! - [`context`] - Shared context handed to reconcilers
//! - [`threescale`] - 3scale admin API client
//! - [`fake`] - In-memory collaborators for tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use product_bundle_operator::crd::{InstallationSpec, InstallationType};
//!
//! let spec = InstallationSpec {
//!     namespace_prefix: "redhat-rhmi-".to_string(),
//!     routing_subdomain: "apps.example.com".to_string(),
//!     r#type: InstallationType::Managed,
//!     ..Default::default()
//! };
//! ```
//!
//! ## Products
//!
//! - **Grafana** - Customer monitoring dashboards
//! - **3scale** - API management, wired into the identity provider

pub mod client;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod errors;
pub mod events;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod labels;
pub mod metrics;
pub mod reconcilers;
pub mod status_reasons;
pub mod threescale;
pub mod version;

#[cfg(test)]
mod errors_tests;
