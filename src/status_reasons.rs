// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition types and reasons for `Installation` resources.
//!
//! Reasons are programmatic identifiers in CamelCase that explain why a
//! condition has a particular status.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   phase: in progress
//!   conditions:
//!     - type: Ready
//!       status: "False"
//!       reason: ProductsInstalling
//!       message: "Waiting on products: 3scale"
//! ```

// ============================================================================
// Condition Types
// ============================================================================

/// Encompassing condition: every product of the bundle is installed.
pub const CONDITION_TYPE_READY: &str = "Ready";

pub const STATUS_TRUE: &str = "True";
pub const STATUS_FALSE: &str = "False";

// ============================================================================
// Ready Reasons
// ============================================================================

/// Every product reported `completed`.
pub const REASON_ALL_PRODUCTS_COMPLETED: &str = "AllProductsCompleted";

/// At least one product is still converging or waiting on a collaborator.
pub const REASON_PRODUCTS_INSTALLING: &str = "ProductsInstalling";

/// At least one product failed its last pass.
pub const REASON_PRODUCT_FAILED: &str = "ProductFailed";

/// The installation is being deleted and teardown has not finished.
pub const REASON_UNINSTALLING: &str = "Uninstalling";

/// Teardown finished for every product.
pub const REASON_UNINSTALLED: &str = "Uninstalled";
