// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Installed version checks.

use crate::constants::{DEFAULT_OPERATOR_VERSION, INSTALLATION_TYPE_ENV, MANAGED_API_OPERATOR_VERSION};
use crate::crd::{InstallationType, ProductStatus};
use tracing::debug;

/// True when `product` reports both the expected product and operator versions.
#[must_use]
pub fn verify_product_and_operator_version(
    product: &ProductStatus,
    expected_product_version: &str,
    expected_operator_version: &str,
) -> bool {
    if product.operator_version != expected_operator_version {
        debug!(
            product = %product.name,
            expected = expected_operator_version,
            actual = %product.operator_version,
            "Operator version is not as expected"
        );
        return false;
    }
    if product.version != expected_product_version {
        debug!(
            product = %product.name,
            expected = expected_product_version,
            actual = %product.version,
            "Product version is not as expected"
        );
        return false;
    }
    true
}

/// Version of the bundle operator, which depends on the installation type it was deployed for.
#[must_use]
pub fn operator_version() -> &'static str {
    operator_version_for(std::env::var(INSTALLATION_TYPE_ENV).ok().as_deref())
}

fn operator_version_for(installation_type: Option<&str>) -> &'static str {
    if installation_type == Some(InstallationType::ManagedApi.as_str()) {
        MANAGED_API_OPERATOR_VERSION
    } else {
        DEFAULT_OPERATOR_VERSION
    }
}
