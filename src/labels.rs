// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! This module defines standard Kubernetes labels and operator-specific labels/annotations
//! to ensure consistency across all resources created by the controller.

use crate::crd::Installation;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

/// Value for `app.kubernetes.io/part-of` on every resource this operator creates
pub const PART_OF_BUNDLE: &str = "product-bundle";

// ============================================================================
// Operator Labels
// ============================================================================

/// Label set to "true" on namespaces owned by the operator
pub const MANAGED_LABEL: &str = "bundle.platform.io/managed";

/// Label selecting namespaces scraped by middleware monitoring
pub const MONITORING_KEY_LABEL: &str = "monitoring-key";

/// Value of [`MONITORING_KEY_LABEL`]
pub const MONITORING_KEY_VALUE: &str = "middleware";

/// Label naming the product a cloud resource request belongs to
pub const PRODUCT_NAME_LABEL: &str = "productName";

/// Label selecting the running pods of an OpenShift deployment config
pub const DEPLOYMENT_CONFIG_LABEL: &str = "deploymentConfig";

/// Label put on 3scale routes by zync naming the route target
pub const ZYNC_ROUTE_TO_LABEL: &str = "zync.3scale.net/route-to";

/// Label put on identity provider realms managed by the platform
pub const SSO_INSTANCE_LABEL: &str = "sso";

/// Value of [`SSO_INSTANCE_LABEL`]
pub const SSO_INSTANCE_VALUE: &str = "integreatly";

// ============================================================================
// Owner Annotations
// ============================================================================

/// Annotation naming the owning `Installation`
pub const OWNER_NAME_ANNOTATION: &str = "bundle.platform.io/installation-name";

/// Annotation naming the namespace of the owning `Installation`
pub const OWNER_NAMESPACE_ANNOTATION: &str = "bundle.platform.io/installation-namespace";

/// Stamp the owner annotations of `installation` onto an object's metadata.
///
/// Owner references cannot cross namespaces, so ownership of objects in product
/// namespaces is recorded with annotations instead.
pub fn add_owner_annotations(meta: &mut ObjectMeta, installation: &Installation) {
    let annotations = meta.annotations.get_or_insert_with(Default::default);
    annotations.insert(OWNER_NAME_ANNOTATION.to_string(), installation.name_any());
    annotations.insert(
        OWNER_NAMESPACE_ANNOTATION.to_string(),
        installation.namespace().unwrap_or_default(),
    );
}

/// Stamp the managed-by labels onto an object's metadata.
pub fn add_managed_labels(meta: &mut ObjectMeta) {
    let labels = meta.labels.get_or_insert_with(Default::default);
    labels.insert(
        K8S_MANAGED_BY.to_string(),
        crate::constants::CONTROLLER_NAME.to_string(),
    );
    labels.insert(K8S_PART_OF.to_string(), PART_OF_BUNDLE.to_string());
}
