// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for product bundle installation.
//!
//! This module defines the `Installation` custom resource that drives the operator,
//! along with the status types every product reconciler reads and writes.
//!
//! # Resource Types
//!
//! - [`Installation`] - One platform install: a namespace prefix, routing subdomain
//!   and install type shared by every product in the bundle
//!
//! # Status Types
//!
//! - [`StatusPhase`] - Outcome of a step, a product or a whole installation
//! - [`ProductStatus`] - Per-product host, versions and phase
//! - [`InstallationStage`] - Group of products reconciled together
//!
//! # Example: Creating an Installation
//!
//! ```rust,no_run
//! use product_bundle_operator::crd::{InstallationSpec, InstallationType};
//!
//! let spec = InstallationSpec {
//!     namespace_prefix: "redhat-rhmi-".to_string(),
//!     routing_subdomain: "apps.example.com".to_string(),
//!     r#type: InstallationType::Managed,
//!     smtp_secret: Some("redhat-rhmi-smtp".to_string()),
//!     use_cluster_storage: true,
//!     operators_in_product_namespace: false,
//!     pull_secret: None,
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the stage holding every product in the bundle
pub const PRODUCTS_STAGE: &str = "products";

/// Outcome of a reconciliation step, a product or an installation.
///
/// Only [`StatusPhase::Completed`] lets a sequence of steps advance. Every other
/// value halts the pass and is reported back to the caller for the next poll.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum StatusPhase {
    /// Nothing attempted yet
    #[default]
    #[serde(rename = "")]
    Initial,
    /// Started but the target has not converged
    #[serde(rename = "in progress")]
    InProgress,
    /// Waiting on an external collaborator (datastore, blob storage, ...)
    #[serde(rename = "awaiting components")]
    AwaitingComponents,
    /// Fully converged
    #[serde(rename = "completed")]
    Completed,
    /// Needs attention or a retry from scratch
    #[serde(rename = "failed")]
    Failed,
}

impl StatusPhase {
    /// Returns true only for [`StatusPhase::Completed`].
    #[must_use]
    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }

    /// Returns true for phases that end a pass without further polling being implied.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The serialized form used in `Installation` status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "",
            Self::InProgress => "in progress",
            Self::AwaitingComponents => "awaiting components",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for StatusPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => f.write_str("initial"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Products known to the operator.
///
/// Only some of them are installed by this operator; the others are read from
/// the configuration store because installed products depend on them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProductName {
    /// Customer monitoring dashboards
    Grafana,
    /// API management
    ThreeScale,
    /// Identity provider
    Rhsso,
    /// Middleware monitoring stack
    Monitoring,
}

impl ProductName {
    /// Key used in status maps, finalizer names and the configuration store.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grafana => "grafana",
            Self::ThreeScale => "3scale",
            Self::Rhsso => "rhsso",
            Self::Monitoring => "middleware-monitoring",
        }
    }
}

impl fmt::Display for ProductName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of platform being installed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum InstallationType {
    /// Fully managed platform
    #[default]
    Managed,
    /// Managed API-only platform
    ManagedApi,
    /// Short-lived workshop cluster; every user is a product admin
    Workshop,
    /// Customer operated install
    SelfManaged,
}

impl InstallationType {
    /// The serialized form, also passed to cloud resource requests.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Managed => "managed",
            Self::ManagedApi => "managed-api",
            Self::Workshop => "workshop",
            Self::SelfManaged => "self-managed",
        }
    }
}

/// Reference to the registry pull secret copied into product namespaces.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PullSecretSpec {
    /// Name of the source secret
    pub name: String,
    /// Namespace of the source secret
    pub namespace: String,
}

/// `Installation` describes one platform install and the bundle of products it carries.
///
/// The operator reconciles every product in order on each poll. Deleting the
/// `Installation` tears the products down in reverse order; each product holds
/// its own finalizer until its teardown converges.
///
/// # Example
///
/// ```yaml
/// apiVersion: bundle.platform.io/v1alpha1
/// kind: Installation
/// metadata:
///   name: rhmi
///   namespace: redhat-rhmi-operator
/// spec:
///   namespacePrefix: redhat-rhmi-
///   routingSubdomain: apps.example.com
///   type: managed
///   smtpSecret: redhat-rhmi-smtp
/// ```
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "bundle.platform.io",
    version = "v1alpha1",
    kind = "Installation",
    namespaced,
    shortname = "inst",
    doc = "Installation represents one managed-service platform install. The operator installs, upgrades and tears down each product of the bundle on its behalf.",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[kube(status = "InstallationStatus")]
#[serde(rename_all = "camelCase")]
pub struct InstallationSpec {
    /// Prefix prepended to every product namespace (e.g. "redhat-rhmi-").
    #[serde(default)]
    pub namespace_prefix: String,

    /// Wildcard routing subdomain of the cluster (e.g. "apps.example.com").
    pub routing_subdomain: String,

    /// Kind of platform being installed.
    #[serde(default)]
    pub r#type: InstallationType,

    /// Name of the secret in the installation namespace holding SMTP credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_secret: Option<String>,

    /// Use in-cluster storage instead of cloud provider storage.
    #[serde(default)]
    pub use_cluster_storage: bool,

    /// Install product operators into the product namespace instead of a
    /// dedicated `<namespace>-operator` namespace.
    #[serde(default)]
    pub operators_in_product_namespace: bool,

    /// Registry pull secret copied into product namespaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_secret: Option<PullSecretSpec>,
}

/// Condition represents an observation of a resource's current state.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. Common types include: Ready, Progressing, Degraded.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Installed state of one product.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductStatus {
    /// Product name
    pub name: String,

    /// Phase reported by the last reconciliation pass
    #[serde(default)]
    pub phase: StatusPhase,

    /// Public URL of the product, once known
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,

    /// Installed product version
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Installed product operator version
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operator_version: String,
}

impl ProductStatus {
    /// Fresh status entry for `product`.
    #[must_use]
    pub fn new(product: ProductName) -> Self {
        Self {
            name: product.as_str().to_string(),
            ..Default::default()
        }
    }
}

/// A group of products reconciled together.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallationStage {
    /// Stage name
    pub name: String,

    /// Aggregate phase of every product in the stage
    #[serde(default)]
    pub phase: StatusPhase,

    /// Products keyed by product name
    #[serde(default)]
    pub products: BTreeMap<String, ProductStatus>,
}

/// `Installation` status
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallationStatus {
    /// Aggregate phase of the installation
    #[serde(default)]
    pub phase: StatusPhase,

    /// Stages keyed by stage name
    #[serde(default)]
    pub stages: BTreeMap<String, InstallationStage>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Message describing the last reconciliation error, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Operator version that last completed the installation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Installation {
    /// Look up the recorded status of `product`.
    #[must_use]
    pub fn product_status(&self, product: ProductName) -> Option<&ProductStatus> {
        self.status
            .as_ref()?
            .stages
            .get(PRODUCTS_STAGE)?
            .products
            .get(product.as_str())
    }

    /// True when the installation carries a deletion timestamp.
    #[must_use]
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}
