// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the product bundle operator.
//!
//! All metrics carry the prefix `bundle_platform_io_` (prometheus-safe version of
//! "bundle.platform.io") and are exposed on the `/metrics` endpoint.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Outcome and duration of `Installation` passes
//! - **Product Metrics** - Per-product halts, failures and install state
//! - **Resource Metrics** - Writes performed by create-or-update
//! - **Admin API Metrics** - Requests sent to the 3scale admin API
//!
//! # Example
//!
//! ```rust,no_run
//! use product_bundle_operator::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("Installation", std::time::Duration::from_secs(1));
//! ```

use crate::crd::{ProductName, StatusPhase};
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "bundle_platform_io";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let opts = Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help);
    let counter = CounterVec::new(opts, labels).expect("metric definition is valid");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric is registered once");
    counter
}

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of resource (`Installation`)
/// - `status`: Outcome (`success`, `error`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "reconciliations_total",
        "Total number of reconciliations by resource type and status",
        &["resource_type", "status"],
    )
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `resource_type`: Kind of resource
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).expect("metric definition is valid");
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("metric is registered once");
    histogram
});

// ============================================================================
// Product Metrics
// ============================================================================

/// Number of passes halted on a non-completed phase
///
/// Labels:
/// - `product`: Product name (e.g. `3scale`)
/// - `phase`: Phase the pass halted on
pub static STEP_HALTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "step_halts_total",
        "Number of product passes halted on a non-completed phase",
        &["product", "phase"],
    )
});

/// Number of failed product passes
///
/// Labels:
/// - `product`: Product name
pub static PRODUCT_ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "product_errors_total",
        "Number of product passes that ended with an error",
        &["product"],
    )
});

/// Install state of each product (1 = completed, 0 = not completed)
///
/// Labels:
/// - `namespace`: Namespace of the `Installation`
/// - `product`: Product name
pub static PRODUCT_INSTALLED: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_product_installed"),
        "Install state of each product (1 = completed, 0 = not completed)",
    );
    let gauge = GaugeVec::new(opts, &["namespace", "product"]).expect("metric definition is valid");
    METRICS_REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("metric is registered once");
    gauge
});

// ============================================================================
// Resource Metrics
// ============================================================================

/// Writes performed by create-or-update
///
/// Labels:
/// - `kind`: Kind of the object written
/// - `operation`: `created` or `updated`
pub static RESOURCE_WRITES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "resource_writes_total",
        "Objects created or updated by kind",
        &["kind", "operation"],
    )
});

// ============================================================================
// Admin API Metrics
// ============================================================================

/// Requests sent to the 3scale admin API
///
/// Labels:
/// - `operation`: Admin API operation (e.g. `add_user`)
/// - `status`: HTTP status code, or `error` when no response was received
pub static ADMIN_API_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "admin_api_requests_total",
        "Requests sent to the 3scale admin API by operation and status",
        &["operation", "status"],
    )
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation
///
/// # Arguments
/// * `resource_type` - The kind of resource reconciled
/// * `duration` - Duration of the reconciliation
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
///
/// # Arguments
/// * `resource_type` - The kind of resource reconciled
/// * `duration` - Duration of the reconciliation before failure
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a product pass that halted on `phase`
pub fn record_step_halt(product: ProductName, phase: StatusPhase) {
    STEP_HALTS_TOTAL
        .with_label_values(&[product.as_str(), phase.as_str()])
        .inc();
}

/// Record a product pass that ended with an error
pub fn record_product_error(product: ProductName) {
    PRODUCT_ERRORS_TOTAL
        .with_label_values(&[product.as_str()])
        .inc();
}

/// Record whether `product` of the installation in `namespace` is completed
pub fn record_product_installed(namespace: &str, product: ProductName, installed: bool) {
    PRODUCT_INSTALLED
        .with_label_values(&[namespace, product.as_str()])
        .set(if installed { 1.0 } else { 0.0 });
}

/// Record an object written by create-or-update
///
/// # Arguments
/// * `kind` - Kind of the object
/// * `operation` - `created` or `updated`
pub fn record_resource_write(kind: &str, operation: &str) {
    RESOURCE_WRITES_TOTAL
        .with_label_values(&[kind, operation])
        .inc();
}

/// Record a 3scale admin API request
///
/// `status` is `None` when the request failed before a response arrived.
pub fn record_admin_api_request(operation: &str, status: Option<u16>) {
    let status = status.map_or_else(|| "error".to_string(), |code| code.to_string());
    ADMIN_API_REQUESTS_TOTAL
        .with_label_values(&[operation, status.as_str()])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
