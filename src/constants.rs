// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the product bundle operator.
//!
//! This module contains the string and numeric constants used throughout the
//! codebase. Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the `Installation` CRD
pub const API_GROUP: &str = "bundle.platform.io";

/// API version for the `Installation` CRD
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "bundle.platform.io/v1alpha1";

/// Kind name for `Installation` resource
pub const KIND_INSTALLATION: &str = "Installation";

/// Prefix of every per-product finalizer: `finalizer.<product>.bundle.platform.io`
pub const FINALIZER_PREFIX: &str = "finalizer";

/// Field manager / reporting component name used for writes and events
pub const CONTROLLER_NAME: &str = "product-bundle-operator";

// ============================================================================
// Namespace Constants
// ============================================================================

/// Suffix appended to a product namespace to derive its operator namespace
pub const OPERATOR_NAMESPACE_SUFFIX: &str = "-operator";

/// Name of the ConfigMap holding per-product configuration
pub const CONFIG_MAP_NAME: &str = "installation-config";

/// Name of the secret holding OAuth client secrets keyed by product name
pub const OAUTH_CLIENT_SECRETS_NAME: &str = "oauth-client-secrets";

/// Group whose members are granted admin rights in products
pub const DEDICATED_ADMINS_GROUP: &str = "dedicated-admins";

// ============================================================================
// Marketplace Constants
// ============================================================================

/// Subscription channel used for every product operator
pub const SUBSCRIPTION_CHANNEL: &str = "rhmi";

/// Catalog source name registered in each operator namespace
pub const CATALOG_SOURCE_NAME: &str = "rhmi-registry-cs";

/// OperatorGroup created next to each subscription
pub const OPERATOR_GROUP_NAME: &str = "rhmi-registry-og";

/// `ClusterServiceVersion` phase reported once an operator is installed
pub const CSV_PHASE_SUCCEEDED: &str = "Succeeded";

/// `ClusterServiceVersion` phase reported when installation failed
pub const CSV_PHASE_FAILED: &str = "Failed";

// ============================================================================
// Cloud Resource Constants
// ============================================================================

/// Tier requested for every cloud resource
pub const CLOUD_RESOURCE_TIER: &str = "production";

/// Phase reported by a cloud resource request once provisioned
pub const CLOUD_RESOURCE_PHASE_COMPLETE: &str = "complete";

// ============================================================================
// Grafana Constants
// ============================================================================

/// Default namespace (without prefix) of the customer monitoring product
pub const GRAFANA_DEFAULT_NAMESPACE: &str = "customer-monitoring";

/// Operator package installed for Grafana
pub const GRAFANA_PACKAGE: &str = "integreatly-grafana";

/// Name of the Grafana custom resource
pub const GRAFANA_CR_NAME: &str = "grafana";

/// Secret holding the oauth-proxy session secret
pub const GRAFANA_PROXY_SECRET_NAME: &str = "grafana-k8s-proxy";

/// Route exposing the Grafana UI
pub const GRAFANA_ROUTE_NAME: &str = "grafana-route";

/// Number of random bytes in the oauth-proxy session secret
pub const GRAFANA_SESSION_SECRET_BYTES: usize = 43;

/// Grafana product version
pub const GRAFANA_VERSION: &str = "6.6.0";

/// Grafana operator version
pub const GRAFANA_OPERATOR_VERSION: &str = "3.2.0";

// ============================================================================
// 3scale Constants
// ============================================================================

/// Default namespace (without prefix) of the API management product
pub const THREESCALE_DEFAULT_NAMESPACE: &str = "3scale";

/// Operator package installed for 3scale
pub const THREESCALE_PACKAGE: &str = "integreatly-3scale";

/// Name of the `APIManager` custom resource
pub const API_MANAGER_NAME: &str = "3scale";

/// Client id registered with the identity provider
pub const THREESCALE_CLIENT_ID: &str = "3scale";

/// Name of the authentication provider created in 3scale
pub const RHSSO_INTEGRATION_NAME: &str = "rhsso";

/// Minimum replica count for every 3scale component
pub const THREESCALE_MIN_REPLICAS: i64 = 2;

/// Minimum number of routes 3scale must expose before route sync is skipped
pub const THREESCALE_EXPECTED_ROUTES: usize = 6;

/// Console link created for the 3scale admin portal
pub const THREESCALE_CONSOLE_LINK_NAME: &str = "rhmi-3scale-console-link";

/// Role granting route edit permissions in the 3scale namespace
pub const THREESCALE_ROUTE_EDIT_ROLE: &str = "edit-3scale-routes";

/// Binding of the route edit role to the dedicated admins group
pub const THREESCALE_ROUTE_EDIT_BINDING: &str = "dedicated-admins-edit-routes";

/// Secret in the product namespace holding the registry pull secret
pub const THREESCALE_REGISTRY_SECRET_NAME: &str = "threescale-registry-auth";

/// Name prefix of the backend Redis request
pub const THREESCALE_BACKEND_REDIS_PREFIX: &str = "threescale-backend-redis-";

/// Name prefix of the system Redis request
pub const THREESCALE_SYSTEM_REDIS_PREFIX: &str = "threescale-redis-";

/// Name suffix shared by both Redis requests
pub const THREESCALE_REDIS_SUFFIX: &str = "rhmi";

/// Name prefix of the Postgres request
pub const THREESCALE_POSTGRES_PREFIX: &str = "threescale-postgres-";

/// Name prefix of the blob storage request
pub const THREESCALE_BLOB_STORAGE_PREFIX: &str = "threescale-blobstorage-";

/// Secret holding S3 credentials for system file storage
pub const S3_CREDENTIALS_SECRET_NAME: &str = "s3-credentials";

/// Secret holding the backend Redis connection
pub const EXTERNAL_BACKEND_REDIS_SECRET_NAME: &str = "backend-redis";

/// Secret holding the system Redis connection
pub const EXTERNAL_SYSTEM_REDIS_SECRET_NAME: &str = "system-redis";

/// Secret holding the system database connection
pub const EXTERNAL_POSTGRES_SECRET_NAME: &str = "system-database";

/// Secret holding SMTP settings for 3scale
pub const THREESCALE_SMTP_SECRET_NAME: &str = "system-smtp";

/// Secret holding the 3scale seed credentials
pub const SYSTEM_SEED_SECRET_NAME: &str = "system-seed";

/// ConfigMap holding the 3scale system configuration
pub const SYSTEM_CONFIG_MAP_NAME: &str = "system";

/// Key of the service discovery settings in the system ConfigMap
pub const SERVICE_DISCOVERY_KEY: &str = "service_discovery.yml";

/// Deployment config whose pods run background jobs
pub const SYSTEM_SIDEKIQ_NAME: &str = "system-sidekiq";

/// Default path checked by the admin UI blackbox target
pub const THREESCALE_BLACKBOX_ADMIN_PATH: &str = "/p/login/";

/// Secrets restored before install and backed up after it
pub const THREESCALE_BACKED_UP_SECRETS: [&str; 2] = ["system-seed", "system-master-apicast"];

/// Deployments restarted when SMTP or service discovery settings change
pub const THREESCALE_ROLLOUT_DEPLOYMENTS: [&str; 2] = ["system-app", "system-sidekiq"];

/// Command executed in a `system-sidekiq` pod to resync routes
pub const THREESCALE_ROUTE_SYNC_COMMAND: [&str; 4] =
    ["bundle", "exec", "rake", "zync:resync:domains"];

/// Identity user attribute marking a user as created in 3scale
pub const THREESCALE_USER_CREATED_ATTRIBUTE: &str = "3scale_user_created";

/// 3scale role name for administrators
pub const THREESCALE_ADMIN_ROLE: &str = "admin";

/// 3scale product version
pub const THREESCALE_VERSION: &str = "2.8";

/// 3scale operator version
pub const THREESCALE_OPERATOR_VERSION: &str = "0.5.0";

// ============================================================================
// Versioning Constants
// ============================================================================

/// Environment variable selecting the installation type
pub const INSTALLATION_TYPE_ENV: &str = "INSTALLATION_TYPE";

/// Operator version reported for managed API installations
pub const MANAGED_API_OPERATOR_VERSION: &str = "1.0.0";

/// Operator version reported for every other installation type
pub const DEFAULT_OPERATOR_VERSION: &str = "2.7.0";

// ============================================================================
// Controller Timing Constants
// ============================================================================

/// Requeue interval once every product reports completed (5 minutes)
pub const REQUEUE_WHEN_READY_SECS: u64 = 300;

/// Requeue interval while any product is still converging (30 seconds)
pub const REQUEUE_WHEN_NOT_READY_SECS: u64 = 30;

/// Requeue interval after a reconciliation error (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Default port of the metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path serving Prometheus metrics
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address of the metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";

/// Number of tokio worker threads
pub const TOKIO_WORKER_THREADS: usize = 4;
