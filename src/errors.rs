// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for cluster access, the 3scale admin API and the configuration store.
//!
//! Steps propagate these through `anyhow` with context attached at every layer.
//! The helpers at the bottom of this module recover the typed error from an
//! `anyhow::Error` so callers can treat not-found and conflict results as
//! expected outcomes instead of failures.

use thiserror::Error;

/// Errors returned by a [`ClusterClient`](crate::client::ClusterClient).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The object does not exist (HTTP 404)
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Kind of the missing object
        kind: String,
        /// Name of the missing object
        name: String,
    },

    /// The object was modified since it was read (HTTP 409 on update)
    ///
    /// Another writer won the optimistic concurrency race. The next poll
    /// re-reads the object and tries again.
    #[error("conflict writing {kind} '{name}': {message}")]
    Conflict {
        /// Kind of the conflicting object
        kind: String,
        /// Name of the conflicting object
        name: String,
        /// Message returned by the API server
        message: String,
    },

    /// Create was called for an object that already exists (HTTP 409 on create)
    #[error("{kind} '{name}' already exists")]
    AlreadyExists {
        /// Kind of the existing object
        kind: String,
        /// Name of the existing object
        name: String,
    },

    /// Any other error response from the API server
    #[error("API error {code} ({reason}): {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Machine-readable reason
        reason: String,
        /// Human-readable message
        message: String,
    },

    /// An object could not be converted between its typed and dynamic forms
    #[error("failed to convert {kind}: {message}")]
    Serialization {
        /// Kind being converted
        kind: String,
        /// Underlying serde error
        message: String,
    },

    /// Transport, exec or other client-side failure
    #[error("{0}")]
    Other(String),
}

impl ClientError {
    /// Map a `kube::Error` for an object of `kind` named `name`.
    #[must_use]
    pub fn from_kube(err: kube::Error, kind: &str, name: &str) -> Self {
        match err {
            kube::Error::Api(response) => match response.code {
                404 => Self::NotFound {
                    kind: kind.to_string(),
                    name: name.to_string(),
                },
                409 if response.reason == "AlreadyExists" => Self::AlreadyExists {
                    kind: kind.to_string(),
                    name: name.to_string(),
                },
                409 => Self::Conflict {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    message: response.message,
                },
                code => Self::Api {
                    code,
                    reason: response.reason,
                    message: response.message,
                },
            },
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true for [`ClientError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for [`ClientError::Conflict`] and [`ClientError::AlreadyExists`].
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::AlreadyExists { .. })
    }
}

/// Errors returned by the 3scale admin API client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThreeScaleError {
    /// The requested entity does not exist
    #[error("3scale {entity} '{name}' not found")]
    NotFound {
        /// Entity type (e.g. "authentication provider")
        entity: String,
        /// Name or id that was looked up
        name: String,
    },

    /// The admin API answered with an unexpected status code
    #[error("3scale admin API returned HTTP {status} for {operation}")]
    UnexpectedStatus {
        /// Operation being performed
        operation: String,
        /// HTTP status code returned
        status: u16,
    },

    /// The request could not be sent
    #[error("3scale admin API request failed: {0}")]
    Http(String),

    /// The response body could not be decoded
    #[error("failed to decode 3scale admin API response: {0}")]
    Decode(String),
}

impl ThreeScaleError {
    /// Returns true for [`ThreeScaleError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors returned by a [`ConfigStore`](crate::config::ConfigStore).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Stored YAML for a product could not be parsed
    #[error("invalid configuration for product '{product}': {source}")]
    Parse {
        /// Product whose configuration is invalid
        product: String,
        /// Underlying YAML error
        #[source]
        source: serde_yaml::Error,
    },

    /// Configuration could not be serialized
    #[error("failed to serialize configuration for product '{product}': {source}")]
    Serialize {
        /// Product being written
        product: String,
        /// Underlying YAML error
        #[source]
        source: serde_yaml::Error,
    },

    /// The backing ConfigMap could not be read or written
    #[error("configuration store unavailable: {0}")]
    Store(#[from] ClientError),
}

/// True when `err` wraps a [`ClientError::NotFound`].
#[must_use]
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<ClientError>()
            .is_some_and(ClientError::is_not_found)
    })
}

/// True when `err` wraps a conflict or already-exists [`ClientError`].
#[must_use]
pub fn is_conflict(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<ClientError>()
            .is_some_and(ClientError::is_conflict)
    })
}
