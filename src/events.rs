// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes Event recording for product reconcilers.
//!
//! Reconcilers publish events through the [`EventRecorder`] trait so they show up
//! in `kubectl describe installation`. Publishing is fire-and-forget: a failed
//! event is logged and never fails a reconciliation pass.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

#[cfg(test)]
use mockall::automock;

/// Publishes Kubernetes Events about an object.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventRecorder: Send + Sync {
    /// Publish an event on `reference`.
    ///
    /// # Arguments
    ///
    /// * `reference` - The object this event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - Machine-readable reason (e.g. "ProductCompleted")
    /// * `action` - What was being done (e.g. "Reconcile")
    /// * `note` - Optional human-readable message
    async fn publish(
        &self,
        reference: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// [`EventRecorder`] wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventRecorder {
    recorder: Recorder,
}

impl KubeEventRecorder {
    /// Recorder reporting as `controller_name`.
    #[must_use]
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn publish(
        &self,
        reference: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, reference).await {
            warn!(reason, action, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

/// Recorder that drops every event.
pub struct NoopEventRecorder;

#[async_trait]
impl EventRecorder for NoopEventRecorder {
    async fn publish(
        &self,
        _reference: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Event reasons, shown in the REASON column of `kubectl get events`.
pub mod reasons {
    /// A product finished installing
    pub const PRODUCT_COMPLETED: &str = "ProductCompleted";
    /// A product step failed
    pub const PRODUCT_FAILED: &str = "ProductFailed";
    /// A product finished tearing down
    pub const PRODUCT_UNINSTALLED: &str = "ProductUninstalled";
    /// Every product of the installation is installed
    pub const INSTALLATION_COMPLETED: &str = "InstallationCompleted";
}

/// Event actions, shown in the ACTION column of `kubectl get events`.
pub mod actions {
    /// Forward installation pass
    pub const RECONCILE: &str = "Reconcile";
    /// Teardown pass
    pub const UNINSTALL: &str = "Uninstall";
}
