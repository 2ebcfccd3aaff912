// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Phase sequencing for product reconcilers.
//!
//! A product is installed by an ordered list of named [`Step`]s. Each step performs
//! one idempotent read or create-or-update against the cluster and reports a
//! [`StatusPhase`]. [`run_steps`] executes the list in order and stops at the first
//! step that errors or reports anything other than [`StatusPhase::Completed`];
//! nothing after that step runs in the same pass. The caller polls again later and
//! the sequence restarts from the first step, so every step must be safe to repeat.
//!
//! Steps may change cluster state and still report a non-completed phase (for
//! example, create a custom resource and report `InProgress` until it is ready).
//! Convergence is therefore monotonic across polls.
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::FutureExt;
//! use product_bundle_operator::reconcilers::phase::{run_steps, Step};
//!
//! let steps = [
//!     Step::new("namespace", |r: &MyReconciler, pass| r.namespace(pass).boxed()),
//!     Step::new("subscription", |r: &MyReconciler, pass| r.subscription(pass).boxed()),
//! ];
//! let phase = run_steps(&steps, &reconciler, &mut pass).await?;
//! ```

use crate::crd::{ProductName, StatusPhase};
use crate::events::{actions, reasons, EventRecorder};
use crate::metrics;
use futures::future::BoxFuture;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::EventType;
use std::fmt;
use tracing::{debug, info, warn};

/// Error returned by a step, carrying the phase the step was in when it failed.
///
/// Most failures are [`StatusPhase::Failed`]. Some steps fail while waiting on a
/// collaborator and report [`StatusPhase::InProgress`] with the error so the
/// next poll retries without marking the product failed.
#[derive(Debug)]
pub struct PhaseError {
    /// Phase reported alongside the error
    pub phase: StatusPhase,
    /// The underlying error with its context chain
    pub error: anyhow::Error,
}

impl PhaseError {
    /// Error reported with [`StatusPhase::Failed`].
    pub fn failed(error: impl Into<anyhow::Error>) -> Self {
        Self {
            phase: StatusPhase::Failed,
            error: error.into(),
        }
    }

    /// Error reported with [`StatusPhase::InProgress`].
    pub fn in_progress(error: impl Into<anyhow::Error>) -> Self {
        Self {
            phase: StatusPhase::InProgress,
            error: error.into(),
        }
    }

    /// Attach context to the wrapped error, keeping the phase.
    #[must_use]
    pub fn context<C>(self, context: C) -> Self
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        Self {
            phase: self.phase,
            error: self.error.context(context),
        }
    }
}

impl fmt::Display for PhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#} (phase: {})", self.error, self.phase)
    }
}

impl std::error::Error for PhaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.error)
    }
}

impl From<anyhow::Error> for PhaseError {
    fn from(error: anyhow::Error) -> Self {
        Self::failed(error)
    }
}

impl From<crate::errors::ClientError> for PhaseError {
    fn from(error: crate::errors::ClientError) -> Self {
        Self::failed(error)
    }
}

/// Result of a step, a product or a whole pass.
pub type PhaseResult = Result<StatusPhase, PhaseError>;

/// Extension for mapping `Result<T, E>` into a [`PhaseError`] with a chosen phase.
pub trait PhaseContext<T> {
    /// Map the error to [`StatusPhase::InProgress`] with context.
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped in a `PhaseError`.
    fn in_progress_context<C>(self, context: C) -> Result<T, PhaseError>
    where
        C: fmt::Display + Send + Sync + 'static;

    /// Map the error to [`StatusPhase::Failed`] with context.
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped in a `PhaseError`.
    fn failed_context<C>(self, context: C) -> Result<T, PhaseError>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> PhaseContext<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn in_progress_context<C>(self, context: C) -> Result<T, PhaseError>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| PhaseError::in_progress(e.into().context(context)))
    }

    fn failed_context<C>(self, context: C) -> Result<T, PhaseError>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| PhaseError::failed(e.into().context(context)))
    }
}

/// Signature of a step body: borrows the reconciler and the per-pass state.
pub type StepFn<R, S> = for<'a> fn(&'a R, &'a mut S) -> BoxFuture<'a, PhaseResult>;

/// A named unit of reconciliation.
///
/// Steps hold no state of their own. Lists of steps are rebuilt for every pass;
/// durable state lives in cluster objects and the configuration store.
pub struct Step<R, S> {
    /// Name used in logs, events and error context
    pub name: &'static str,
    /// Step body
    pub run: StepFn<R, S>,
}

impl<R, S> Step<R, S> {
    /// Create a step.
    #[must_use]
    pub const fn new(name: &'static str, run: StepFn<R, S>) -> Self {
        Self { name, run }
    }
}

impl<R, S> Clone for Step<R, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R, S> Copy for Step<R, S> {}

impl<R, S> fmt::Debug for Step<R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish()
    }
}

/// Run `steps` in order, stopping at the first error or non-completed phase.
///
/// Errors are wrapped with the name of the step that produced them. An empty
/// list reports [`StatusPhase::Completed`].
///
/// # Errors
///
/// Returns the first step error, with the phase the step reported.
pub async fn run_steps<R, S>(steps: &[Step<R, S>], reconciler: &R, state: &mut S) -> PhaseResult {
    for step in steps {
        debug!(step = step.name, "Running step");
        match (step.run)(reconciler, state).await {
            Ok(StatusPhase::Completed) => {}
            Ok(phase) => {
                info!(step = step.name, phase = %phase, "Step has not converged, halting pass");
                return Ok(phase);
            }
            Err(err) => {
                return Err(err.context(format!("step '{}' failed", step.name)));
            }
        }
    }
    Ok(StatusPhase::Completed)
}

/// Runs step lists for one product and reports halts and failures.
///
/// Failures produce a Warning event on the `Installation` and bump the error
/// counter; halts on a non-completed phase are counted per phase.
pub struct Sequencer<'a> {
    product: ProductName,
    events: &'a dyn EventRecorder,
    reference: ObjectReference,
}

impl<'a> Sequencer<'a> {
    /// Sequencer reporting against the object described by `reference`.
    #[must_use]
    pub fn new(
        product: ProductName,
        events: &'a dyn EventRecorder,
        reference: ObjectReference,
    ) -> Self {
        Self {
            product,
            events,
            reference,
        }
    }

    /// Product this sequencer reports for.
    #[must_use]
    pub fn product(&self) -> ProductName {
        self.product
    }

    /// Publish a Normal event against the sequencer's reference.
    pub async fn normal(&self, reason: &str, action: &str, note: String) {
        self.events
            .publish(&self.reference, EventType::Normal, reason, action, Some(note))
            .await;
    }

    /// Run `steps`, publishing a Warning event if one fails.
    ///
    /// # Errors
    ///
    /// Returns the first step error after it has been reported.
    pub async fn run<R, S>(&self, steps: &[Step<R, S>], reconciler: &R, state: &mut S) -> PhaseResult {
        match run_steps(steps, reconciler, state).await {
            Ok(phase) => {
                if !phase.is_completed() {
                    metrics::record_step_halt(self.product, phase);
                }
                Ok(phase)
            }
            Err(err) => {
                warn!(product = %self.product, phase = %err.phase, error = %err, "Reconciliation step failed");
                metrics::record_product_error(self.product);
                self.events
                    .publish(
                        &self.reference,
                        EventType::Warning,
                        reasons::PRODUCT_FAILED,
                        actions::RECONCILE,
                        Some(format!("{}: {err}", self.product)),
                    )
                    .await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "phase_tests.rs"]
mod phase_tests;
