//! Reconciliation Driver
//!
//! One pass: validate the manifest, fetch the table, classify it, then either
//! wait, stop, or submit the single planned mutation.

use super::delta::table_index_delta;
use super::error::{ReconcileError, RemoteError};
use super::planner::{plan, MutationIntent};
use super::scalar::ScalarDelta;
use super::signal::ControlSignal;
use super::status::{classify, describe, Classification};
use crate::model::{ObservedTable, TableSpec};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Remote operations the driver needs from the table service
#[async_trait]
pub trait TableApi: Send + Sync {
    /// Current state of the table, `None` when it does not exist
    async fn describe_table(&self, table_name: &str) -> Result<Option<ObservedTable>, RemoteError>;

    /// Submit one mutation. `desired` supplies context the intent does not
    /// carry, such as attribute definitions for a new index.
    async fn update_table(
        &self,
        desired: &TableSpec,
        intent: &MutationIntent,
    ) -> Result<(), RemoteError>;

    async fn create_table(&self, desired: &TableSpec) -> Result<(), RemoteError>;
}

/// Timing policy for a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Wait while the table or one of its indexes is mid-transition, or when
    /// the service rejects a call because another mutation is in flight
    pub busy_backoff: Duration,
    /// Wait after a mutation was accepted, before looking again
    pub poll_interval: Duration,
    /// Upper bound for a single remote call
    pub request_timeout: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            busy_backoff: Duration::from_secs(5),
            poll_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ReconcileSettings {
    /// Zero waits, for tests that drive passes back to back
    pub fn immediate() -> Self {
        Self {
            busy_backoff: Duration::ZERO,
            poll_interval: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// What a pass should do, given the manifest and the observed table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassDecision {
    /// The table does not exist yet
    CreateTable,
    /// The table is mid-transition
    Wait { reason: String },
    /// The table is in a terminal phase
    Settled { reason: String },
    Submit(MutationIntent),
    Converged,
}

/// Decide the action for one pass. Pure.
pub fn decide(desired: &TableSpec, observed: Option<&ObservedTable>) -> PassDecision {
    let Some(observed) = observed else {
        return PassDecision::CreateTable;
    };

    let classification = classify(observed);
    match classification {
        Classification::Transient(_) => {
            return PassDecision::Wait {
                reason: describe(observed, classification),
            }
        }
        Classification::Terminal(_) => {
            return PassDecision::Settled {
                reason: describe(observed, classification),
            }
        }
        Classification::Stable => {}
    }

    let scalar = ScalarDelta::compute(desired, observed);
    let indexes = table_index_delta(observed, desired);
    if !indexes.is_empty() {
        tracing::debug!(
            added = indexes.added.len(),
            updated = indexes.updated.len(),
            removed = indexes.removed.len(),
            "index drift"
        );
    }

    match plan(classification, &scalar, &indexes) {
        MutationIntent::NoOp => PassDecision::Converged,
        intent => PassDecision::Submit(intent),
    }
}

/// Runs reconciliation passes against a [`TableApi`]
pub struct Reconciler<A> {
    api: A,
    settings: ReconcileSettings,
}

impl<A: TableApi> Reconciler<A> {
    pub fn new(api: A, settings: ReconcileSettings) -> Self {
        Self { api, settings }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Run one pass for `desired`. Idempotent; safe to call repeatedly.
    pub async fn reconcile_once(
        &self,
        desired: &TableSpec,
        cancel: &CancellationToken,
    ) -> ControlSignal {
        let span = tracing::info_span!(
            "reconcile",
            table = %desired.table_name,
            pass = %Uuid::new_v4()
        );
        async {
            let signal = self.run_pass(desired, cancel).await;
            tracing::debug!(signal = signal.label(), "pass finished");
            signal
        }
        .instrument(span)
        .await
    }

    /// Validate, fetch and decide without submitting anything.
    ///
    /// `Err` carries the signal that ended the pass early: an invalid
    /// manifest, a failed fetch, or cancellation.
    pub async fn evaluate(
        &self,
        desired: &TableSpec,
        cancel: &CancellationToken,
    ) -> Result<PassDecision, ControlSignal> {
        if cancel.is_cancelled() {
            return Err(ControlSignal::Cancelled);
        }
        desired
            .validate()
            .map_err(|e| ControlSignal::fatal(ReconcileError::from(e)))?;

        let observed = self
            .call(
                "DescribeTable",
                cancel,
                self.api.describe_table(&desired.table_name),
            )
            .await?;

        Ok(decide(desired, observed.as_ref()))
    }

    async fn run_pass(&self, desired: &TableSpec, cancel: &CancellationToken) -> ControlSignal {
        let decision = match self.evaluate(desired, cancel).await {
            Ok(decision) => decision,
            Err(signal) => return signal,
        };

        match decision {
            PassDecision::Converged => ControlSignal::Converged,
            PassDecision::Wait { reason } => {
                tracing::debug!(%reason, "table busy");
                ControlSignal::retry_after(self.settings.busy_backoff, reason)
            }
            PassDecision::Settled { reason } => {
                tracing::info!(%reason, "table settled in terminal status");
                ControlSignal::Terminal { reason }
            }
            PassDecision::CreateTable => {
                tracing::info!("table not found, creating");
                match self
                    .call("CreateTable", cancel, self.api.create_table(desired))
                    .await
                {
                    Ok(()) => ControlSignal::retry_after(
                        self.settings.poll_interval,
                        "table creation submitted",
                    ),
                    Err(signal) => signal,
                }
            }
            PassDecision::Submit(intent) => {
                tracing::info!(%intent, "submitting mutation");
                match self
                    .call("UpdateTable", cancel, self.api.update_table(desired, &intent))
                    .await
                {
                    Ok(()) => ControlSignal::retry_after(
                        self.settings.poll_interval,
                        format!("{} submitted", intent),
                    ),
                    Err(signal) => signal,
                }
            }
        }
    }

    /// Await a remote call under the request timeout, racing cancellation.
    /// Cancellation wins ties and is never retried here.
    async fn call<T, F>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        fut: F,
    ) -> Result<T, ControlSignal>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        let timeout = self.settings.request_timeout;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(operation, "pass cancelled");
                return Err(ControlSignal::Cancelled);
            }
            result = tokio::time::timeout(timeout, fut) => {
                result.unwrap_or(Err(RemoteError::Timeout(timeout)))
            }
        };

        result.map_err(|err| self.interpret_failure(operation, err))
    }

    fn interpret_failure(&self, operation: &'static str, err: RemoteError) -> ControlSignal {
        if err.is_conflict() {
            tracing::warn!(operation, error = %err, "call rejected, table busy");
            return ControlSignal::retry_after(
                self.settings.busy_backoff,
                format!("{} rejected: {}", operation, err),
            );
        }
        tracing::warn!(operation, error = %err, "call failed");
        ControlSignal::fatal(ReconcileError::remote(operation, err))
    }
}
