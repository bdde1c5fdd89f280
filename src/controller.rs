//! Controller
//!
//! Drives reconciliation passes for every managed table until cancelled,
//! turning each [`ControlSignal`] into a wait and a status report.

use crate::config::Config;
use crate::model::TableSpec;
use crate::reconcile::{ControlSignal, PassDecision, ReconcileError, Reconciler, TableApi};
use crate::report::StatusSink;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Upper bound for the exponential backoff after transport failures
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Loop policy on top of the per-pass [`ReconcileSettings`](crate::reconcile::ReconcileSettings)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Pause before re-checking a converged or terminal table
    pub resync_interval: Duration,
    /// Base of the exponential backoff for retryable failures
    pub failure_backoff: Duration,
    pub max_backoff: Duration,
    /// Consecutive retryable failures tolerated before giving up on a table
    pub max_transport_retries: u32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            resync_interval: config.resync_interval(),
            failure_backoff: Duration::from_millis(config.busy_backoff_ms),
            max_backoff: MAX_BACKOFF,
            max_transport_retries: config.max_transport_retries,
        }
    }

    /// `failure_backoff * 2^attempt`, capped at `max_backoff`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.failure_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Why a table loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOutcome {
    Cancelled,
    /// A failure that is not retryable, or too many retryable ones in a row
    GaveUp(ReconcileError),
    /// The table's task panicked
    Panicked(String),
}

impl TableOutcome {
    /// The loop stopped for a reason other than shutdown
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// Runs one loop per table over a shared [`Reconciler`]
pub struct Controller<A, S> {
    reconciler: Arc<Reconciler<A>>,
    sink: Arc<S>,
    settings: ControllerSettings,
}

impl<A, S> Clone for Controller<A, S> {
    fn clone(&self) -> Self {
        Self {
            reconciler: Arc::clone(&self.reconciler),
            sink: Arc::clone(&self.sink),
            settings: self.settings,
        }
    }
}

impl<A, S> Controller<A, S>
where
    A: TableApi + 'static,
    S: StatusSink + 'static,
{
    pub fn new(reconciler: Reconciler<A>, sink: Arc<S>, settings: ControllerSettings) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            sink,
            settings,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn reconciler(&self) -> &Reconciler<A> {
        &self.reconciler
    }

    /// Reconcile every table until `cancel` fires or a table gives up.
    /// Returns one outcome per table, in input order.
    pub async fn run(
        &self,
        tables: Vec<TableSpec>,
        cancel: CancellationToken,
    ) -> Vec<(String, TableOutcome)> {
        tracing::info!("Managing {} table(s)", tables.len());

        let handles: Vec<_> = tables
            .into_iter()
            .map(|table| {
                let controller = self.clone();
                let cancel = cancel.clone();
                let name = table.table_name.clone();
                let handle = tokio::spawn(async move { controller.run_table(table, cancel).await });
                (name, handle)
            })
            .collect();

        let (names, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let results = join_all(handles).await;

        names
            .into_iter()
            .zip(results)
            .map(|(name, result)| {
                let outcome = result.unwrap_or_else(|e| {
                    tracing::error!(table = %name, "table task panicked: {}", e);
                    TableOutcome::Panicked(e.to_string())
                });
                (name, outcome)
            })
            .collect()
    }

    /// Loop for a single table
    pub async fn run_table(&self, table: TableSpec, cancel: CancellationToken) -> TableOutcome {
        let name = table.table_name.clone();
        let mut failures: u32 = 0;

        loop {
            let signal = self.reconciler.reconcile_once(&table, &cancel).await;
            let wait = match signal {
                ControlSignal::Converged => {
                    failures = 0;
                    self.sink.report_synced(&name);
                    self.settings.resync_interval
                }
                ControlSignal::Terminal { reason } => {
                    failures = 0;
                    self.sink.report_terminal(&name, &reason);
                    self.settings.resync_interval
                }
                ControlSignal::RetryAfter { after, reason } => {
                    failures = 0;
                    self.sink.schedule_retry(&name, after, &reason);
                    after
                }
                ControlSignal::Fatal { cause } => {
                    let will_retry =
                        cause.is_retryable() && failures < self.settings.max_transport_retries;
                    self.sink
                        .report_failure(&name, &cause.to_string(), will_retry);
                    if !will_retry {
                        return TableOutcome::GaveUp(cause);
                    }
                    let wait = self.settings.backoff(failures);
                    failures += 1;
                    wait
                }
                ControlSignal::Cancelled => return TableOutcome::Cancelled,
            };

            tokio::select! {
                _ = cancel.cancelled() => return TableOutcome::Cancelled,
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// A single pass per table, run concurrently. Signals are reported to
    /// the sink like in [`run`](Self::run) but nothing is scheduled.
    pub async fn run_once(
        &self,
        tables: &[TableSpec],
        cancel: &CancellationToken,
    ) -> Vec<(String, ControlSignal)> {
        let passes = tables.iter().map(|table| async move {
            let signal = self.reconciler.reconcile_once(table, cancel).await;
            self.report(&table.table_name, &signal);
            (table.table_name.clone(), signal)
        });
        join_all(passes).await
    }

    /// Decide the next action per table without submitting anything
    pub async fn plan_only(
        &self,
        tables: &[TableSpec],
        cancel: &CancellationToken,
    ) -> Vec<(String, Result<PassDecision, ControlSignal>)> {
        let passes = tables.iter().map(|table| async move {
            let decision = self.reconciler.evaluate(table, cancel).await;
            (table.table_name.clone(), decision)
        });
        join_all(passes).await
    }

    fn report(&self, table: &str, signal: &ControlSignal) {
        match signal {
            ControlSignal::Converged => self.sink.report_synced(table),
            ControlSignal::Terminal { reason } => self.sink.report_terminal(table, reason),
            ControlSignal::RetryAfter { after, reason } => {
                self.sink.schedule_retry(table, *after, reason)
            }
            ControlSignal::Fatal { cause } => {
                self.sink.report_failure(table, &cause.to_string(), false)
            }
            ControlSignal::Cancelled => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let settings = ControllerSettings {
            resync_interval: Duration::from_secs(60),
            failure_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
            max_transport_retries: 5,
        };
        assert_eq!(settings.backoff(0), Duration::from_secs(5));
        assert_eq!(settings.backoff(1), Duration::from_secs(10));
        assert_eq!(settings.backoff(3), Duration::from_secs(40));
        assert_eq!(settings.backoff(4), Duration::from_secs(60));
        assert_eq!(settings.backoff(40), Duration::from_secs(60));
    }

    #[test]
    fn test_settings_follow_config() {
        let config = Config {
            resync_interval_ms: 1_000,
            busy_backoff_ms: 250,
            max_transport_retries: 2,
            ..Config::default()
        };
        let settings = ControllerSettings::from_config(&config);
        assert_eq!(settings.resync_interval, Duration::from_secs(1));
        assert_eq!(settings.failure_backoff, Duration::from_millis(250));
        assert_eq!(settings.max_transport_retries, 2);
    }
}
