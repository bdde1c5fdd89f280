//! Status Reporting
//!
//! Where the controller records what each pass concluded. The reconciler
//! only produces a [`ControlSignal`](crate::reconcile::ControlSignal); the
//! sink decides how that is surfaced.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// Receives the outcome of every pass
pub trait StatusSink: Send + Sync {
    fn report_synced(&self, table: &str);

    /// The table will be looked at again after `after`
    fn schedule_retry(&self, table: &str, after: Duration, reason: &str);

    /// The table is in a phase no mutation can fix
    fn report_terminal(&self, table: &str, reason: &str);

    /// A pass failed; `will_retry` tells whether the controller keeps going
    fn report_failure(&self, table: &str, error: &str, will_retry: bool);
}

/// Kind of a recorded condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionKind {
    Synced,
    Retry { after: Duration },
    Terminal,
    Failure { will_retry: bool },
}

impl ConditionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Retry { .. } => "retry",
            Self::Terminal => "terminal",
            Self::Failure { .. } => "failure",
        }
    }
}

/// A single condition entry
#[derive(Debug, Clone)]
pub struct Condition {
    pub id: Uuid,
    pub table: String,
    pub kind: ConditionKind,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

impl Condition {
    fn new(table: &str, kind: ConditionKind, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            table: table.to_string(),
            kind,
            message,
            recorded_at: Utc::now(),
        }
    }
}

/// Bounded, in-memory history of conditions, most recent first.
/// Every entry is mirrored to `tracing`.
pub struct ConditionLog {
    entries: Mutex<VecDeque<Condition>>,
    max_history: usize,
}

impl Default for ConditionLog {
    fn default() -> Self {
        Self::new(200)
    }
}

impl ConditionLog {
    pub fn new(max_history: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_history: max_history.max(1),
        }
    }

    fn push(&self, condition: Condition) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            // A panicked writer cannot leave the deque half-updated
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push_front(condition);
        entries.truncate(self.max_history);
    }

    fn snapshot(&self) -> Vec<Condition> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    /// All entries, most recent first
    pub fn entries(&self) -> Vec<Condition> {
        self.snapshot()
    }

    /// Most recent entry for `table`
    pub fn latest(&self, table: &str) -> Option<Condition> {
        self.snapshot().into_iter().find(|c| c.table == table)
    }

    /// Entries for `table`, most recent first
    pub fn history(&self, table: &str) -> Vec<Condition> {
        self.snapshot()
            .into_iter()
            .filter(|c| c.table == table)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StatusSink for ConditionLog {
    fn report_synced(&self, table: &str) {
        tracing::info!(table, "table in sync");
        self.push(Condition::new(
            table,
            ConditionKind::Synced,
            "table matches the manifest".to_string(),
        ));
    }

    fn schedule_retry(&self, table: &str, after: Duration, reason: &str) {
        tracing::info!(table, ?after, reason, "requeue");
        self.push(Condition::new(
            table,
            ConditionKind::Retry { after },
            reason.to_string(),
        ));
    }

    fn report_terminal(&self, table: &str, reason: &str) {
        tracing::warn!(table, reason, "table in terminal status");
        self.push(Condition::new(
            table,
            ConditionKind::Terminal,
            reason.to_string(),
        ));
    }

    fn report_failure(&self, table: &str, error: &str, will_retry: bool) {
        if will_retry {
            tracing::warn!(table, error, "pass failed, will retry");
        } else {
            tracing::error!(table, error, "pass failed, giving up");
        }
        self.push(Condition::new(
            table,
            ConditionKind::Failure { will_retry },
            error.to_string(),
        ));
    }
}
