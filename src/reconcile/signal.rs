//! Outcome of a reconciliation pass

use super::error::ReconcileError;
use std::fmt;
use std::time::Duration;

/// What the outer loop should do after a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlSignal {
    /// Observed state matches the manifest
    Converged,
    /// The table is in a phase this controller never mutates
    Terminal { reason: String },
    /// Look again after `after`
    RetryAfter { after: Duration, reason: String },
    /// The pass failed; `cause.is_retryable()` tells transport trouble apart
    /// from requests that can never succeed
    Fatal { cause: ReconcileError },
    /// The pass was cancelled by the caller
    Cancelled,
}

impl ControlSignal {
    pub fn retry_after(after: Duration, reason: impl Into<String>) -> Self {
        Self::RetryAfter {
            after,
            reason: reason.into(),
        }
    }

    pub fn fatal(cause: impl Into<ReconcileError>) -> Self {
        Self::Fatal {
            cause: cause.into(),
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::Terminal { .. } => "terminal",
            Self::RetryAfter { .. } => "retry-after",
            Self::Fatal { .. } => "fatal",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged => write!(f, "converged"),
            Self::Terminal { reason } => write!(f, "terminal: {}", reason),
            Self::RetryAfter { after, reason } => {
                write!(f, "retry after {}ms: {}", after.as_millis(), reason)
            }
            Self::Fatal { cause } => write!(f, "fatal: {}", cause),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
