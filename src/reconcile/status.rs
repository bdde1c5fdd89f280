//! Status Classifier
//!
//! Maps the observed table lifecycle status onto the three states the
//! reconciler cares about: stable (mutations allowed), transient (wait and
//! look again) and terminal (never mutate).

use crate::model::{ObservedTable, TableStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    Creating,
    Updating,
    Deleting,
    /// Table is ACTIVE but one of its indexes is still creating, updating or
    /// deleting (e.g. backfilling)
    IndexTransition,
    /// Status missing or not recognized
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    Archiving,
    Archived,
    InaccessibleKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Stable,
    Transient(TransientKind),
    Terminal(TerminalKind),
}

impl Classification {
    pub fn is_stable(&self) -> bool {
        matches!(self, Self::Stable)
    }
}

/// Classify an observed table
pub fn classify(observed: &ObservedTable) -> Classification {
    classify_with_hint(observed, false)
}

/// Classify an observed table.
///
/// `recently_created` must only be set when the caller itself created the
/// table and the service has not reported a status yet; it is the only case
/// where a missing status is treated as stable.
pub fn classify_with_hint(observed: &ObservedTable, recently_created: bool) -> Classification {
    let table = classify_status(observed.table_status.as_ref(), recently_created);
    if table.is_stable() && observed.transitioning_index().is_some() {
        return Classification::Transient(TransientKind::IndexTransition);
    }
    table
}

/// Map a raw table status to a classification
pub fn classify_status(status: Option<&TableStatus>, recently_created: bool) -> Classification {
    use Classification::*;

    let Some(status) = status else {
        return if recently_created {
            Stable
        } else {
            Transient(TransientKind::Unknown)
        };
    };

    match status {
        TableStatus::Active => Stable,
        TableStatus::Creating => Transient(TransientKind::Creating),
        TableStatus::Updating => Transient(TransientKind::Updating),
        TableStatus::Deleting => Transient(TransientKind::Deleting),
        TableStatus::Archiving => Terminal(TerminalKind::Archiving),
        TableStatus::Archived => Terminal(TerminalKind::Archived),
        TableStatus::InaccessibleEncryptionCredentials => Terminal(TerminalKind::InaccessibleKey),
        TableStatus::Unknown(_) => Transient(TransientKind::Unknown),
    }
}

/// Human readable reason for a non-stable classification
pub fn describe(observed: &ObservedTable, classification: Classification) -> String {
    match classification {
        Classification::Stable => "table is active".to_string(),
        Classification::Transient(TransientKind::Creating) => {
            "table is currently being created".to_string()
        }
        Classification::Transient(TransientKind::Updating) => {
            "table is currently being updated".to_string()
        }
        Classification::Transient(TransientKind::Deleting) => {
            "table is currently being deleted".to_string()
        }
        Classification::Transient(TransientKind::IndexTransition) => {
            match observed.transitioning_index() {
                Some(index) => format!(
                    "index '{}' is in '{}' status",
                    index.spec.index_name,
                    index
                        .index_status
                        .as_ref()
                        .map(|s| s.as_str())
                        .unwrap_or("UNKNOWN")
                ),
                None => "an index is changing".to_string(),
            }
        }
        Classification::Transient(TransientKind::Unknown) => match &observed.table_status {
            Some(status) => format!("table status '{}' is not recognized", status),
            None => "table status has not been reported yet".to_string(),
        },
        Classification::Terminal(_) => format!(
            "table is in '{}' status",
            observed
                .table_status
                .as_ref()
                .map(|s| s.as_str())
                .unwrap_or("UNKNOWN")
        ),
    }
}
