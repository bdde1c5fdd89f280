//! Set-Delta Engine
//!
//! Compares the observed and desired global secondary indexes by name.

use crate::model::{BillingMode, ObservedTable, SecondaryIndexSpec, TableSpec};
use std::collections::HashSet;

/// An index present on both sides whose desired definition differs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexUpdate {
    /// Desired definition of the index
    pub spec: SecondaryIndexSpec,
    /// True when only the provisioned throughput differs, i.e. the change
    /// can be applied in place
    pub throughput_only: bool,
}

/// Added / updated / removed partitions between two index collections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDelta {
    pub added: Vec<SecondaryIndexSpec>,
    pub updated: Vec<IndexUpdate>,
    /// Names of observed indexes that are no longer desired
    pub removed: Vec<String>,
}

impl IndexDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }
}

/// Compute the delta that takes `observed` to `desired`.
///
/// Index names must be unique within each collection.
pub fn compute_delta(
    observed: &[SecondaryIndexSpec],
    desired: &[SecondaryIndexSpec],
) -> IndexDelta {
    let mut delta = IndexDelta::default();
    let mut visited: HashSet<&str> = HashSet::with_capacity(observed.len());

    for current in observed {
        visited.insert(current.index_name.as_str());
        match desired.iter().find(|d| d.index_name == current.index_name) {
            Some(wanted) if !indexes_equal(current, wanted) => delta.updated.push(IndexUpdate {
                spec: wanted.clone(),
                throughput_only: same_structure(current, wanted),
            }),
            Some(_) => {}
            None => delta.removed.push(current.index_name.clone()),
        }
    }

    delta.added = desired
        .iter()
        .filter(|d| !visited.contains(d.index_name.as_str()))
        .cloned()
        .collect();

    delta
}

/// True when both collections describe the same indexes, regardless of order
pub fn sets_equal(a: &[SecondaryIndexSpec], b: &[SecondaryIndexSpec]) -> bool {
    compute_delta(a, b).is_empty()
}

/// Deep comparison of two index definitions (name excluded).
///
/// Throughput present on one side only counts as a difference. Key schema
/// and non-key attributes are compared in order.
pub fn indexes_equal(a: &SecondaryIndexSpec, b: &SecondaryIndexSpec) -> bool {
    a.provisioned_throughput == b.provisioned_throughput && same_structure(a, b)
}

/// Key schema and projection match; these cannot be changed in place
fn same_structure(a: &SecondaryIndexSpec, b: &SecondaryIndexSpec) -> bool {
    a.projection.projection_type == b.projection.projection_type
        && a.projection.non_key_attributes() == b.projection.non_key_attributes()
        && a.key_schema == b.key_schema
}

/// Index delta between an observed and a desired table.
///
/// Under on-demand billing the service reports no index throughput and
/// rejects updates to it, so throughput is left out of the comparison.
pub fn table_index_delta(observed: &ObservedTable, desired: &TableSpec) -> IndexDelta {
    let mode = desired
        .billing_mode
        .unwrap_or_else(|| observed.effective_billing_mode());
    let current = observed.index_specs();

    match mode {
        BillingMode::Provisioned => compute_delta(&current, &desired.global_secondary_indexes),
        BillingMode::PayPerRequest => {
            let wanted = without_throughput(&desired.global_secondary_indexes);
            compute_delta(&without_throughput(&current), &wanted)
        }
    }
}

fn without_throughput(indexes: &[SecondaryIndexSpec]) -> Vec<SecondaryIndexSpec> {
    indexes
        .iter()
        .cloned()
        .map(|mut index| {
            index.provisioned_throughput = None;
            index
        })
        .collect()
}
