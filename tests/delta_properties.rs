//! Property-based tests using proptest
//!
//! These tests check the index delta partition, set equality and the
//! one-mutation-per-pass rule over randomized index sets.

mod common;

use common::{orders_spec, FakeTableApi};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};
use tablesync::model::*;
use tablesync::reconcile::*;
use tokio_util::sync::CancellationToken;

/// Generate one index over a small pool of names and key attributes so that
/// observed and desired sets overlap often
fn arb_index() -> impl Strategy<Value = SecondaryIndexSpec> {
    (
        prop_oneof!["gsi0", "gsi1", "gsi2", "gsi3", "gsi4"],
        prop_oneof!["pk", "status", "customer"],
        prop_oneof![
            Just(ProjectionType::All),
            Just(ProjectionType::KeysOnly)
        ],
        1i64..4,
        1i64..4,
    )
        .prop_map(|(name, key, projection_type, rcu, wcu)| {
            SecondaryIndexSpec::new(&name, vec![KeySchemaElement::hash(&key)])
                .with_projection(Projection {
                    projection_type,
                    non_key_attributes: None,
                })
                .with_throughput(rcu, wcu)
        })
}

/// Generate a set of indexes with unique names
fn arb_index_set() -> impl Strategy<Value = Vec<SecondaryIndexSpec>> {
    prop::collection::vec(arb_index(), 0..6).prop_map(|indexes| {
        indexes
            .into_iter()
            .map(|i| (i.index_name.clone(), i))
            .collect::<BTreeMap<_, _>>()
            .into_values()
            .collect()
    })
}

fn names(indexes: &[SecondaryIndexSpec]) -> HashSet<String> {
    indexes.iter().map(|i| i.index_name.clone()).collect()
}

/// Apply every change of a delta at once
fn apply(observed: &[SecondaryIndexSpec], delta: &IndexDelta) -> Vec<SecondaryIndexSpec> {
    let mut result: Vec<SecondaryIndexSpec> = observed
        .iter()
        .filter(|i| !delta.removed.contains(&i.index_name))
        .map(|i| {
            delta
                .updated
                .iter()
                .find(|u| u.spec.index_name == i.index_name)
                .map(|u| u.spec.clone())
                .unwrap_or_else(|| i.clone())
        })
        .collect();
    result.extend(delta.added.iter().cloned());
    result
}

proptest! {
    /// Added, updated and removed names never overlap and come from the right side
    #[test]
    fn test_delta_partitions_names(observed in arb_index_set(), desired in arb_index_set()) {
        let delta = compute_delta(&observed, &desired);
        let observed_names = names(&observed);
        let desired_names = names(&desired);

        let added = names(&delta.added);
        let updated: HashSet<String> =
            delta.updated.iter().map(|u| u.spec.index_name.clone()).collect();
        let removed: HashSet<String> = delta.removed.iter().cloned().collect();

        prop_assert!(added.is_disjoint(&updated));
        prop_assert!(added.is_disjoint(&removed));
        prop_assert!(updated.is_disjoint(&removed));

        for name in &added {
            prop_assert!(desired_names.contains(name) && !observed_names.contains(name));
        }
        for name in &removed {
            prop_assert!(observed_names.contains(name) && !desired_names.contains(name));
        }
        for name in &updated {
            prop_assert!(observed_names.contains(name) && desired_names.contains(name));
        }
        prop_assert_eq!(delta.len(), added.len() + updated.len() + removed.len());
    }

    /// Applying the delta to the observed set yields the desired set
    #[test]
    fn test_applied_delta_reaches_desired(observed in arb_index_set(), desired in arb_index_set()) {
        let delta = compute_delta(&observed, &desired);
        let result = apply(&observed, &delta);
        prop_assert!(sets_equal(&result, &desired));
    }

    /// Set equality is reflexive, symmetric and ignores order
    #[test]
    fn test_sets_equal_properties(a in arb_index_set(), b in arb_index_set()) {
        prop_assert!(sets_equal(&a, &a));
        prop_assert_eq!(sets_equal(&a, &b), sets_equal(&b, &a));

        let mut reversed = a.clone();
        reversed.reverse();
        prop_assert!(sets_equal(&a, &reversed));
    }

    /// With no scalar drift, the plan is a creation whenever something is added
    #[test]
    fn test_plan_prefers_creation(observed in arb_index_set(), desired in arb_index_set()) {
        let delta = compute_delta(&observed, &desired);
        let intent = plan(Classification::Stable, &ScalarDelta::default(), &delta);

        if let Some(first) = delta.added.first() {
            prop_assert_eq!(intent, MutationIntent::CreateIndex(first.clone()));
        } else if delta.is_empty() {
            prop_assert_eq!(intent, MutationIntent::NoOp);
        } else {
            prop_assert!(intent.is_index_mutation());
        }
    }

    /// A pass submits at most one mutation, and none once the indexes match
    #[test]
    fn test_single_mutation_per_pass(observed in arb_index_set(), desired in arb_index_set()) {
        let mut current = orders_spec();
        current.global_secondary_indexes = observed;
        let mut wanted = orders_spec();
        wanted.global_secondary_indexes = desired.clone();

        let api = FakeTableApi::new()
            .frozen()
            .with_table(ObservedTable::from_spec(&current, TableStatus::Active));
        let reconciler = Reconciler::new(api, ReconcileSettings::immediate());
        let signal = tokio_test::block_on(
            reconciler.reconcile_once(&wanted, &CancellationToken::new()),
        );

        let submitted = reconciler.api().submitted();
        prop_assert!(submitted.len() <= 1);
        if sets_equal(&current.global_secondary_indexes, &desired) {
            prop_assert_eq!(signal, ControlSignal::Converged);
            prop_assert!(submitted.is_empty());
        } else {
            prop_assert_eq!(submitted.len(), 1);
        }
    }
}
