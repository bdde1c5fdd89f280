//! Mutation Planner
//!
//! The service runs UpdateTable asynchronously and rejects a new structural
//! change while one is in flight, so each pass plans exactly one mutation:
//!
//! 1. nothing while the table is not stable;
//! 2. combined scalar changes (attribute definitions, billing mode, streams,
//!    encryption), never mixed with index changes;
//! 3. then, one at a time: table throughput, index creation, index update,
//!    index deletion.

use super::delta::IndexDelta;
use super::scalar::{ScalarDelta, ScalarUpdate};
use super::status::Classification;
use crate::model::{ProvisionedThroughput, SecondaryIndexSpec};
use std::fmt;

/// The single corrective action for one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationIntent {
    NoOp,
    ModifyScalarFields(ScalarUpdate),
    UpdateThroughput(ProvisionedThroughput),
    CreateIndex(SecondaryIndexSpec),
    UpdateIndex {
        name: String,
        throughput: ProvisionedThroughput,
    },
    DeleteIndex {
        name: String,
    },
}

impl MutationIntent {
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp)
    }

    /// Whether this intent changes a secondary index
    pub fn is_index_mutation(&self) -> bool {
        matches!(
            self,
            Self::CreateIndex(_) | Self::UpdateIndex { .. } | Self::DeleteIndex { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoOp => "no-op",
            Self::ModifyScalarFields(_) => "modify-scalar-fields",
            Self::UpdateThroughput(_) => "update-throughput",
            Self::CreateIndex(_) => "create-index",
            Self::UpdateIndex { .. } => "update-index",
            Self::DeleteIndex { .. } => "delete-index",
        }
    }
}

impl fmt::Display for MutationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOp => write!(f, "no-op"),
            Self::ModifyScalarFields(update) => {
                write!(f, "modify-scalar-fields({})", update.fields().join(", "))
            }
            Self::UpdateThroughput(tp) => write!(
                f,
                "update-throughput(rcu={}, wcu={})",
                tp.read_capacity_units, tp.write_capacity_units
            ),
            Self::CreateIndex(spec) => write!(f, "create-index({})", spec.index_name),
            Self::UpdateIndex { name, throughput } => write!(
                f,
                "update-index({}, rcu={}, wcu={})",
                name, throughput.read_capacity_units, throughput.write_capacity_units
            ),
            Self::DeleteIndex { name } => write!(f, "delete-index({})", name),
        }
    }
}

/// Pick the highest-priority pending change, or `NoOp`
pub fn plan(
    classification: Classification,
    scalar: &ScalarDelta,
    indexes: &IndexDelta,
) -> MutationIntent {
    if !classification.is_stable() {
        return MutationIntent::NoOp;
    }

    if scalar.has_combined_changes() {
        return MutationIntent::ModifyScalarFields(scalar.update.clone());
    }

    if let Some(throughput) = scalar.throughput {
        return MutationIntent::UpdateThroughput(throughput);
    }

    if let Some(spec) = indexes.added.first() {
        return MutationIntent::CreateIndex(spec.clone());
    }

    for update in &indexes.updated {
        let name = update.spec.index_name.clone();
        if !update.throughput_only {
            // Key schema and projection are immutable: drop the index and let
            // a later pass create it again.
            tracing::warn!(index = %name, "index definition changed, replacing index");
            return MutationIntent::DeleteIndex { name };
        }
        // Throughput removed from the manifest: nothing to send.
        if let Some(throughput) = update.spec.provisioned_throughput {
            return MutationIntent::UpdateIndex { name, throughput };
        }
    }

    if let Some(name) = indexes.removed.first() {
        return MutationIntent::DeleteIndex { name: name.clone() };
    }

    MutationIntent::NoOp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BillingMode, KeySchemaElement, Projection, ProjectionType};
    use crate::reconcile::delta::{compute_delta, IndexUpdate};
    use crate::reconcile::status::TransientKind;

    fn gsi(name: &str, rcu: i64) -> SecondaryIndexSpec {
        SecondaryIndexSpec::new(name, vec![KeySchemaElement::hash("pk")]).with_throughput(rcu, rcu)
    }

    #[test]
    fn test_not_stable_plans_nothing() {
        let delta = compute_delta(&[], &[gsi("gsi1", 5)]);
        let intent = plan(
            Classification::Transient(TransientKind::Updating),
            &ScalarDelta::default(),
            &delta,
        );
        assert_eq!(intent, MutationIntent::NoOp);
    }

    #[test]
    fn test_create_missing_index() {
        let delta = compute_delta(&[], &[gsi("gsi1", 5)]);
        let intent = plan(Classification::Stable, &ScalarDelta::default(), &delta);
        assert_eq!(intent, MutationIntent::CreateIndex(gsi("gsi1", 5)));
    }

    #[test]
    fn test_converged_is_noop() {
        let delta = compute_delta(&[gsi("gsi1", 5)], &[gsi("gsi1", 5)]);
        assert!(plan(Classification::Stable, &ScalarDelta::default(), &delta).is_noop());
    }

    #[test]
    fn test_scalar_changes_come_first() {
        let delta = compute_delta(&[gsi("gsi1", 5)], &[]);
        let scalar = ScalarDelta {
            update: ScalarUpdate {
                billing_mode: Some(BillingMode::PayPerRequest),
                ..Default::default()
            },
            throughput: None,
        };
        let intent = plan(Classification::Stable, &scalar, &delta);
        assert!(matches!(intent, MutationIntent::ModifyScalarFields(_)));
    }

    #[test]
    fn test_table_throughput_before_indexes() {
        let delta = compute_delta(&[], &[gsi("gsi1", 5)]);
        let scalar = ScalarDelta {
            update: ScalarUpdate::default(),
            throughput: Some(ProvisionedThroughput::new(7, 7)),
        };
        assert_eq!(
            plan(Classification::Stable, &scalar, &delta),
            MutationIntent::UpdateThroughput(ProvisionedThroughput::new(7, 7))
        );
    }

    #[test]
    fn test_create_before_update_before_delete() {
        let observed = vec![gsi("keep", 5), gsi("gone", 5)];
        let desired = vec![gsi("keep", 10), gsi("new", 5)];
        let mut delta = compute_delta(&observed, &desired);

        assert_eq!(
            plan(Classification::Stable, &ScalarDelta::default(), &delta),
            MutationIntent::CreateIndex(gsi("new", 5))
        );

        delta.added.clear();
        assert_eq!(
            plan(Classification::Stable, &ScalarDelta::default(), &delta),
            MutationIntent::UpdateIndex {
                name: "keep".to_string(),
                throughput: ProvisionedThroughput::new(10, 10),
            }
        );

        delta.updated.clear();
        assert_eq!(
            plan(Classification::Stable, &ScalarDelta::default(), &delta),
            MutationIntent::DeleteIndex {
                name: "gone".to_string()
            }
        );
    }

    #[test]
    fn test_structural_index_change_is_replaced() {
        let changed = gsi("gsi1", 5).with_projection(Projection {
            projection_type: ProjectionType::KeysOnly,
            non_key_attributes: None,
        });
        let delta = compute_delta(&[gsi("gsi1", 5)], &[changed]);
        assert_eq!(
            plan(Classification::Stable, &ScalarDelta::default(), &delta),
            MutationIntent::DeleteIndex {
                name: "gsi1".to_string()
            }
        );
    }

    #[test]
    fn test_unmanaged_index_throughput_is_skipped() {
        let mut spec = gsi("gsi1", 5);
        spec.provisioned_throughput = None;
        let delta = IndexDelta {
            updated: vec![IndexUpdate {
                spec,
                throughput_only: true,
            }],
            ..Default::default()
        };
        assert!(plan(Classification::Stable, &ScalarDelta::default(), &delta).is_noop());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            MutationIntent::CreateIndex(gsi("gsi1", 5)).to_string(),
            "create-index(gsi1)"
        );
        assert_eq!(MutationIntent::NoOp.kind(), "no-op");
    }
}
