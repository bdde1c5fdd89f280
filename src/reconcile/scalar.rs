//! Scalar field drift
//!
//! Everything that is not a secondary index: attribute definitions, billing
//! mode, streams, encryption and the table's own provisioned throughput.

use crate::model::{
    AttributeDefinition, BillingMode, ObservedTable, ProvisionedThroughput, SseSpecification,
    StreamSpecification, TableSpec,
};

/// Generic structural comparison used for scalar fields
pub fn structural_equal<T: PartialEq + ?Sized>(a: &T, b: &T) -> bool {
    a == b
}

/// Scalar changes the service applies in one combined UpdateTable call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalarUpdate {
    pub attribute_definitions: Option<Vec<AttributeDefinition>>,
    pub billing_mode: Option<BillingMode>,
    /// Only set together with a switch to PROVISIONED billing, where the
    /// service requires it
    pub provisioned_throughput: Option<ProvisionedThroughput>,
    /// Throughput for each existing index, also required by the service when
    /// switching to PROVISIONED billing. Sent as in-place index updates.
    pub index_throughput: Vec<(String, ProvisionedThroughput)>,
    pub stream_specification: Option<StreamSpecification>,
    pub sse_specification: Option<SseSpecification>,
}

impl ScalarUpdate {
    pub fn is_empty(&self) -> bool {
        self.attribute_definitions.is_none()
            && self.billing_mode.is_none()
            && self.stream_specification.is_none()
            && self.sse_specification.is_none()
    }

    /// Names of the field groups this update touches
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.attribute_definitions.is_some() {
            fields.push("attributeDefinitions");
        }
        if self.billing_mode.is_some() {
            fields.push("billingMode");
        }
        if self.provisioned_throughput.is_some() {
            fields.push("provisionedThroughput");
        }
        if !self.index_throughput.is_empty() {
            fields.push("globalSecondaryIndexUpdates");
        }
        if self.stream_specification.is_some() {
            fields.push("streamSpecification");
        }
        if self.sse_specification.is_some() {
            fields.push("sseSpecification");
        }
        fields
    }
}

/// Differences between desired and observed scalar fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalarDelta {
    /// Combined-call fields, carrying the desired values to send
    pub update: ScalarUpdate,
    /// Desired table throughput, when it differs from the observed one
    pub throughput: Option<ProvisionedThroughput>,
}

impl ScalarDelta {
    pub fn compute(desired: &TableSpec, observed: &ObservedTable) -> Self {
        let billing_mode = desired
            .billing_mode
            .filter(|mode| *mode != observed.effective_billing_mode());

        let effective_mode = desired
            .billing_mode
            .unwrap_or_else(|| observed.effective_billing_mode());
        let throughput = match (effective_mode, desired.provisioned_throughput) {
            (BillingMode::Provisioned, Some(wanted))
                if !structural_equal(&Some(wanted), &observed.provisioned_throughput) =>
            {
                Some(wanted)
            }
            _ => None,
        };

        let update = ScalarUpdate {
            attribute_definitions: attribute_definition_drift(desired, observed),
            billing_mode,
            provisioned_throughput: match billing_mode {
                Some(BillingMode::Provisioned) => desired.provisioned_throughput,
                _ => None,
            },
            index_throughput: match billing_mode {
                Some(BillingMode::Provisioned) => existing_index_throughput(desired, observed),
                _ => Vec::new(),
            },
            stream_specification: stream_drift(desired, observed),
            sse_specification: sse_drift(desired, observed),
        };

        Self { update, throughput }
    }

    pub fn has_combined_changes(&self) -> bool {
        !self.update.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_combined_changes() && self.throughput.is_none()
    }
}

/// Desired throughput of every index the table already has. Indexes still to
/// be created carry their own throughput in the create call.
fn existing_index_throughput(
    desired: &TableSpec,
    observed: &ObservedTable,
) -> Vec<(String, ProvisionedThroughput)> {
    desired
        .global_secondary_indexes
        .iter()
        .filter(|index| {
            observed
                .global_secondary_indexes
                .iter()
                .any(|o| o.spec.index_name == index.index_name)
        })
        .filter_map(|index| {
            index
                .provisioned_throughput
                .map(|tp| (index.index_name.clone(), tp))
        })
        .collect()
}

/// Definitions whose type changed for an attribute both sides know about.
///
/// Attributes present on one side only follow index creation and deletion:
/// the service adds them with a new index and drops them with the last index
/// that uses them.
fn attribute_definition_drift(
    desired: &TableSpec,
    observed: &ObservedTable,
) -> Option<Vec<AttributeDefinition>> {
    let changed = desired.attribute_definitions.iter().any(|wanted| {
        observed
            .attribute_definitions
            .iter()
            .find(|d| d.attribute_name == wanted.attribute_name)
            .map(|current| !structural_equal(current, wanted))
            .unwrap_or(false)
    });
    if !changed {
        return None;
    }

    Some(
        desired
            .attribute_definitions
            .iter()
            .filter(|wanted| {
                observed
                    .attribute_definitions
                    .iter()
                    .any(|d| d.attribute_name == wanted.attribute_name)
            })
            .cloned()
            .collect(),
    )
}

/// Stream changes. The view type of an enabled stream cannot be changed in
/// place, so that case disables the stream first and the next pass
/// re-enables it with the new view type.
fn stream_drift(desired: &TableSpec, observed: &ObservedTable) -> Option<StreamSpecification> {
    let wanted = desired.stream_specification.as_ref()?;
    let current = observed
        .stream_specification
        .clone()
        .unwrap_or_else(StreamSpecification::disabled);

    match (current.stream_enabled, wanted.stream_enabled) {
        (false, false) => None,
        (true, false) | (false, true) => Some(wanted.clone()),
        (true, true) => match wanted.stream_view_type {
            Some(view) if Some(view) != current.stream_view_type => {
                Some(StreamSpecification::disabled())
            }
            _ => None,
        },
    }
}

fn sse_drift(desired: &TableSpec, observed: &ObservedTable) -> Option<SseSpecification> {
    let wanted = desired.sse_specification.as_ref()?;
    let current = observed.sse_description.clone().unwrap_or_default();
    let enabled = current.status.map(|s| s.is_enabled()).unwrap_or(false);

    if wanted.enabled != enabled {
        return Some(wanted.clone());
    }
    if !wanted.enabled {
        return None;
    }

    let type_differs = wanted
        .sse_type
        .map(|t| Some(t) != current.sse_type)
        .unwrap_or(false);
    let key_differs = wanted
        .kms_master_key_id
        .as_deref()
        .map(|key| !kms_key_matches(key, current.kms_master_key_arn.as_deref()))
        .unwrap_or(false);

    (type_differs || key_differs).then(|| wanted.clone())
}

/// A key id, alias or ARN matches the ARN reported by the service
fn kms_key_matches(wanted: &str, reported_arn: Option<&str>) -> bool {
    let Some(arn) = reported_arn else {
        return false;
    };
    arn == wanted || arn.ends_with(&format!("/{}", wanted)) || arn.ends_with(&format!(":{}", wanted))
}
