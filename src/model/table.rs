//! Desired and observed table shapes

use super::enums::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: KeyType,
}

impl KeySchemaElement {
    pub fn hash(name: &str) -> Self {
        Self {
            attribute_name: name.to_string(),
            key_type: KeyType::Hash,
        }
    }

    pub fn range(name: &str) -> Self {
        Self {
            attribute_name: name.to_string(),
            key_type: KeyType::Range,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: ScalarAttributeType,
}

/// Read/write capacity units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedThroughput {
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

impl ProvisionedThroughput {
    pub fn new(read_capacity_units: i64, write_capacity_units: i64) -> Self {
        Self {
            read_capacity_units,
            write_capacity_units,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub projection_type: ProjectionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_key_attributes: Option<Vec<String>>,
}

impl Projection {
    pub fn all() -> Self {
        Self {
            projection_type: ProjectionType::All,
            non_key_attributes: None,
        }
    }

    /// Non-key attributes, treating an absent list as empty
    pub fn non_key_attributes(&self) -> &[String] {
        self.non_key_attributes.as_deref().unwrap_or(&[])
    }
}

/// A global secondary index. Identity is the index name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryIndexSpec {
    pub index_name: String,
    pub key_schema: Vec<KeySchemaElement>,
    pub projection: Projection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioned_throughput: Option<ProvisionedThroughput>,
}

impl SecondaryIndexSpec {
    pub fn new(name: &str, key_schema: Vec<KeySchemaElement>) -> Self {
        Self {
            index_name: name.to_string(),
            key_schema,
            projection: Projection::all(),
            provisioned_throughput: None,
        }
    }

    pub fn with_throughput(mut self, rcu: i64, wcu: i64) -> Self {
        self.provisioned_throughput = Some(ProvisionedThroughput::new(rcu, wcu));
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSpecification {
    pub stream_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_view_type: Option<StreamViewType>,
}

impl StreamSpecification {
    pub fn disabled() -> Self {
        Self {
            stream_enabled: false,
            stream_view_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SseSpecification {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sse_type: Option<SseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_master_key_id: Option<String>,
}

/// Encryption settings as reported by the service
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseDescription {
    pub status: Option<SseStatus>,
    pub sse_type: Option<SseType>,
    pub kms_master_key_arn: Option<String>,
}

/// Declared configuration for one table.
///
/// Optional scalar fields left unset are not managed: they are never compared
/// against the service and never sent in an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSpec {
    pub table_name: String,
    pub key_schema: Vec<KeySchemaElement>,
    #[serde(default)]
    pub attribute_definitions: Vec<AttributeDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_mode: Option<BillingMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioned_throughput: Option<ProvisionedThroughput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_specification: Option<StreamSpecification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sse_specification: Option<SseSpecification>,
    #[serde(default)]
    pub global_secondary_indexes: Vec<SecondaryIndexSpec>,
}

/// A manifest that the service would reject, or that would make the delta
/// computation ambiguous
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("table name must not be empty")]
    EmptyTableName,
    #[error("table '{0}' must declare a HASH key as its first key schema element")]
    MissingHashKey(String),
    #[error("duplicate global secondary index name '{0}'")]
    DuplicateIndex(String),
    #[error("index '{0}' must declare a HASH key as its first key schema element")]
    IndexMissingHashKey(String),
    #[error("index '{0}': nonKeyAttributes are only allowed with an INCLUDE projection")]
    UnexpectedNonKeyAttributes(String),
    #[error("index '{0}' requires provisionedThroughput under PROVISIONED billing")]
    IndexMissingThroughput(String),
    #[error("index '{0}' must not declare provisionedThroughput under PAY_PER_REQUEST billing")]
    OnDemandIndexThroughput(String),
    #[error("table '{0}' enables a stream without a streamViewType")]
    MissingStreamViewType(String),
    #[error("key attribute '{0}' has no attribute definition")]
    UndefinedKeyAttribute(String),
}

fn starts_with_hash(key_schema: &[KeySchemaElement]) -> bool {
    key_schema
        .first()
        .map(|k| k.key_type == KeyType::Hash)
        .unwrap_or(false)
}

impl TableSpec {
    pub fn new(table_name: &str, key_schema: Vec<KeySchemaElement>) -> Self {
        Self {
            table_name: table_name.to_string(),
            key_schema,
            attribute_definitions: Vec::new(),
            billing_mode: None,
            provisioned_throughput: None,
            stream_specification: None,
            sse_specification: None,
            global_secondary_indexes: Vec::new(),
        }
    }

    /// Check the invariants the reconciler relies on
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.table_name.trim().is_empty() {
            return Err(SpecError::EmptyTableName);
        }
        if !starts_with_hash(&self.key_schema) {
            return Err(SpecError::MissingHashKey(self.table_name.clone()));
        }

        let mut seen = HashSet::new();
        for index in &self.global_secondary_indexes {
            if !seen.insert(index.index_name.as_str()) {
                return Err(SpecError::DuplicateIndex(index.index_name.clone()));
            }
            if !starts_with_hash(&index.key_schema) {
                return Err(SpecError::IndexMissingHashKey(index.index_name.clone()));
            }
            if index.projection.projection_type != ProjectionType::Include
                && !index.projection.non_key_attributes().is_empty()
            {
                return Err(SpecError::UnexpectedNonKeyAttributes(index.index_name.clone()));
            }
            match self.billing_mode {
                Some(BillingMode::Provisioned) if index.provisioned_throughput.is_none() => {
                    return Err(SpecError::IndexMissingThroughput(index.index_name.clone()));
                }
                Some(BillingMode::PayPerRequest) if index.provisioned_throughput.is_some() => {
                    return Err(SpecError::OnDemandIndexThroughput(index.index_name.clone()));
                }
                _ => {}
            }
        }

        if let Some(stream) = &self.stream_specification {
            if stream.stream_enabled && stream.stream_view_type.is_none() {
                return Err(SpecError::MissingStreamViewType(self.table_name.clone()));
            }
        }

        // Only checked when the manifest declares definitions at all; an
        // empty list means "leave attribute definitions to the service".
        if !self.attribute_definitions.is_empty() {
            for key in self.key_attribute_names() {
                if self.attribute_definition(key).is_none() {
                    return Err(SpecError::UndefinedKeyAttribute(key.to_string()));
                }
            }
        }

        Ok(())
    }

    pub fn attribute_definition(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attribute_definitions
            .iter()
            .find(|d| d.attribute_name == name)
    }

    /// Every attribute used as a key by the table or one of its indexes
    pub fn key_attribute_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        let table_keys = self.key_schema.iter();
        let index_keys = self
            .global_secondary_indexes
            .iter()
            .flat_map(|i| i.key_schema.iter());
        for key in table_keys.chain(index_keys) {
            if !names.contains(&key.attribute_name.as_str()) {
                names.push(&key.attribute_name);
            }
        }
        names
    }

    pub fn index(&self, name: &str) -> Option<&SecondaryIndexSpec> {
        self.global_secondary_indexes
            .iter()
            .find(|i| i.index_name == name)
    }
}

/// A global secondary index as reported by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedIndex {
    pub spec: SecondaryIndexSpec,
    pub index_status: Option<IndexStatus>,
}

/// Last-known state of a table. Fetched fresh for every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedTable {
    pub table_name: String,
    pub key_schema: Vec<KeySchemaElement>,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub billing_mode: Option<BillingMode>,
    pub provisioned_throughput: Option<ProvisionedThroughput>,
    pub stream_specification: Option<StreamSpecification>,
    pub sse_description: Option<SseDescription>,
    pub global_secondary_indexes: Vec<ObservedIndex>,
    pub table_status: Option<TableStatus>,
    pub table_arn: Option<String>,
    pub item_count: Option<i64>,
}

impl ObservedTable {
    /// The table the service would report right after applying `spec`
    pub fn from_spec(spec: &TableSpec, status: TableStatus) -> Self {
        let sse_description = spec.sse_specification.as_ref().map(|sse| SseDescription {
            status: Some(if sse.enabled {
                SseStatus::Enabled
            } else {
                SseStatus::Disabled
            }),
            sse_type: sse.sse_type,
            kms_master_key_arn: sse.kms_master_key_id.clone(),
        });

        Self {
            table_name: spec.table_name.clone(),
            key_schema: spec.key_schema.clone(),
            attribute_definitions: spec.attribute_definitions.clone(),
            billing_mode: spec.billing_mode,
            provisioned_throughput: spec.provisioned_throughput,
            stream_specification: spec.stream_specification.clone(),
            sse_description,
            global_secondary_indexes: spec
                .global_secondary_indexes
                .iter()
                .map(|index| ObservedIndex {
                    spec: index.clone(),
                    index_status: Some(IndexStatus::Active),
                })
                .collect(),
            table_status: Some(status),
            table_arn: None,
            item_count: None,
        }
    }

    pub fn index_specs(&self) -> Vec<SecondaryIndexSpec> {
        self.global_secondary_indexes
            .iter()
            .map(|i| i.spec.clone())
            .collect()
    }

    /// Billing mode, with the service's implicit default applied
    pub fn effective_billing_mode(&self) -> BillingMode {
        self.billing_mode.unwrap_or(BillingMode::Provisioned)
    }

    /// First index that is not ACTIVE, if any
    pub fn transitioning_index(&self) -> Option<&ObservedIndex> {
        self.global_secondary_indexes.iter().find(|i| {
            i.index_status
                .as_ref()
                .map(|s| !s.is_active())
                .unwrap_or(false)
        })
    }
}
