//! In-memory table service shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tablesync::model::*;
use tablesync::reconcile::{MutationIntent, RemoteError, TableApi};
use tokio_util::sync::CancellationToken;

/// A call the fake received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Describe(String),
    Update(String, MutationIntent),
    Create(String),
}

/// Fake table service. Accepted mutations take effect immediately unless
/// `apply_mutations` is off.
pub struct FakeTableApi {
    tables: Mutex<HashMap<String, ObservedTable>>,
    calls: Mutex<Vec<Call>>,
    describe_failures: Mutex<VecDeque<RemoteError>>,
    update_failures: Mutex<VecDeque<RemoteError>>,
    always_fail_describe: Mutex<Option<RemoteError>>,
    cancel_on_describe: Mutex<Option<(usize, CancellationToken)>>,
    hang_describe: bool,
    pub apply_mutations: bool,
}

impl Default for FakeTableApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTableApi {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            describe_failures: Mutex::new(VecDeque::new()),
            update_failures: Mutex::new(VecDeque::new()),
            always_fail_describe: Mutex::new(None),
            cancel_on_describe: Mutex::new(None),
            hang_describe: false,
            apply_mutations: true,
        }
    }

    pub fn with_table(self, table: ObservedTable) -> Self {
        self.tables
            .lock()
            .unwrap()
            .insert(table.table_name.clone(), table);
        self
    }

    /// DescribeTable never completes
    pub fn hanging() -> Self {
        Self {
            hang_describe: true,
            ..Self::new()
        }
    }

    pub fn frozen(mut self) -> Self {
        self.apply_mutations = false;
        self
    }

    pub fn fail_next_update(&self, err: RemoteError) {
        self.update_failures.lock().unwrap().push_back(err);
    }

    pub fn fail_next_describe(&self, err: RemoteError) {
        self.describe_failures.lock().unwrap().push_back(err);
    }

    pub fn fail_every_describe(&self, err: RemoteError) {
        *self.always_fail_describe.lock().unwrap() = Some(err);
    }

    /// Cancel `token` while serving the `nth` DescribeTable (1-based)
    pub fn cancel_on_describe(&self, nth: usize, token: CancellationToken) {
        *self.cancel_on_describe.lock().unwrap() = Some((nth, token));
    }

    pub fn table(&self, name: &str) -> Option<ObservedTable> {
        self.tables.lock().unwrap().get(name).cloned()
    }

    pub fn set_table(&self, table: ObservedTable) {
        self.tables
            .lock()
            .unwrap()
            .insert(table.table_name.clone(), table);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn describe_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Describe(_)))
            .count()
    }

    /// Submitted intents, in order
    pub fn submitted(&self) -> Vec<MutationIntent> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Update(_, intent) => Some(intent),
                _ => None,
            })
            .collect()
    }

    fn apply(table: &mut ObservedTable, desired: &TableSpec, intent: &MutationIntent) {
        match intent {
            MutationIntent::NoOp => {}
            MutationIntent::ModifyScalarFields(update) => {
                if let Some(defs) = &update.attribute_definitions {
                    for def in defs {
                        if let Some(current) = table
                            .attribute_definitions
                            .iter_mut()
                            .find(|d| d.attribute_name == def.attribute_name)
                        {
                            *current = def.clone();
                        }
                    }
                }
                if let Some(mode) = update.billing_mode {
                    table.billing_mode = Some(mode);
                    if mode == BillingMode::PayPerRequest {
                        table.provisioned_throughput = None;
                        for index in &mut table.global_secondary_indexes {
                            index.spec.provisioned_throughput = None;
                        }
                    }
                }
                if let Some(tp) = update.provisioned_throughput {
                    table.provisioned_throughput = Some(tp);
                }
                for (name, tp) in &update.index_throughput {
                    if let Some(index) = table
                        .global_secondary_indexes
                        .iter_mut()
                        .find(|i| &i.spec.index_name == name)
                    {
                        index.spec.provisioned_throughput = Some(*tp);
                    }
                }
                if let Some(stream) = &update.stream_specification {
                    table.stream_specification = Some(stream.clone());
                }
                if let Some(sse) = &update.sse_specification {
                    table.sse_description = Some(SseDescription {
                        status: Some(if sse.enabled {
                            SseStatus::Enabled
                        } else {
                            SseStatus::Disabled
                        }),
                        sse_type: sse.sse_type,
                        kms_master_key_arn: sse.kms_master_key_id.as_ref().map(|key| {
                            format!("arn:aws:kms:us-east-1:111122223333:key/{}", key)
                        }),
                    });
                }
            }
            MutationIntent::UpdateThroughput(tp) => table.provisioned_throughput = Some(*tp),
            MutationIntent::CreateIndex(index) => {
                for key in &index.key_schema {
                    let known = table
                        .attribute_definitions
                        .iter()
                        .any(|d| d.attribute_name == key.attribute_name);
                    if !known {
                        if let Some(def) = desired.attribute_definition(&key.attribute_name) {
                            table.attribute_definitions.push(def.clone());
                        }
                    }
                }
                table.global_secondary_indexes.push(ObservedIndex {
                    spec: index.clone(),
                    index_status: Some(IndexStatus::Active),
                });
            }
            MutationIntent::UpdateIndex { name, throughput } => {
                if let Some(index) = table
                    .global_secondary_indexes
                    .iter_mut()
                    .find(|i| &i.spec.index_name == name)
                {
                    index.spec.provisioned_throughput = Some(*throughput);
                }
            }
            MutationIntent::DeleteIndex { name } => {
                table
                    .global_secondary_indexes
                    .retain(|i| &i.spec.index_name != name);
            }
        }
    }
}

#[async_trait]
impl TableApi for FakeTableApi {
    async fn describe_table(&self, table_name: &str) -> Result<Option<ObservedTable>, RemoteError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Describe(table_name.to_string()));
        let count = self.describe_count();

        if let Some((nth, token)) = self.cancel_on_describe.lock().unwrap().as_ref() {
            if count >= *nth {
                token.cancel();
            }
        }
        if self.hang_describe {
            std::future::pending::<()>().await;
        }
        if let Some(err) = self.always_fail_describe.lock().unwrap().clone() {
            return Err(err);
        }
        if let Some(err) = self.describe_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        Ok(self.table(table_name))
    }

    async fn update_table(
        &self,
        desired: &TableSpec,
        intent: &MutationIntent,
    ) -> Result<(), RemoteError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Update(desired.table_name.clone(), intent.clone()));
        if let Some(err) = self.update_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        if self.apply_mutations {
            let mut tables = self.tables.lock().unwrap();
            if let Some(table) = tables.get_mut(&desired.table_name) {
                Self::apply(table, desired, intent);
            }
        }
        Ok(())
    }

    async fn create_table(&self, desired: &TableSpec) -> Result<(), RemoteError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Create(desired.table_name.clone()));
        if self.apply_mutations {
            self.set_table(ObservedTable::from_spec(desired, TableStatus::Active));
        }
        Ok(())
    }
}

/// `orders` keyed on `pk`, with attribute definitions for `pk`, `status`
/// and `customer`
pub fn orders_spec() -> TableSpec {
    let mut spec = TableSpec::new("orders", vec![KeySchemaElement::hash("pk")]);
    spec.attribute_definitions = ["pk", "status", "customer"]
        .iter()
        .map(|name| AttributeDefinition {
            attribute_name: name.to_string(),
            attribute_type: ScalarAttributeType::String,
        })
        .collect();
    spec
}

pub fn index(name: &str, key: &str, rcu: i64, wcu: i64) -> SecondaryIndexSpec {
    SecondaryIndexSpec::new(name, vec![KeySchemaElement::hash(key)]).with_throughput(rcu, wcu)
}

pub fn conflict() -> RemoteError {
    RemoteError::from_service(
        400,
        "com.amazonaws.dynamodb.v20120810#ResourceInUseException",
        "Attempt to change a resource which is still in use",
    )
}

pub fn throttled() -> RemoteError {
    RemoteError::from_service(400, "ThrottlingException", "Rate of requests exceeds the allowed throughput")
}
