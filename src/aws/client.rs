//! DynamoDB Client
//!
//! Main client for the table service, combining credentials, signing and
//! the request payloads into a [`TableApi`].

use super::auth::Credentials;
use super::http::DynamoDbHttp;
use super::payload::{create_table_input, update_table_input, DescribeTableOutput};
use crate::model::{ObservedTable, TableSpec};
use crate::reconcile::{MutationIntent, RemoteError, TableApi};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use url::Url;

/// Public endpoint for a region
pub fn default_endpoint(region: &str) -> String {
    format!("https://dynamodb.{}.amazonaws.com", region)
}

/// Main DynamoDB client
#[derive(Clone)]
pub struct DynamoDbClient {
    pub http: DynamoDbHttp,
}

impl DynamoDbClient {
    /// Create a client for `region`, optionally against a custom endpoint
    /// (DynamoDB Local, a proxy, a mock server).
    pub fn new(
        region: &str,
        endpoint: Option<&str>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = endpoint
            .map(str::to_string)
            .unwrap_or_else(|| default_endpoint(region));
        let url = Url::parse(&endpoint)
            .with_context(|| format!("Invalid endpoint URL '{}'", endpoint))?;

        let http = DynamoDbHttp::new(url, region, credentials, timeout)?;
        tracing::debug!("DynamoDB client for {} at {}", region, endpoint);
        Ok(Self { http })
    }

    pub fn region(&self) -> &str {
        self.http.region()
    }
}

#[async_trait]
impl TableApi for DynamoDbClient {
    async fn describe_table(&self, table_name: &str) -> Result<Option<ObservedTable>, RemoteError> {
        let response = match self
            .http
            .call("DescribeTable", &json!({ "TableName": table_name }))
            .await
        {
            Ok(response) => response,
            Err(RemoteError::Conflict { code, .. }) if code == "ResourceNotFoundException" => {
                return Ok(None)
            }
            Err(err) => return Err(err),
        };

        let output: DescribeTableOutput = serde_json::from_value(response).map_err(|e| {
            RemoteError::Transport(format!("unexpected DescribeTable response: {}", e))
        })?;
        Ok(Some(ObservedTable::from(output.table)))
    }

    async fn update_table(
        &self,
        desired: &TableSpec,
        intent: &MutationIntent,
    ) -> Result<(), RemoteError> {
        let Some(input) = update_table_input(desired, intent) else {
            return Ok(());
        };
        self.http.call("UpdateTable", &input).await?;
        Ok(())
    }

    async fn create_table(&self, desired: &TableSpec) -> Result<(), RemoteError> {
        self.http
            .call("CreateTable", &create_table_input(desired))
            .await?;
        Ok(())
    }
}
