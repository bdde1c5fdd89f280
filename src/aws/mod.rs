//! AWS API interaction module
//!
//! This module talks to DynamoDB over its JSON protocol: credential
//! resolution, request signing, HTTP transport and payload mapping.
//!
//! # Module Structure
//!
//! - [`auth`] - Credentials and default region from env / shared files
//! - [`sigv4`] - Signature Version 4
//! - [`http`] - Signed HTTP transport and error mapping
//! - [`payload`] - Wire types for DescribeTable / UpdateTable / CreateTable
//! - [`client`] - [`DynamoDbClient`](client::DynamoDbClient), the production `TableApi`
//!
//! # Example
//!
//! ```ignore
//! use tablesync::aws::{auth::Credentials, client::DynamoDbClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let credentials = Credentials::resolve(None)?;
//!     let client = DynamoDbClient::new("us-east-1", None, credentials, Duration::from_secs(10))?;
//!     let table = client.describe_table("orders").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod payload;
pub mod sigv4;
