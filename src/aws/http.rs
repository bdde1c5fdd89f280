//! HTTP utilities for DynamoDB JSON protocol calls

use super::auth::Credentials;
use super::sigv4::{self, SigningRequest, CONTENT_TYPE};
use crate::reconcile::RemoteError;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

const TARGET_PREFIX: &str = "DynamoDB_20120810";
const SERVICE: &str = "dynamodb";

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Pull `__type` and `message` out of an error body
fn parse_error_body(body: &str) -> (String, String) {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return (String::new(), sanitize_for_log(body));
    };
    let code = value
        .get("__type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    // The service is inconsistent about the casing of this field
    let message = value
        .get("message")
        .or_else(|| value.get("Message"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    (code, message)
}

/// Signed HTTP client for one DynamoDB endpoint
#[derive(Clone)]
pub struct DynamoDbHttp {
    client: Client,
    endpoint: Url,
    host: String,
    region: String,
    credentials: Credentials,
}

impl DynamoDbHttp {
    /// Create a new HTTP client
    pub fn new(
        endpoint: Url,
        region: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => anyhow::bail!("Endpoint '{}' has no host", endpoint),
        };

        let client = Client::builder()
            .user_agent(concat!("tablesync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            host,
            region: region.to_string(),
            credentials,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// POST one operation, e.g. `DescribeTable`, and return the response JSON
    pub async fn call<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        body: &B,
    ) -> Result<Value, RemoteError> {
        let target = format!("{}.{}", TARGET_PREFIX, operation);
        let payload = serde_json::to_vec(body)
            .map_err(|e| RemoteError::Transport(format!("failed to encode request: {}", e)))?;

        let signed = sigv4::sign(
            &self.credentials,
            &SigningRequest {
                host: &self.host,
                region: &self.region,
                service: SERVICE,
                target: &target,
                body: &payload,
            },
            chrono::Utc::now(),
        );

        tracing::debug!("POST {} {}", self.endpoint, operation);

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("content-type", CONTENT_TYPE)
            .header("x-amz-target", &target)
            .header("x-amz-date", &signed.amz_date)
            .header("authorization", &signed.authorization);
        if let Some(token) = &signed.security_token {
            request = request.header("x-amz-security-token", token);
        }

        let response = request.body(payload).send().await.map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::debug!("API error: {} - {}", status, sanitize_for_log(&body));
            let (code, message) = parse_error_body(&body);
            return Err(RemoteError::from_service(status.as_u16(), &code, &message));
        }

        // Handle empty response
        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body)
            .map_err(|e| RemoteError::Transport(format!("failed to parse response JSON: {}", e)))
    }
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        return RemoteError::Transport("request timed out".to_string());
    }
    RemoteError::Transport(err.to_string())
}

/// Format a remote error for display
/// Security: Sanitizes error messages to avoid leaking request details
pub fn format_remote_error(error: &RemoteError) -> String {
    match error {
        RemoteError::Auth { .. } => {
            "Authentication failed. Check your AWS credentials and IAM permissions.".to_string()
        }
        RemoteError::Throttled { .. } => {
            "Rate limit exceeded. Please try again later.".to_string()
        }
        RemoteError::Conflict { .. } => {
            "Table is busy with another operation. It will be retried.".to_string()
        }
        RemoteError::Unavailable { .. } => {
            "DynamoDB service temporarily unavailable. Please try again.".to_string()
        }
        RemoteError::Timeout(_) | RemoteError::Transport(_) => {
            "Request failed. Check your network connection and endpoint.".to_string()
        }
        RemoteError::Invalid { message, .. } => {
            // Validation messages are the useful part; keep them short
            let sanitized = message
                .chars()
                .filter(|c| c.is_ascii_graphic() || *c == ' ')
                .take(120)
                .collect::<String>();
            if sanitized.len() < message.len() {
                format!("Invalid request: {}...", sanitized)
            } else {
                format!("Invalid request: {}", sanitized)
            }
        }
    }
}
