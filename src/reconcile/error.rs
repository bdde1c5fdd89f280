//! Error taxonomy for remote calls and reconciliation passes

use crate::model::SpecError;
use std::time::Duration;
use thiserror::Error;

/// A failed call to the table service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Another mutation is in flight, or the per-table limit of concurrent
    /// index operations is reached
    #[error("resource busy ({code}): {message}")]
    Conflict { code: String, message: String },

    /// The request itself is wrong; retrying reproduces the same failure
    #[error("invalid request ({code}): {message}")]
    Invalid { code: String, message: String },

    #[error("throttled ({code}): {message}")]
    Throttled { code: String, message: String },

    #[error("access denied ({code}): {message}")]
    Auth { code: String, message: String },

    #[error("service unavailable (HTTP {status}): {message}")]
    Unavailable { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl RemoteError {
    /// Classify a service error from its HTTP status and `__type` code.
    ///
    /// `code` may be fully qualified
    /// (`com.amazonaws.dynamodb.v20120810#ResourceInUseException`).
    pub fn from_service(status: u16, code: &str, message: &str) -> Self {
        let short = code.rsplit('#').next().unwrap_or(code).to_string();
        let message = message.to_string();

        match short.as_str() {
            // A missing table on update means it went away after the fetch;
            // the next pass observes that.
            "ResourceInUseException" | "LimitExceededException" | "ResourceNotFoundException" => {
                Self::Conflict {
                    code: short,
                    message,
                }
            }
            "ThrottlingException"
            | "ProvisionedThroughputExceededException"
            | "RequestLimitExceeded" => Self::Throttled {
                code: short,
                message,
            },
            "UnrecognizedClientException"
            | "AccessDeniedException"
            | "InvalidSignatureException"
            | "MissingAuthenticationTokenException"
            | "ExpiredTokenException" => Self::Auth {
                code: short,
                message,
            },
            "ValidationException" | "SerializationException" => Self::Invalid {
                code: short,
                message,
            },
            _ => match status {
                429 => Self::Throttled {
                    code: short,
                    message,
                },
                401 | 403 => Self::Auth {
                    code: short,
                    message,
                },
                s if s >= 500 => Self::Unavailable { status: s, message },
                _ => Self::Invalid {
                    code: short,
                    message,
                },
            },
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Failures the outer loop may retry with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. }
                | Self::Throttled { .. }
                | Self::Unavailable { .. }
                | Self::Transport(_)
                | Self::Timeout(_)
        )
    }
}

/// Why a reconciliation pass failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("invalid table spec: {0}")]
    InvalidSpec(#[from] SpecError),

    #[error("{operation} failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: RemoteError,
    },
}

impl ReconcileError {
    pub fn remote(operation: &'static str, source: RemoteError) -> Self {
        Self::Remote { operation, source }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidSpec(_) => false,
            Self::Remote { source, .. } => source.is_retryable(),
        }
    }
}
