//! tablesync
//!
//! Keeps DynamoDB tables converged on declarative manifests: classifies the
//! observed table, diffs it against the manifest and submits one corrective
//! mutation per pass.

pub mod aws;
pub mod config;
pub mod controller;
pub mod manifest;
pub mod model;
pub mod reconcile;
pub mod report;

/// Version injected at compile time via TABLESYNC_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("TABLESYNC_VERSION") {
    Some(v) => v,
    None => "dev",
};
