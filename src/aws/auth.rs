//! AWS Credentials
//!
//! Resolves credentials and the default region from environment variables
//! or the shared `~/.aws/credentials` and `~/.aws/config` files.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Static access key credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    secret_access_key: String,
    pub session_token: Option<String>,
}

// Security: never print the secret key
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    pub fn new(access_key_id: &str, secret_access_key: &str, session_token: Option<String>) -> Self {
        Self {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token,
        }
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// Credentials from `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
    pub fn from_env() -> Option<Self> {
        let access_key_id = non_empty_env("AWS_ACCESS_KEY_ID")?;
        let secret_access_key = non_empty_env("AWS_SECRET_ACCESS_KEY")?;
        Some(Self {
            access_key_id,
            secret_access_key,
            session_token: non_empty_env("AWS_SESSION_TOKEN"),
        })
    }

    /// Credentials from a profile of the shared credentials file
    pub fn from_profile(profile: &str) -> Option<Self> {
        if !validate_profile_name(profile) {
            tracing::warn!("Invalid characters in profile name");
            return None;
        }
        let content = std::fs::read_to_string(credentials_file_path()?).ok()?;
        Self::from_profile_content(&content, profile)
    }

    fn from_profile_content(content: &str, profile: &str) -> Option<Self> {
        let section = parse_ini_section(content, profile);
        Some(Self {
            access_key_id: section.get("aws_access_key_id")?.clone(),
            secret_access_key: section.get("aws_secret_access_key")?.clone(),
            session_token: section.get("aws_session_token").cloned(),
        })
    }

    /// Environment first, then the named (or active) profile
    pub fn resolve(profile: Option<&str>) -> Result<Self> {
        if let Some(credentials) = Self::from_env() {
            tracing::debug!("Using credentials from environment");
            return Ok(credentials);
        }

        let profile = active_profile(profile);
        let credentials = Self::from_profile(&profile).with_context(|| {
            format!(
                "No AWS credentials found. Set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY \
                 or add profile '{}' to the shared credentials file",
                profile
            )
        })?;
        tracing::debug!("Using credentials from profile '{}'", profile);
        Ok(credentials)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Get the AWS configuration directory (`~/.aws`)
pub fn get_aws_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".aws"))
}

fn credentials_file_path() -> Option<PathBuf> {
    if let Some(path) = non_empty_env("AWS_SHARED_CREDENTIALS_FILE") {
        return Some(PathBuf::from(path));
    }
    get_aws_config_dir().map(|dir| dir.join("credentials"))
}

fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = non_empty_env("AWS_CONFIG_FILE") {
        return Some(PathBuf::from(path));
    }
    get_aws_config_dir().map(|dir| dir.join("config"))
}

/// Profile to use: explicit > `AWS_PROFILE` > `default`
pub fn active_profile(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| non_empty_env("AWS_PROFILE"))
        .unwrap_or_else(|| "default".to_string())
}

/// Profile names: letters, digits, `-`, `_`, `.`
fn validate_profile_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Validate an AWS region name (e.g. `us-east-1`, `eu-central-2`)
pub fn validate_region(region: &str) -> bool {
    if region.len() < 4 || region.len() > 30 {
        return false;
    }
    if region.starts_with('-') || region.ends_with('-') || !region.contains('-') {
        return false;
    }
    region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Read the default region
/// Security: Validates region format before returning
pub fn get_default_region(profile: Option<&str>) -> Option<String> {
    for var in ["AWS_REGION", "AWS_DEFAULT_REGION"] {
        if let Some(region) = non_empty_env(var) {
            if validate_region(&region) {
                return Some(region);
            }
            tracing::warn!("Invalid region format in {}", var);
        }
    }

    let profile = active_profile(profile);
    if !validate_profile_name(&profile) {
        return None;
    }
    let content = std::fs::read_to_string(config_file_path()?).ok()?;
    region_from_config(&content, &profile)
}

fn region_from_config(content: &str, profile: &str) -> Option<String> {
    // The config file names non-default profiles "[profile name]"
    let section_name = if profile == "default" {
        "default".to_string()
    } else {
        format!("profile {}", profile)
    };
    parse_ini_section(content, &section_name)
        .get("region")
        .filter(|r| validate_region(r))
        .cloned()
}

/// Key/value pairs of one `[section]` of an INI-style AWS file
fn parse_ini_section(content: &str, section: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    let mut in_section = false;

    for line in content.lines() {
        let line = line.trim();
        // Security: Skip comments and empty lines
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            in_section = line[1..line.len() - 1].trim() == section;
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    values
}
