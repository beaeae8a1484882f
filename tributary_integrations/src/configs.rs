//! Credential schemas for structured auth strategies.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tributary_core::credentials::{CredentialSchema, SerdeSchema};

pub const LINEAR_AUTH_CONFIG: &str = "LinearAuthConfig";
pub const GITHUB_AUTH_CONFIG: &str = "GithubAuthConfig";
pub const SIGV4_AUTH_CONFIG: &str = "SigV4AuthConfig";

#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinearAuthConfig {
    pub api_key: String,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GithubAuthConfig {
    pub personal_access_token: String,
    /// `owner/repo`.
    pub repo_name: String,
}

impl GithubAuthConfig {
    pub fn owner_and_repo(&self) -> Option<(&str, &str)> {
        let (owner, repo) = self.repo_name.trim().split_once('/')?;
        (!owner.is_empty() && !repo.is_empty() && !repo.contains('/')).then_some((owner, repo))
    }
}

/// SigV4 key pair plus optional S3 target settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct SigV4AuthConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
}

pub fn linear_schema() -> Arc<dyn CredentialSchema> {
    Arc::new(SerdeSchema::<LinearAuthConfig>::new(LINEAR_AUTH_CONFIG).non_empty(&["api_key"]))
}

pub fn github_schema() -> Arc<dyn CredentialSchema> {
    Arc::new(
        SerdeSchema::<GithubAuthConfig>::new(GITHUB_AUTH_CONFIG)
            .non_empty(&["personal_access_token", "repo_name"]),
    )
}

pub fn sigv4_schema() -> Arc<dyn CredentialSchema> {
    Arc::new(
        SerdeSchema::<SigV4AuthConfig>::new(SIGV4_AUTH_CONFIG)
            .non_empty(&["access_key_id", "secret_access_key"]),
    )
}
