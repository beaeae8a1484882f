//! Source connectors. Each one performs a single listing call against its API
//! and maps the results to `ChunkEntity` records.

#[cfg(feature = "aws_s3")]
pub mod aws_s3;
#[cfg(feature = "github")]
pub mod github;
#[cfg(feature = "hubspot")]
pub mod hubspot;
#[cfg(feature = "jira")]
pub mod jira;
#[cfg(feature = "linear")]
pub mod linear;
#[cfg(feature = "local_files")]
pub mod local_files;
#[cfg(feature = "slack")]
pub mod slack;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tributary_core::auth::AuthenticatedCredential;
use tributary_core::{Error, Result};

pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(Error::backend_reqwest)
}

/// Access token of an OAuth credential.
pub(crate) fn require_access_token(
    integration: &str,
    credential: &AuthenticatedCredential,
) -> Result<String> {
    credential.access_token().map(str::to_string).ok_or_else(|| {
        Error::InvalidInput(format!("{integration} requires an OAuth access token"))
    })
}

/// Typed connection config; a null config reads as an empty object.
pub(crate) fn connection_config<T: DeserializeOwned>(integration: &str, config: &Value) -> Result<T> {
    let value = match config {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(value)
        .map_err(|e| Error::InvalidInput(format!("{integration} connection config: {e}")))
}

/// Fail with the response body when the API answered with an error status.
pub(crate) async fn check_status(
    integration: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let snippet: String = text.chars().take(200).collect();
    Err(Error::BackendMessage(format!(
        "{integration} api returned {status}: {snippet}"
    )))
}
