//! Jira Cloud source.
//!
//! Searches issues of one Atlassian site through the OAuth (3LO) gateway,
//! `{api_base}/ex/jira/{cloud_id}/rest/api/3/search`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;
use tributary_core::auth::AuthenticatedCredential;
use tributary_core::connectors::{ChunkEntity, Source, SourceFactory};
use tributary_core::{Error, Result};

use crate::connectors::{check_status, connection_config, http_client, require_access_token};

pub const SHORT_NAME: &str = "jira";
pub const IMPLEMENTATION: &str = "JiraSource";
pub const ISSUE_ENTITY: &str = "JiraIssueEntity";

#[derive(Debug, Deserialize)]
struct JiraSearchResponse {
    #[serde(default)]
    issues: Vec<JiraIssue>,
}

#[derive(Debug, Deserialize, Clone)]
struct JiraIssue {
    id: String,
    key: String,
    #[serde(default)]
    fields: serde_json::Map<String, Value>,
}

fn default_jql() -> String {
    "order by updated desc".to_string()
}

#[derive(Debug, Deserialize)]
struct JiraConfig {
    cloud_id: String,
    #[serde(default = "default_jql")]
    jql: String,
}

pub struct JiraSource {
    client: Client,
    site_base: String,
    token: String,
    jql: String,
}

#[async_trait]
impl Source for JiraSource {
    fn short_name(&self) -> &'static str {
        SHORT_NAME
    }

    #[instrument(level = "info", skip(self))]
    async fn generate_entities(&self) -> Result<Vec<ChunkEntity>> {
        let resp = self
            .client
            .get(format!("{}/rest/api/3/search", self.site_base))
            .bearer_auth(&self.token)
            .query(&[
                ("jql", self.jql.as_str()),
                ("fields", "summary,description,status,updated"),
                ("maxResults", "50"),
            ])
            .send()
            .await
            .map_err(Error::backend_reqwest)?;
        let body: JiraSearchResponse = check_status(SHORT_NAME, resp)
            .await?
            .json()
            .await
            .map_err(Error::backend_reqwest)?;

        let mut out = Vec::with_capacity(body.issues.len());
        for issue in body.issues {
            let summary = issue
                .fields
                .get("summary")
                .and_then(Value::as_str)
                .map(str::to_string);
            let mut entity = ChunkEntity::new(issue.id, SHORT_NAME, ISSUE_ENTITY)?
                .with_metadata("key", issue.key)
                .with_metadata("fields", Value::Object(issue.fields));
            if let Some(summary) = summary {
                entity = entity.with_content(summary);
            }
            out.push(entity);
        }
        tracing::debug!(count = out.len(), "jira issues listed");
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub struct JiraSourceFactory {
    api_base: String,
}

impl Default for JiraSourceFactory {
    fn default() -> Self {
        Self::new("https://api.atlassian.com")
    }
}

impl JiraSourceFactory {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SourceFactory for JiraSourceFactory {
    async fn create(
        &self,
        credential: AuthenticatedCredential,
        config: &Value,
    ) -> Result<Arc<dyn Source>> {
        let token = require_access_token(SHORT_NAME, &credential)?;
        let cfg: JiraConfig = connection_config(SHORT_NAME, config)?;
        if cfg.cloud_id.trim().is_empty() {
            return Err(Error::InvalidInput("jira cloud_id is empty".to_string()));
        }
        Ok(Arc::new(JiraSource {
            client: http_client()?,
            site_base: format!("{}/ex/jira/{}", self.api_base, cfg.cloud_id.trim()),
            token,
            jql: cfg.jql,
        }))
    }
}
