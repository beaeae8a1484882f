//! Linear source.
//!
//! Lists recently updated issues through the GraphQL API using a personal API
//! key. `team_id` in the connection config narrows the listing to one team.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;
use tributary_core::auth::AuthenticatedCredential;
use tributary_core::connectors::{ChunkEntity, Source, SourceFactory};
use tributary_core::{Error, Result};

use crate::configs::LinearAuthConfig;
use crate::connectors::{check_status, connection_config, http_client};

pub const SHORT_NAME: &str = "linear";
pub const IMPLEMENTATION: &str = "LinearSource";
pub const ISSUE_ENTITY: &str = "LinearIssueEntity";

const QUERY: &str = r#"
query Issues($since: DateTime!, $team_id: String) {
  issues(
    first: 100,
    filter: {
      updatedAt: { gt: $since },
      team: { id: { eq: $team_id } }
    }
  ) {
    nodes { id identifier title description updatedAt }
  }
}
"#;

const QUERY_NO_TEAM: &str = r#"
query Issues($since: DateTime!) {
  issues(first: 100, filter: { updatedAt: { gt: $since } }) {
    nodes { id identifier title description updatedAt }
  }
}
"#;

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct LinearResponse<T> {
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    errors: Vec<LinearError>,
}

#[derive(Debug, Deserialize)]
struct LinearError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct IssuesData {
    issues: IssuesConnection,
}

#[derive(Debug, Deserialize)]
struct IssuesConnection {
    #[serde(default)]
    nodes: Vec<LinearIssue>,
}

#[derive(Debug, Deserialize, Clone)]
struct LinearIssue {
    id: String,
    identifier: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
struct LinearConfig {
    #[serde(default)]
    team_id: Option<String>,
    /// RFC 3339; defaults to 30 days back.
    #[serde(default)]
    since: Option<DateTime<Utc>>,
}

pub struct LinearSource {
    client: Client,
    api_url: String,
    api_key: String,
    team_id: Option<String>,
    since: DateTime<Utc>,
}

#[async_trait]
impl Source for LinearSource {
    fn short_name(&self) -> &'static str {
        SHORT_NAME
    }

    #[instrument(level = "info", skip(self))]
    async fn generate_entities(&self) -> Result<Vec<ChunkEntity>> {
        let since = self.since.to_rfc3339();
        let (query, variables) = match &self.team_id {
            Some(team_id) => (QUERY, serde_json::json!({"since": since, "team_id": team_id})),
            None => (QUERY_NO_TEAM, serde_json::json!({"since": since})),
        };

        let resp = self
            .client
            .post(&self.api_url)
            .header(AUTHORIZATION, &self.api_key)
            .json(&serde_json::json!({"query": query, "variables": variables}))
            .send()
            .await
            .map_err(Error::backend_reqwest)?;
        let parsed: LinearResponse<IssuesData> = check_status(SHORT_NAME, resp)
            .await?
            .json()
            .await
            .map_err(Error::backend_reqwest)?;
        if let Some(first) = parsed.errors.first() {
            return Err(Error::BackendMessage(format!(
                "linear graphql error: {}",
                first.message
            )));
        }
        let data = parsed
            .data
            .ok_or_else(|| Error::BackendMessage("linear response has no data".to_string()))?;

        let mut out = Vec::with_capacity(data.issues.nodes.len());
        for issue in data.issues.nodes {
            let mut entity = ChunkEntity::new(issue.id, SHORT_NAME, ISSUE_ENTITY)?
                .with_metadata("identifier", issue.identifier)
                .with_metadata("title", issue.title.clone())
                .with_metadata("updated_at", issue.updated_at.to_rfc3339());
            let content = match issue.description {
                Some(desc) if !desc.trim().is_empty() => format!("{}\n\n{desc}", issue.title),
                _ => issue.title,
            };
            entity = entity.with_content(content);
            out.push(entity);
        }
        tracing::debug!(count = out.len(), "linear issues listed");
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub struct LinearSourceFactory {
    api_url: String,
}

impl Default for LinearSourceFactory {
    fn default() -> Self {
        Self::new("https://api.linear.app/graphql")
    }
}

impl LinearSourceFactory {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }
}

#[async_trait]
impl SourceFactory for LinearSourceFactory {
    async fn create(
        &self,
        credential: AuthenticatedCredential,
        config: &Value,
    ) -> Result<Arc<dyn Source>> {
        let auth: LinearAuthConfig = credential.structured_as()?;
        let cfg: LinearConfig = connection_config(SHORT_NAME, config)?;
        Ok(Arc::new(LinearSource {
            client: http_client()?,
            api_url: self.api_url.clone(),
            api_key: auth.api_key,
            team_id: cfg.team_id.filter(|t| !t.trim().is_empty()),
            since: cfg
                .since
                .unwrap_or_else(|| Utc::now() - ChronoDuration::days(30)),
        }))
    }
}
