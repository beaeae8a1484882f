//! GitHub source.
//!
//! Lists issues and pull requests of the repository named in the credential
//! (`repo_name = owner/repo`). The issues endpoint returns both; pull requests
//! carry a `pull_request` key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;
use tributary_core::auth::AuthenticatedCredential;
use tributary_core::connectors::{ChunkEntity, Source, SourceFactory};
use tributary_core::{Error, Result};

use crate::configs::GithubAuthConfig;
use crate::connectors::{check_status, connection_config, http_client};

pub const SHORT_NAME: &str = "github";
pub const IMPLEMENTATION: &str = "GithubSource";
pub const ISSUE_ENTITY: &str = "GithubIssueEntity";
pub const PULL_REQUEST_ENTITY: &str = "GithubPullRequestEntity";

#[derive(Debug, Deserialize, Clone)]
struct GithubIssueLike {
    id: u64,
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    pull_request: Option<Value>,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GithubConfig {
    /// RFC 3339 lower bound on `updated_at`.
    #[serde(default)]
    since: Option<DateTime<Utc>>,
}

pub struct GithubSource {
    client: Client,
    api_base: String,
    token: String,
    owner: String,
    repo: String,
    since: Option<DateTime<Utc>>,
}

impl GithubSource {
    fn headers(&self) -> Result<HeaderMap> {
        let mut h = HeaderMap::new();
        h.insert(USER_AGENT, HeaderValue::from_static("tributary"));
        h.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        let auth = format!("Bearer {}", self.token);
        h.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|e| Error::backend("invalid github auth header", e))?,
        );
        Ok(h)
    }
}

#[async_trait]
impl Source for GithubSource {
    fn short_name(&self) -> &'static str {
        SHORT_NAME
    }

    #[instrument(level = "info", skip(self), fields(repo = %format!("{}/{}", self.owner, self.repo)))]
    async fn generate_entities(&self) -> Result<Vec<ChunkEntity>> {
        let mut req = self
            .client
            .get(format!(
                "{}/repos/{}/{}/issues",
                self.api_base, self.owner, self.repo
            ))
            .headers(self.headers()?)
            .query(&[("state", "all"), ("per_page", "100")]);
        if let Some(since) = self.since {
            req = req.query(&[("since", since.to_rfc3339())]);
        }
        let resp = req.send().await.map_err(Error::backend_reqwest)?;
        let items: Vec<GithubIssueLike> = check_status(SHORT_NAME, resp)
            .await?
            .json()
            .await
            .map_err(Error::backend_reqwest)?;

        let repo = format!("{}/{}", self.owner, self.repo);
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let entity_type = if item.pull_request.is_some() {
                PULL_REQUEST_ENTITY
            } else {
                ISSUE_ENTITY
            };
            let mut entity = ChunkEntity::new(item.id.to_string(), SHORT_NAME, entity_type)?
                .with_metadata("repo", repo.clone())
                .with_metadata("number", item.number)
                .with_metadata("title", item.title.clone())
                .with_metadata("updated_at", item.updated_at.to_rfc3339())
                .with_metadata("html_url", item.html_url);
            entity = entity.with_content(match item.body {
                Some(body) if !body.trim().is_empty() => format!("{}\n\n{body}", item.title),
                _ => item.title,
            });
            out.push(entity);
        }
        tracing::debug!(count = out.len(), "github issues listed");
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub struct GithubSourceFactory {
    api_base: String,
}

impl Default for GithubSourceFactory {
    fn default() -> Self {
        Self::new("https://api.github.com")
    }
}

impl GithubSourceFactory {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SourceFactory for GithubSourceFactory {
    async fn create(
        &self,
        credential: AuthenticatedCredential,
        config: &Value,
    ) -> Result<Arc<dyn Source>> {
        let auth: GithubAuthConfig = credential.structured_as()?;
        let (owner, repo) = auth
            .owner_and_repo()
            .ok_or_else(|| Error::validation("repo_name", "expected 'owner/repo'"))?;
        let cfg: GithubConfig = connection_config(SHORT_NAME, config)?;
        Ok(Arc::new(GithubSource {
            client: http_client()?,
            api_base: self.api_base.clone(),
            token: auth.personal_access_token.clone(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            since: cfg.since,
        }))
    }
}
