//! Slack source.
//!
//! Reads one channel's recent history with a bot token.

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

pub const SHORT_NAME: &str = "slack";
pub const IMPLEMENTATION: &str = "SlackSource";
pub const MESSAGE_ENTITY: &str = "SlackMessageEntity";

#[derive(Debug, Deserialize)]
struct SlackHistoryResponse {
    ok: bool,
    #[serde(default)]
    messages: Vec<SlackMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
struct SlackMessage {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ts: String,
}

#[derive(Debug, Deserialize)]
struct SlackConfig {
    channel_id: String,
}

pub struct SlackSource {
    client: Client,
    api_base: String,
    token: String,
    channel_id: String,
}

#[async_trait]
impl Source for SlackSource {
    fn short_name(&self) -> &'static str {
        SHORT_NAME
    }

    #[instrument(level = "info", skip(self), fields(channel_id = %self.channel_id))]
    async fn generate_entities(&self) -> Result<Vec<ChunkEntity>> {
        let resp = self
            .client
            .get(format!("{}/conversations.history", self.api_base))
            .bearer_auth(&self.token)
            .query(&[("channel", self.channel_id.as_str()), ("limit", "200")])
            .send()
            .await
            .map_err(Error::backend_reqwest)?;
        let body: SlackHistoryResponse = check_status(SHORT_NAME, resp)
            .await?
            .json()
            .await
            .map_err(Error::backend_reqwest)?;
        if !body.ok {
            return Err(Error::BackendMessage(format!(
                "slack conversations.history failed: {}",
                body.error.unwrap_or_else(|| "unknown".to_string())
            )));
        }

        let mut out = Vec::with_capacity(body.messages.len());
        for msg in body.messages {
            // Slack timestamps ("1700000000.12345") are unique per channel.
            let mut entity = ChunkEntity::new(
                format!("{}:{}", self.channel_id, msg.ts),
                SHORT_NAME,
                MESSAGE_ENTITY,
            )?
            .with_metadata("channel_id", self.channel_id.clone())
            .with_metadata("ts", msg.ts)
            .with_metadata("user", msg.user);
            if let Some(text) = msg.text {
                entity = entity.with_content(text);
            }
            out.push(entity);
        }
        tracing::debug!(count = out.len(), "slack messages listed");
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub struct SlackSourceFactory {
    api_base: String,
}

impl Default for SlackSourceFactory {
    fn default() -> Self {
        Self::new("https://slack.com/api")
    }
}

impl SlackSourceFactory {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SourceFactory for SlackSourceFactory {
    async fn create(
        &self,
        credential: AuthenticatedCredential,
        config: &Value,
    ) -> Result<Arc<dyn Source>> {
        let token = require_access_token(SHORT_NAME, &credential)?;
        let cfg: SlackConfig = connection_config(SHORT_NAME, config)?;
        Ok(Arc::new(SlackSource {
            client: http_client()?,
            api_base: self.api_base.clone(),
            token,
            channel_id: cfg.channel_id,
        }))
    }
}
