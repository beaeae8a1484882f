//! HubSpot source.
//!
//! Lists contacts and companies through the CRM v3 search API, optionally
//! limited to records modified after `modified_since_ms`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;
use tributary_core::auth::AuthenticatedCredential;
use tributary_core::connectors::{ChunkEntity, Source, SourceFactory};
use tributary_core::{Error, Result};

use crate::connectors::{check_status, connection_config, http_client, require_access_token};

pub const SHORT_NAME: &str = "hubspot";
pub const IMPLEMENTATION: &str = "HubSpotSource";

#[derive(Debug, Deserialize)]
struct HubspotSearchResponse {
    #[serde(default)]
    results: Vec<HubspotObject>,
}

#[derive(Debug, Deserialize, Clone)]
struct HubspotObject {
    id: String,
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct HubspotSearchRequest {
    #[serde(rename = "filterGroups")]
    filter_groups: Vec<HubspotFilterGroup>,
    properties: Vec<String>,
    limit: u32,
}

#[derive(Debug, Serialize)]
struct HubspotFilterGroup {
    filters: Vec<HubspotFilter>,
}

#[derive(Debug, Serialize)]
struct HubspotFilter {
    #[serde(rename = "propertyName")]
    property_name: String,
    operator: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct HubspotConfig {
    #[serde(default)]
    modified_since_ms: i64,
}

/// CRM object types pulled by the source: (API object, entity type, properties).
const OBJECTS: &[(&str, &str, &[&str])] = &[
    (
        "contacts",
        "HubspotContactEntity",
        &["firstname", "lastname", "email", "lastmodifieddate"],
    ),
    (
        "companies",
        "HubspotCompanyEntity",
        &["name", "domain", "lastmodifieddate"],
    ),
];

pub struct HubSpotSource {
    client: Client,
    api_base: String,
    token: String,
    modified_since_ms: i64,
}

impl HubSpotSource {
    async fn search_objects(&self, object: &str, properties: &[&str]) -> Result<Vec<HubspotObject>> {
        let body = HubspotSearchRequest {
            filter_groups: vec![HubspotFilterGroup {
                filters: vec![HubspotFilter {
                    property_name: "lastmodifieddate".to_string(),
                    operator: "GT".to_string(),
                    value: self.modified_since_ms.to_string(),
                }],
            }],
            properties: properties.iter().map(|s| s.to_string()).collect(),
            limit: 100,
        };
        let resp = self
            .client
            .post(format!("{}/crm/v3/objects/{object}/search", self.api_base))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(Error::backend_reqwest)?;
        let body: HubspotSearchResponse = check_status(SHORT_NAME, resp)
            .await?
            .json()
            .await
            .map_err(Error::backend_reqwest)?;
        Ok(body.results)
    }
}

#[async_trait]
impl Source for HubSpotSource {
    fn short_name(&self) -> &'static str {
        SHORT_NAME
    }

    #[instrument(level = "info", skip(self))]
    async fn generate_entities(&self) -> Result<Vec<ChunkEntity>> {
        let mut out = Vec::new();
        for (object, entity_type, properties) in OBJECTS {
            for record in self.search_objects(object, properties).await? {
                let mut entity =
                    ChunkEntity::new(format!("{object}:{}", record.id), SHORT_NAME, *entity_type)?
                        .with_metadata("hubspot_id", record.id);
                entity.metadata.extend(record.properties);
                out.push(entity);
            }
        }
        tracing::debug!(count = out.len(), "hubspot objects listed");
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub struct HubSpotSourceFactory {
    api_base: String,
}

impl Default for HubSpotSourceFactory {
    fn default() -> Self {
        Self::new("https://api.hubapi.com")
    }
}

impl HubSpotSourceFactory {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SourceFactory for HubSpotSourceFactory {
    async fn create(
        &self,
        credential: AuthenticatedCredential,
        config: &Value,
    ) -> Result<Arc<dyn Source>> {
        let token = require_access_token(SHORT_NAME, &credential)?;
        let cfg: HubspotConfig = connection_config(SHORT_NAME, config)?;
        Ok(Arc::new(HubSpotSource {
            client: http_client()?,
            api_base: self.api_base.clone(),
            token,
            modified_since_ms: cfg.modified_since_ms.max(0),
        }))
    }
}
