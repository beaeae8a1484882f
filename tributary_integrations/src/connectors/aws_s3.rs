//! Amazon S3 source (SigV4 credentials).
//!
//! Emits one `S3BucketEntity` for the bucket followed by one `S3ObjectEntity`
//! per listed object. S3-compatible stores work through `endpoint_url`.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;
use tributary_core::auth::AuthenticatedCredential;
use tributary_core::connectors::{ChunkEntity, Source, SourceFactory};
use tributary_core::{Error, Result};

use crate::configs::SigV4AuthConfig;
use crate::connectors::connection_config;
use crate::entities::{S3_BUCKET_ENTITY, S3_OBJECT_ENTITY};

pub const SHORT_NAME: &str = "aws_s3";
pub const IMPLEMENTATION: &str = "S3Source";

const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Default, Deserialize)]
struct S3ConnectionConfig {
    /// Used when the credential carries no bucket.
    #[serde(default)]
    bucket: Option<String>,
    #[serde(default)]
    prefix: Option<String>,
}

/// `s3://docs/` and `docs` name the same bucket.
pub(crate) fn normalize_bucket(raw: &str) -> Option<String> {
    let name = raw.trim();
    let name = name.strip_prefix("s3://").unwrap_or(name);
    let name = name.trim_end_matches('/');
    (!name.is_empty()).then(|| name.to_string())
}

/// Settings the client and listing need, split out of the credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct S3Target {
    pub bucket: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub prefix: Option<String>,
}

fn target(auth: &SigV4AuthConfig, config: &S3ConnectionConfig) -> Result<S3Target> {
    let bucket = auth
        .bucket
        .as_deref()
        .and_then(normalize_bucket)
        .or_else(|| config.bucket.as_deref().and_then(normalize_bucket))
        .ok_or_else(|| Error::validation("bucket", "no bucket in credential or connection config"))?;
    Ok(S3Target {
        bucket,
        region: auth
            .region
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        endpoint_url: auth.endpoint_url.clone().filter(|e| !e.trim().is_empty()),
        prefix: config.prefix.clone().filter(|p| !p.is_empty()),
    })
}

pub struct S3Source {
    client: Client,
    target: S3Target,
}

impl S3Source {
    async fn bucket_entity(&self) -> Result<ChunkEntity> {
        let resp = self
            .client
            .get_bucket_location()
            .bucket(&self.target.bucket)
            .send()
            .await
            .map_err(|e| Error::backend("s3 get_bucket_location", e))?;
        // An empty constraint means us-east-1.
        let location = resp
            .location_constraint()
            .map(|c| c.as_str().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        Ok(
            ChunkEntity::new(self.target.bucket.clone(), SHORT_NAME, S3_BUCKET_ENTITY)?
                .with_metadata("bucket_name", self.target.bucket.clone())
                .with_metadata("location", location),
        )
    }
}

#[async_trait]
impl Source for S3Source {
    fn short_name(&self) -> &'static str {
        SHORT_NAME
    }

    #[instrument(level = "info", skip(self), fields(bucket = %self.target.bucket))]
    async fn generate_entities(&self) -> Result<Vec<ChunkEntity>> {
        let mut out = vec![self.bucket_entity().await?];

        let mut token: Option<String> = None;
        loop {
            let mut req = self.client.list_objects_v2().bucket(&self.target.bucket);
            if let Some(prefix) = &self.target.prefix {
                req = req.prefix(prefix);
            }
            if let Some(t) = token.take() {
                req = req.continuation_token(t);
            }
            let resp = req
                .send()
                .await
                .map_err(|e| Error::backend("s3 list_objects_v2", e))?;

            for obj in resp.contents() {
                let Some(key) = obj.key() else { continue };
                let last_modified = obj
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
                    .map(|t| t.to_rfc3339());
                out.push(
                    ChunkEntity::new(
                        format!("{}/{key}", self.target.bucket),
                        SHORT_NAME,
                        S3_OBJECT_ENTITY,
                    )?
                    .with_metadata("bucket_name", self.target.bucket.clone())
                    .with_metadata("key", key)
                    .with_metadata("size", obj.size())
                    .with_metadata("last_modified", last_modified)
                    .with_metadata("etag", obj.e_tag().map(|e| e.trim_matches('"').to_string()))
                    .with_metadata(
                        "storage_class",
                        obj.storage_class().map(|c| c.as_str().to_string()),
                    ),
                );
            }

            if resp.is_truncated().unwrap_or(false) {
                token = resp.next_continuation_token().map(str::to_string);
                if token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }
        tracing::debug!(count = out.len(), "s3 entities listed");
        Ok(out)
    }
}

#[derive(Debug, Clone, Default)]
pub struct S3SourceFactory;

#[async_trait]
impl SourceFactory for S3SourceFactory {
    async fn create(
        &self,
        credential: AuthenticatedCredential,
        config: &Value,
    ) -> Result<Arc<dyn Source>> {
        let auth: SigV4AuthConfig = credential.structured_as()?;
        let cfg: S3ConnectionConfig = connection_config(SHORT_NAME, config)?;
        let target = target(&auth, &cfg)?;

        let creds = Credentials::new(
            auth.access_key_id,
            auth.secret_access_key,
            auth.session_token,
            None,
            "tributary_sigv4",
        );
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(target.region.clone()))
            .credentials_provider(creds);
        if let Some(endpoint) = &target.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;
        let mut s3_cfg = aws_sdk_s3::config::Builder::from(&shared);
        if target.endpoint_url.is_some() {
            // MinIO and friends serve buckets under the path.
            s3_cfg = s3_cfg.force_path_style(true);
        }

        Ok(Arc::new(S3Source {
            client: Client::from_conf(s3_cfg.build()),
            target,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(bucket: Option<&str>) -> SigV4AuthConfig {
        SigV4AuthConfig {
            access_key_id: "AKIA1".into(),
            secret_access_key: "s3cr3t".into(),
            session_token: None,
            region: None,
            endpoint_url: None,
            bucket: bucket.map(str::to_string),
        }
    }

    #[test]
    fn bucket_prefix_and_trailing_slash_are_stripped() {
        assert_eq!(normalize_bucket("s3://docs/").as_deref(), Some("docs"));
        assert_eq!(normalize_bucket(" docs ").as_deref(), Some("docs"));
        assert_eq!(normalize_bucket("s3://"), None);
    }

    #[test]
    fn credential_bucket_wins_over_connection_config() {
        let cfg = S3ConnectionConfig {
            bucket: Some("fallback".into()),
            prefix: Some("reports/".into()),
        };
        let t = target(&auth(Some("s3://primary")), &cfg).unwrap();
        assert_eq!(t.bucket, "primary");
        assert_eq!(t.region, "us-east-1");
        assert_eq!(t.prefix.as_deref(), Some("reports/"));

        let t = target(&auth(None), &cfg).unwrap();
        assert_eq!(t.bucket, "fallback");
    }

    #[test]
    fn missing_bucket_is_a_validation_error() {
        let err = target(&auth(Some("  ")), &S3ConnectionConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Validation { field, .. } if field == "bucket"));
    }

    #[tokio::test]
    async fn factory_rejects_non_sigv4_credentials() {
        let result = S3SourceFactory
            .create(AuthenticatedCredential::AccessToken("t".into()), &Value::Null)
            .await;
        assert!(result.is_err());
    }
}
