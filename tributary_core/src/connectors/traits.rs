use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::Result;
use crate::auth::AuthenticatedCredential;
use crate::connectors::models::ChunkEntity;

/// An authenticated source instance for one sync run.
///
/// Implementations live in `tributary_integrations` or customer code.
#[async_trait]
pub trait Source: Send + Sync {
    /// Integration short name (stable, matches the registry key).
    fn short_name(&self) -> &'static str;

    /// List the entities currently visible to the credential.
    async fn generate_entities(&self) -> Result<Vec<ChunkEntity>>;
}

/// Builds a `Source` once its credential is resolved.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    /// `credential` is `AuthenticatedCredential::None` for integrations that
    /// need no authentication; `config` is the connection's non-secret config.
    async fn create(
        &self,
        credential: AuthenticatedCredential,
        config: &Value,
    ) -> Result<Arc<dyn Source>>;
}

#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    fn model_name(&self) -> &str;

    fn vector_dimensions(&self) -> usize;

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait EmbeddingModelFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn EmbeddingModel>>;
}

#[async_trait]
pub trait Destination: Send + Sync {
    fn short_name(&self) -> &'static str;

    /// Persist entities and their vectors. `vectors[i]` belongs to `entities[i]`.
    async fn bulk_insert(&self, entities: &[ChunkEntity], vectors: &[Vec<f32>]) -> Result<()>;
}

#[async_trait]
pub trait DestinationFactory: Send + Sync {
    /// Destinations are created per sync and sized for the embedding model.
    async fn create(
        &self,
        sync_id: Uuid,
        embedding_model: Arc<dyn EmbeddingModel>,
    ) -> Result<Arc<dyn Destination>>;
}

/// Transformer callable: one entity in, zero or more entities out. The second
/// argument is the transformer node's config.
pub type TransformerFn = Arc<dyn Fn(ChunkEntity, &Value) -> Result<Vec<ChunkEntity>> + Send + Sync>;
