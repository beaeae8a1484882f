//! PostgreSQL + pgvector destination.
//!
//! One table holds the chunks of every sync, keyed by `(sync_id, entity_id)`.
//! The vector column is sized for the embedding model on first use.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tributary_core::connectors::{
    ChunkEntity, Destination, DestinationFactory, EmbeddingModel,
};
use tributary_core::{Error, Result};
use uuid::Uuid;

pub const SHORT_NAME: &str = "pgvector";
pub const IMPLEMENTATION: &str = "PgVectorDestination";

pub struct PgVectorDestination {
    pool: PgPool,
    sync_id: Uuid,
    dimension: usize,
    initialized: OnceCell<()>,
}

impl PgVectorDestination {
    #[tracing::instrument(level = "debug", skip(pool))]
    pub fn new(pool: PgPool, sync_id: Uuid, dimension: usize) -> Self {
        Self {
            pool,
            sync_id,
            dimension,
            initialized: OnceCell::new(),
        }
    }

    pub(crate) fn embedding_literal(dimension: usize, embedding: &[f32]) -> Result<String> {
        if embedding.len() != dimension {
            return Err(Error::InvalidInput(format!(
                "embedding dimension mismatch: expected {dimension}, got {}",
                embedding.len()
            )));
        }

        // pgvector parses "[1,2,3]"; fixed precision keeps it locale-independent.
        let mut s = String::new();
        s.push('[');
        for (i, v) in embedding.iter().enumerate() {
            if i > 0 {
                s.push(',');
            }
            write!(&mut s, "{v:.8}").map_err(|e| Error::backend("format embedding literal", e))?;
        }
        s.push(']');
        Ok(s)
    }

    #[tracing::instrument(level = "info", skip(self))]
    async fn ensure_schema(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| async {
                let dim = self.dimension;
                let ddl = format!(
                    r#"
CREATE EXTENSION IF NOT EXISTS vector;
CREATE TABLE IF NOT EXISTS tributary_chunks (
    sync_id UUID NOT NULL,
    entity_id TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    source_name TEXT NOT NULL,
    content TEXT,
    metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb,
    embedding vector({dim}),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (sync_id, entity_id)
);
CREATE INDEX IF NOT EXISTS idx_tributary_chunks_embedding
    ON tributary_chunks USING ivfflat (embedding vector_cosine_ops);
"#
                );

                for stmt in ddl.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                    sqlx::query(stmt)
                        .execute(&self.pool)
                        .await
                        .map_err(|e| Error::backend("pgvector migrate", e))?;
                }
                Ok::<(), Error>(())
            })
            .await?;
        Ok(())
    }
}

/// Literals for every vector, or the first mismatch. Runs before any I/O.
fn embedding_literals(
    dimension: usize,
    entities: &[ChunkEntity],
    vectors: &[Vec<f32>],
) -> Result<Vec<String>> {
    if entities.len() != vectors.len() {
        return Err(Error::InvalidInput(format!(
            "{} entities but {} vectors",
            entities.len(),
            vectors.len()
        )));
    }
    vectors
        .iter()
        .map(|v| PgVectorDestination::embedding_literal(dimension, v))
        .collect()
}

#[async_trait]
impl Destination for PgVectorDestination {
    fn short_name(&self) -> &'static str {
        SHORT_NAME
    }

    #[tracing::instrument(level = "debug", skip_all, fields(sync_id = %self.sync_id, count = entities.len()))]
    async fn bulk_insert(&self, entities: &[ChunkEntity], vectors: &[Vec<f32>]) -> Result<()> {
        let literals = embedding_literals(self.dimension, entities, vectors)?;
        if entities.is_empty() {
            return Ok(());
        }
        self.ensure_schema().await?;

        let sql = r#"
INSERT INTO tributary_chunks
  (sync_id, entity_id, entity_type, source_name, content, metadata, embedding)
VALUES
  ($1, $2, $3, $4, $5, $6::jsonb, $7::vector)
ON CONFLICT (sync_id, entity_id) DO UPDATE
  SET entity_type = EXCLUDED.entity_type,
      source_name = EXCLUDED.source_name,
      content = EXCLUDED.content,
      metadata = EXCLUDED.metadata,
      embedding = EXCLUDED.embedding,
      updated_at = NOW()
"#;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::backend("pgvector begin", e))?;
        for (entity, literal) in entities.iter().zip(literals) {
            sqlx::query(sql)
                .bind(self.sync_id)
                .bind(&entity.entity_id)
                .bind(&entity.entity_type)
                .bind(&entity.source_name)
                .bind(entity.content.as_deref())
                .bind(serde_json::Value::Object(entity.metadata.clone()))
                .bind(literal)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::backend("pgvector upsert", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| Error::backend("pgvector commit", e))?;
        Ok(())
    }
}

/// Shares one lazily connected pool across the destinations it creates.
pub struct PgVectorDestinationFactory {
    url: Option<String>,
    max_connections: u32,
    pool: OnceCell<PgPool>,
}

impl PgVectorDestinationFactory {
    pub fn new(url: Option<String>, max_connections: u32) -> Self {
        Self {
            url: url.filter(|u| !u.trim().is_empty()),
            max_connections,
            pool: OnceCell::new(),
        }
    }

    async fn pool(&self) -> Result<PgPool> {
        let url = self.url.as_deref().ok_or_else(|| {
            Error::InvalidInput("pgvector destination needs TRIBUTARY_PGVECTOR_URL".to_string())
        })?;
        let pool = self
            .pool
            .get_or_try_init(|| async {
                PgPoolOptions::new()
                    .max_connections(self.max_connections)
                    .connect_lazy(url)
                    .map_err(|e| Error::backend("pgvector pool", e))
            })
            .await?;
        Ok(pool.clone())
    }
}

#[async_trait]
impl DestinationFactory for PgVectorDestinationFactory {
    #[tracing::instrument(level = "info", skip(self, embedding_model), fields(model = embedding_model.model_name()))]
    async fn create(
        &self,
        sync_id: Uuid,
        embedding_model: Arc<dyn EmbeddingModel>,
    ) -> Result<Arc<dyn Destination>> {
        let dimension = embedding_model.vector_dimensions();
        if dimension == 0 {
            return Err(Error::InvalidInput(
                "embedding model reports zero dimensions".to_string(),
            ));
        }
        Ok(Arc::new(PgVectorDestination::new(
            self.pool().await?,
            sync_id,
            dimension,
        )))
    }
}
