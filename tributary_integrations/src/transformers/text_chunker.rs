//! Splits entity content into fixed-size character windows.

use serde::Deserialize;
use serde_json::Value;
use tributary_core::connectors::ChunkEntity;
use tributary_core::{Error, Result};

use crate::entities::CHUNK_ENTITY;

pub const SHORT_NAME: &str = "text_chunker";
pub const IMPLEMENTATION: &str = "chunk_text";

fn default_chunk_size() -> usize {
    1000
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChunkerConfig {
    /// Characters per chunk.
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
    /// Characters shared by consecutive chunks.
    #[serde(default)]
    overlap: usize,
}

impl ChunkerConfig {
    fn from_value(config: &Value) -> Result<Self> {
        let value = match config {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        let cfg: Self = serde_json::from_value(value)
            .map_err(|e| Error::InvalidInput(format!("text_chunker config: {e}")))?;
        if cfg.chunk_size == 0 {
            return Err(Error::InvalidInput(
                "text_chunker chunk_size must be > 0".to_string(),
            ));
        }
        if cfg.overlap >= cfg.chunk_size {
            return Err(Error::InvalidInput(
                "text_chunker overlap must be smaller than chunk_size".to_string(),
            ));
        }
        Ok(cfg)
    }
}

/// Transformer entry point. Entities without content pass through unchanged.
pub fn chunk_text(entity: ChunkEntity, config: &Value) -> Result<Vec<ChunkEntity>> {
    let cfg = ChunkerConfig::from_value(config)?;
    let Some(content) = entity.content.as_deref() else {
        return Ok(vec![entity]);
    };

    let chars: Vec<char> = content.chars().collect();
    let step = cfg.chunk_size - cfg.overlap;
    let mut out = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + cfg.chunk_size).min(chars.len());
        let text: String = chars[start..end].iter().collect();
        let mut chunk = ChunkEntity::new(
            format!("{}#chunk-{}", entity.entity_id, out.len()),
            entity.source_name.clone(),
            CHUNK_ENTITY,
        )?
        .with_content(text);
        chunk.metadata = entity.metadata.clone();
        chunk = chunk
            .with_metadata("parent_entity_id", entity.entity_id.clone())
            .with_metadata("parent_entity_type", entity.entity_type.clone())
            .with_metadata("chunk_index", out.len());
        out.push(chunk);
        if end == chars.len() {
            break;
        }
        start += step;
    }
    Ok(out)
}
