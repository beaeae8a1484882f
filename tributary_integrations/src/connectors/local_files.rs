//! Local directory source. Needs no credential.
//!
//! Walks `path` recursively and emits one `FileEntity` per regular file.
//! UTF-8 files up to `max_file_bytes` carry their text as content; others are
//! listed with metadata only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;
use tributary_core::auth::AuthenticatedCredential;
use tributary_core::connectors::{ChunkEntity, Source, SourceFactory};
use tributary_core::{Error, Result};

use crate::connectors::connection_config;

pub const SHORT_NAME: &str = "local_files";
pub const IMPLEMENTATION: &str = "LocalFilesSource";
pub const FILE_ENTITY: &str = "FileEntity";

const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}

#[derive(Debug, Deserialize)]
struct LocalFilesConfig {
    path: PathBuf,
    /// Lowercase extensions without the dot; empty means every file.
    #[serde(default)]
    extensions: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    max_file_bytes: u64,
}

pub struct LocalFilesSource {
    root: PathBuf,
    extensions: Vec<String>,
    max_file_bytes: u64,
}

impl LocalFilesSource {
    fn wanted(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|want| *want == ext)
            })
    }

    async fn file_entity(&self, path: &Path, size: u64, modified: Option<DateTime<Utc>>) -> Result<ChunkEntity> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let relative = relative.to_string_lossy().replace('\\', "/");
        let mut entity = ChunkEntity::new(relative.clone(), SHORT_NAME, FILE_ENTITY)?
            .with_metadata("name", path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .with_metadata("path", relative)
            .with_metadata("size", size)
            .with_metadata("modified_at", modified.map(|m| m.to_rfc3339()));

        if size <= self.max_file_bytes {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| Error::backend(format!("read {}", path.display()), e))?;
            match String::from_utf8(bytes) {
                Ok(text) => entity = entity.with_content(text),
                Err(_) => tracing::debug!(path = %path.display(), "skipping content of non-utf8 file"),
            }
        }
        Ok(entity)
    }
}

#[async_trait]
impl Source for LocalFilesSource {
    fn short_name(&self) -> &'static str {
        SHORT_NAME
    }

    #[instrument(level = "info", skip(self), fields(root = %self.root.display()))]
    async fn generate_entities(&self) -> Result<Vec<ChunkEntity>> {
        let mut out = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| Error::backend(format!("read dir {}", dir.display()), e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Error::backend(format!("read dir {}", dir.display()), e))?
            {
                let path = entry.path();
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| Error::backend(format!("stat {}", path.display()), e))?;
                if meta.is_dir() {
                    pending.push(path);
                } else if meta.is_file() && self.wanted(&path) {
                    let modified = meta.modified().ok().map(DateTime::<Utc>::from);
                    out.push(self.file_entity(&path, meta.len(), modified).await?);
                }
            }
        }
        out.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        tracing::debug!(count = out.len(), "local files listed");
        Ok(out)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocalFilesSourceFactory;

#[async_trait]
impl SourceFactory for LocalFilesSourceFactory {
    async fn create(
        &self,
        credential: AuthenticatedCredential,
        config: &Value,
    ) -> Result<Arc<dyn Source>> {
        if !credential.is_none() {
            tracing::warn!("local_files ignores the credential it was given");
        }
        let cfg: LocalFilesConfig = connection_config(SHORT_NAME, config)?;
        let meta = tokio::fs::metadata(&cfg.path)
            .await
            .map_err(|e| Error::backend(format!("stat {}", cfg.path.display()), e))?;
        if !meta.is_dir() {
            return Err(Error::InvalidInput(format!(
                "local_files path '{}' is not a directory",
                cfg.path.display()
            )));
        }
        Ok(Arc::new(LocalFilesSource {
            root: cfg.path,
            extensions: cfg
                .extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_file_bytes: cfg.max_file_bytes,
        }))
    }
}
