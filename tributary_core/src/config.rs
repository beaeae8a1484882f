use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::credentials::{AesGcmCipher, CredentialCipher, DEFAULT_REFRESH_TIMEOUT};
use crate::factory::{DestinationSelection, PluginRef};
use crate::{Error, Result};

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Where the auth catalog file lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Deployment environment (`local`, `dev`, `prd`, ...).
    pub environment: String,
    pub dir: PathBuf,
}

impl CatalogConfig {
    #[tracing::instrument(level = "debug")]
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let cfg = Self {
            environment: lookup("TRIBUTARY_ENVIRONMENT").unwrap_or_else(|| "local".to_string()),
            dir: lookup("TRIBUTARY_CATALOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./catalogs")),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let env = self.environment.trim();
        if env.is_empty() {
            return Err(Error::InvalidInput("catalog.environment is empty".to_string()));
        }
        if env.contains(['/', '\\']) {
            return Err(Error::InvalidInput(format!(
                "catalog.environment '{env}' must not contain path separators"
            )));
        }
        Ok(())
    }

    /// File prefix for the environment; `local` shares the `dev` catalog.
    pub fn env_prefix(&self) -> &str {
        match self.environment.as_str() {
            "local" => "dev",
            other => other,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.integrations.yaml", self.env_prefix()))
    }
}

#[derive(Clone)]
pub struct CredentialConfig {
    /// Base64 AES-256 key.
    pub encryption_key: String,
    pub refresh_timeout: Duration,
}

impl CredentialConfig {
    #[tracing::instrument(level = "debug")]
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let encryption_key = lookup("TRIBUTARY_ENCRYPTION_KEY").ok_or_else(|| {
            Error::InvalidInput("TRIBUTARY_ENCRYPTION_KEY is required".to_string())
        })?;
        let refresh_timeout = lookup("TRIBUTARY_REFRESH_TIMEOUT_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REFRESH_TIMEOUT);
        let cfg = Self {
            encryption_key,
            refresh_timeout,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_timeout.is_zero() {
            return Err(Error::InvalidInput(
                "credentials.refresh_timeout must be > 0".to_string(),
            ));
        }
        AesGcmCipher::from_base64_key(&self.encryption_key)?;
        Ok(())
    }

    pub fn cipher(&self) -> Result<Arc<dyn CredentialCipher>> {
        Ok(Arc::new(AesGcmCipher::from_base64_key(&self.encryption_key)?))
    }
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("encryption_key", &"<redacted>")
            .field("refresh_timeout", &self.refresh_timeout)
            .finish()
    }
}

/// Destination and embedding-model wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationConfig {
    pub selection: DestinationSelection,
    /// Postgres URL for the pgvector destination.
    pub pgvector_url: Option<String>,
    pub pgvector_max_connections: u32,
    pub text2vec_url: String,
    pub embedding_dimensions: usize,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            selection: DestinationSelection::default(),
            pgvector_url: None,
            pgvector_max_connections: 5,
            text2vec_url: "http://localhost:9878".to_string(),
            embedding_dimensions: 384,
        }
    }
}

impl DestinationConfig {
    #[tracing::instrument(level = "debug")]
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let destination = PluginRef::new(
            lookup("TRIBUTARY_DESTINATION").unwrap_or_else(|| "pgvector".to_string()),
            lookup("TRIBUTARY_DESTINATION_IMPL")
                .unwrap_or_else(|| "PgVectorDestination".to_string()),
        );
        let embedding_model = PluginRef::new(
            lookup("TRIBUTARY_EMBEDDING_MODEL").unwrap_or_else(|| "local_text2vec".to_string()),
            lookup("TRIBUTARY_EMBEDDING_MODEL_IMPL").unwrap_or_else(|| "LocalText2Vec".to_string()),
        );
        let selection = match lookup("TRIBUTARY_DESTINATION_SELECTION").as_deref() {
            None | Some("fixed") => DestinationSelection::Fixed {
                destination,
                embedding_model,
            },
            Some("by_connection") => DestinationSelection::ByConnection {
                fallback_destination: destination,
                fallback_embedding_model: embedding_model,
            },
            Some(other) => {
                return Err(Error::InvalidInput(format!(
                    "TRIBUTARY_DESTINATION_SELECTION must be 'fixed' or 'by_connection', got '{other}'"
                )));
            }
        };

        let cfg = Self {
            selection,
            pgvector_url: lookup("TRIBUTARY_PGVECTOR_URL"),
            pgvector_max_connections: lookup("TRIBUTARY_PGVECTOR_MAX_CONNECTIONS")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.pgvector_max_connections),
            text2vec_url: lookup("TRIBUTARY_TEXT2VEC_URL").unwrap_or(defaults.text2vec_url),
            embedding_dimensions: lookup("TRIBUTARY_EMBEDDING_DIMENSIONS")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(defaults.embedding_dimensions),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.text2vec_url.trim().is_empty() {
            return Err(Error::InvalidInput("text2vec_url is empty".to_string()));
        }
        if self.embedding_dimensions == 0 {
            return Err(Error::InvalidInput(
                "embedding_dimensions must be > 0".to_string(),
            ));
        }
        if self.pgvector_max_connections == 0 {
            return Err(Error::InvalidInput(
                "pgvector_max_connections must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
