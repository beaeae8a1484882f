use std::error::Error as StdError;

use tributary_graph::GraphError;

/// Common error type for `tributary_core`.
///
/// Backend implementations (HTTP token endpoints, ciphers, stores) should keep
/// the underlying error chain via `Error::backend`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A plugin lookup failed: nothing registered under the key, or the key
    /// belongs to a different category.
    #[error("resolution error: {0}")]
    Resolution(String),

    #[error("unsupported auth_type '{auth_type}' for integration '{integration}'")]
    UnsupportedAuthType {
        integration: String,
        auth_type: String,
    },

    #[error("invalid catalog entry '{integration}': {message}")]
    Catalog {
        integration: String,
        message: String,
    },

    #[error("invalid credential field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("credential refresh failed for '{integration}': {message}")]
    CredentialRefresh {
        integration: String,
        message: String,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("backend error: {context}")]
    Backend {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("backend error: {0}")]
    BackendMessage(String),
}

impl Error {
    #[tracing::instrument(level = "debug", name = "tributary.error.backend", skip(source))]
    pub fn backend(
        context: impl Into<String> + std::fmt::Debug,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Convenience: wrap any error into `Backend` with "reqwest" context.
    pub fn backend_reqwest(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Backend {
            context: "reqwest".into(),
            source: Box::new(source),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution(message.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn catalog(integration: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Catalog {
            integration: integration.into(),
            message: message.into(),
        }
    }

    pub fn refresh(integration: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CredentialRefresh {
            integration: integration.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
