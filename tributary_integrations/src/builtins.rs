//! Registration of every built-in plugin unit enabled by crate features.

use std::collections::BTreeMap;
use std::sync::Arc;
use tributary_core::config::DestinationConfig;
use tributary_core::registry::{
    ConnectorCategory, DEFAULT_AUTH_UNIT, Implementation, PluginRegistry, SIGV4_AUTH_UNIT,
    UnitImplementations,
};
use tributary_core::{Result, SourceFactory};

use crate::configs::{
    GITHUB_AUTH_CONFIG, LINEAR_AUTH_CONFIG, SIGV4_AUTH_CONFIG, github_schema, linear_schema,
    sigv4_schema,
};
use crate::entities;

fn single(name: &str, implementation: Implementation) -> UnitImplementations {
    BTreeMap::from([(name.to_string(), implementation)])
}

fn register_source<F>(
    registry: &mut PluginRegistry,
    short_name: &str,
    implementation_name: &'static str,
    factory: F,
) -> Result<()>
where
    F: SourceFactory + Clone + 'static,
{
    registry.register(ConnectorCategory::Source, short_name, move || {
        single(
            implementation_name,
            Implementation::Source(Arc::new(factory.clone())),
        )
    })
}

/// Register the built-in sources, destination, embedding model, transformer,
/// entity definitions and credential schemas. Fails if a unit is already
/// registered.
#[tracing::instrument(level = "info", skip_all)]
pub fn register_builtins(registry: &mut PluginRegistry, config: &DestinationConfig) -> Result<()> {
    #[cfg(feature = "local_files")]
    {
        use crate::connectors::local_files as m;
        register_source(registry, m::SHORT_NAME, m::IMPLEMENTATION, m::LocalFilesSourceFactory)?;
    }
    #[cfg(feature = "slack")]
    {
        use crate::connectors::slack as m;
        register_source(registry, m::SHORT_NAME, m::IMPLEMENTATION, m::SlackSourceFactory::default())?;
    }
    #[cfg(feature = "hubspot")]
    {
        use crate::connectors::hubspot as m;
        register_source(registry, m::SHORT_NAME, m::IMPLEMENTATION, m::HubSpotSourceFactory::default())?;
    }
    #[cfg(feature = "jira")]
    {
        use crate::connectors::jira as m;
        register_source(registry, m::SHORT_NAME, m::IMPLEMENTATION, m::JiraSourceFactory::default())?;
    }
    #[cfg(feature = "linear")]
    {
        use crate::connectors::linear as m;
        register_source(registry, m::SHORT_NAME, m::IMPLEMENTATION, m::LinearSourceFactory::default())?;
    }
    #[cfg(feature = "github")]
    {
        use crate::connectors::github as m;
        register_source(registry, m::SHORT_NAME, m::IMPLEMENTATION, m::GithubSourceFactory::default())?;
    }
    #[cfg(feature = "aws_s3")]
    {
        use crate::connectors::aws_s3 as m;
        register_source(registry, m::SHORT_NAME, m::IMPLEMENTATION, m::S3SourceFactory)?;
    }

    #[cfg(feature = "pgvector")]
    {
        use crate::vector::pgvector as m;
        let url = config.pgvector_url.clone();
        let max_connections = config.pgvector_max_connections;
        // One factory (and pool) per registry.
        let factory = Arc::new(m::PgVectorDestinationFactory::new(url, max_connections));
        registry.register(ConnectorCategory::Destination, m::SHORT_NAME, move || {
            single(m::IMPLEMENTATION, Implementation::Destination(factory.clone()))
        })?;
    }
    #[cfg(feature = "local_text2vec")]
    {
        use crate::embedding::local_text2vec as m;
        let factory = m::LocalText2VecFactory::new(config.text2vec_url.clone(), config.embedding_dimensions);
        registry.register(ConnectorCategory::EmbeddingModel, m::SHORT_NAME, move || {
            single(
                m::IMPLEMENTATION,
                Implementation::EmbeddingModel(Arc::new(factory.clone())),
            )
        })?;
    }
    #[cfg(not(any(feature = "pgvector", feature = "local_text2vec")))]
    let _ = config;

    {
        use crate::transformers::text_chunker as m;
        registry.register(ConnectorCategory::Transformer, m::SHORT_NAME, || {
            single(
                m::IMPLEMENTATION,
                Implementation::Transformer(Arc::new(m::chunk_text)),
            )
        })?;
    }

    registry.register(ConnectorCategory::EntityDefinition, "aws_s3", || {
        BTreeMap::from([
            (
                entities::S3_BUCKET_ENTITY.to_string(),
                Implementation::EntityDefinition(Arc::new(entities::s3_bucket_entity())),
            ),
            (
                entities::S3_OBJECT_ENTITY.to_string(),
                Implementation::EntityDefinition(Arc::new(entities::s3_object_entity())),
            ),
        ])
    })?;
    registry.register(ConnectorCategory::EntityDefinition, "chunk", || {
        single(
            entities::CHUNK_ENTITY,
            Implementation::EntityDefinition(Arc::new(entities::chunk_entity())),
        )
    })?;

    registry.register(ConnectorCategory::AuthConfig, DEFAULT_AUTH_UNIT, || {
        BTreeMap::from([
            (
                LINEAR_AUTH_CONFIG.to_string(),
                Implementation::AuthConfig(linear_schema()),
            ),
            (
                GITHUB_AUTH_CONFIG.to_string(),
                Implementation::AuthConfig(github_schema()),
            ),
        ])
    })?;
    registry.register(ConnectorCategory::AuthConfig, SIGV4_AUTH_UNIT, || {
        single(SIGV4_AUTH_CONFIG, Implementation::AuthConfig(sigv4_schema()))
    })?;

    Ok(())
}

#[cfg(all(test, feature = "local_files", feature = "aws_s3"))]
mod tests {
    use super::*;
    use tributary_core::auth::AuthenticatedCredential;

    fn registry() -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        register_builtins(&mut registry, &DestinationConfig::default()).unwrap();
        registry
    }

    #[test]
    fn lists_every_builtin_descriptor() {
        let listed: Vec<String> = registry()
            .descriptors()
            .iter()
            .map(ToString::to_string)
            .collect();
        for expected in [
            "source/local_files/LocalFilesSource",
            "source/aws_s3/S3Source",
            "source/jira/JiraSource",
            "transformer/text_chunker/chunk_text",
            "entity_definition/aws_s3/S3ObjectEntity",
            "entity_definition/chunk/ChunkEntity",
            "auth_config/auth/GithubAuthConfig",
            "auth_config/sigv4/SigV4AuthConfig",
        ] {
            assert!(listed.iter().any(|d| d == expected), "missing {expected}");
        }
    }

    #[test]
    fn registering_twice_fails() {
        let mut registry = registry();
        assert!(register_builtins(&mut registry, &DestinationConfig::default()).is_err());
    }

    #[tokio::test]
    async fn resolved_local_files_factory_builds_a_source() {
        let dir = tempfile::tempdir().unwrap();
        let factory = registry()
            .resolve_source("local_files", "LocalFilesSource")
            .unwrap();
        let source = factory
            .create(
                AuthenticatedCredential::None,
                &serde_json::json!({"path": dir.path()}),
            )
            .await
            .unwrap();
        assert!(source.generate_entities().await.unwrap().is_empty());
    }

    #[test]
    fn chunker_resolves_as_transformer() {
        let chunker = registry()
            .resolve_transformer("text_chunker", "chunk_text")
            .unwrap();
        let entity = tributary_core::ChunkEntity::new("a", "local_files", "FileEntity")
            .unwrap()
            .with_content("hello");
        assert_eq!(chunker(entity, &serde_json::Value::Null).unwrap().len(), 1);
    }
}
