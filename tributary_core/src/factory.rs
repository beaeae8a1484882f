//! Connector factory: turns connection records into live source, embedding
//! model and destination instances.

use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::{AuthCatalog, AuthStrategy, AuthType};
use crate::config::DestinationConfig;
use crate::connectors::{Destination, EmbeddingModel, Source};
use crate::credentials::{CredentialResolver, CredentialSchema};
use crate::models::{Actor, Connection, IntegrationDescriptor, Sync};
use crate::registry::{PluginRegistry, auth_config_unit};
use crate::store::SyncStore;
use crate::{Error, Result};

/// Registry key of a destination or embedding model unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRef {
    pub short_name: String,
    pub implementation_name: String,
}

impl PluginRef {
    pub fn new(short_name: impl Into<String>, implementation_name: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            implementation_name: implementation_name.into(),
        }
    }
}

/// How a sync's destination and embedding model are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationSelection {
    /// Always the same pair, whatever connections the sync declares.
    Fixed {
        destination: PluginRef,
        embedding_model: PluginRef,
    },
    /// Follow the sync's destination / embedding-model connections, using the
    /// fallbacks when the sync declares none.
    ByConnection {
        fallback_destination: PluginRef,
        fallback_embedding_model: PluginRef,
    },
}

impl Default for DestinationSelection {
    fn default() -> Self {
        DestinationSelection::Fixed {
            destination: PluginRef::new("pgvector", "PgVectorDestination"),
            embedding_model: PluginRef::new("local_text2vec", "LocalText2Vec"),
        }
    }
}

#[derive(Clone)]
pub struct ConnectorFactory {
    registry: Arc<PluginRegistry>,
    catalog: Arc<AuthCatalog>,
    store: Arc<dyn SyncStore>,
    resolver: CredentialResolver,
    selection: DestinationSelection,
}

impl ConnectorFactory {
    pub fn new(
        registry: Arc<PluginRegistry>,
        catalog: Arc<AuthCatalog>,
        store: Arc<dyn SyncStore>,
        resolver: CredentialResolver,
    ) -> Self {
        Self {
            registry,
            catalog,
            store,
            resolver,
            selection: DestinationSelection::default(),
        }
    }

    pub fn with_selection(mut self, selection: DestinationSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Apply the deployment's destination wiring.
    pub fn with_config(self, config: &DestinationConfig) -> Self {
        self.with_selection(config.selection.clone())
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn SyncStore> {
        &self.store
    }

    /// Build an authenticated source for `connection_id`.
    ///
    /// The source plugin and credential schema are resolved before any
    /// credential work, so a configuration error never consumes a single-use
    /// refresh token.
    #[instrument(level = "info", skip(self, actor), fields(org_id = %actor.org_id))]
    pub async fn create_source(&self, connection_id: Uuid, actor: &Actor) -> Result<Arc<dyn Source>> {
        let connection = self
            .store
            .get_connection(connection_id, actor)
            .await?
            .ok_or_else(|| Error::not_found(format!("connection '{connection_id}'")))?;
        let descriptor = self
            .store
            .get_integration(&connection.short_name)
            .await?
            .ok_or_else(|| Error::not_found(format!("source '{}'", connection.short_name)))?;

        let strategy = self.strategy_for(&descriptor)?;
        let factory = self
            .registry
            .resolve_source(&descriptor.short_name, &descriptor.implementation_name)?;
        let schema = self.schema_for(&descriptor, strategy.auth_type())?;

        let credential = self
            .resolver
            .resolve(&strategy, &connection, actor, schema.as_deref())
            .await?;
        let source = factory.create(credential, &connection.config).await?;

        tracing::info!(
            integration = %descriptor.short_name,
            auth_type = %strategy.auth_type(),
            "source created"
        );
        Ok(source)
    }

    #[instrument(level = "info", skip_all, fields(sync_id = %sync.id))]
    pub async fn create_embedding_model(
        &self,
        sync: &Sync,
        actor: &Actor,
    ) -> Result<Arc<dyn EmbeddingModel>> {
        let plugin = match &self.selection {
            DestinationSelection::Fixed {
                embedding_model, ..
            } => embedding_model.clone(),
            DestinationSelection::ByConnection {
                fallback_embedding_model,
                ..
            } => match sync.embedding_model_connection_id {
                Some(id) => self.plugin_for_connection(id, actor).await?,
                None => fallback_embedding_model.clone(),
            },
        };
        let factory = self
            .registry
            .resolve_embedding_model(&plugin.short_name, &plugin.implementation_name)?;
        let model = factory.create().await?;
        tracing::debug!(
            embedding_model = %plugin.short_name,
            dimensions = model.vector_dimensions(),
            "embedding model created"
        );
        Ok(model)
    }

    #[instrument(level = "info", skip_all, fields(sync_id = %sync.id))]
    pub async fn create_destination(
        &self,
        sync: &Sync,
        embedding_model: Arc<dyn EmbeddingModel>,
        actor: &Actor,
    ) -> Result<Arc<dyn Destination>> {
        let plugin = match &self.selection {
            DestinationSelection::Fixed { destination, .. } => destination.clone(),
            DestinationSelection::ByConnection {
                fallback_destination,
                ..
            } => match sync.destination_connection_id {
                Some(id) => self.plugin_for_connection(id, actor).await?,
                None => fallback_destination.clone(),
            },
        };
        let factory = self
            .registry
            .resolve_destination(&plugin.short_name, &plugin.implementation_name)?;
        let destination = factory.create(sync.id, embedding_model).await?;
        tracing::debug!(destination = %plugin.short_name, "destination created");
        Ok(destination)
    }

    /// The catalog entry wins; integrations whose strategy carries no settings
    /// may be absent from the catalog and fall back to their descriptor.
    fn strategy_for(&self, descriptor: &IntegrationDescriptor) -> Result<AuthStrategy> {
        match self.catalog.get(&descriptor.short_name) {
            Ok(strategy) => {
                if let Some(declared) = descriptor.auth_type
                    && declared != strategy.auth_type()
                {
                    tracing::warn!(
                        integration = %descriptor.short_name,
                        declared = %declared,
                        catalog = %strategy.auth_type(),
                        "descriptor auth_type disagrees with catalog; using catalog"
                    );
                }
                Ok(strategy.clone())
            }
            Err(Error::NotFound(msg)) => match descriptor.auth_type {
                Some(AuthType::None) => Ok(AuthStrategy::None),
                Some(AuthType::NativeFunctionality) => Ok(AuthStrategy::NativeFunctionality),
                Some(AuthType::ApiKey) => Ok(AuthStrategy::ApiKey),
                Some(AuthType::ConfigClass) => Ok(AuthStrategy::ConfigClass),
                _ => Err(Error::NotFound(msg)),
            },
            Err(other) => Err(other),
        }
    }

    fn schema_for(
        &self,
        descriptor: &IntegrationDescriptor,
        auth_type: AuthType,
    ) -> Result<Option<Arc<dyn CredentialSchema>>> {
        if !auth_type.is_structured() {
            return Ok(None);
        }
        let class = descriptor.auth_config_class.as_deref().ok_or_else(|| {
            Error::resolution(format!(
                "auth config class required for auth type {auth_type} ({})",
                descriptor.short_name
            ))
        })?;
        let schema = self
            .registry
            .resolve_auth_config(auth_config_unit(auth_type), class)?;
        Ok(Some(schema))
    }

    async fn plugin_for_connection(&self, connection_id: Uuid, actor: &Actor) -> Result<PluginRef> {
        let connection: Connection = self
            .store
            .get_connection(connection_id, actor)
            .await?
            .ok_or_else(|| Error::not_found(format!("connection '{connection_id}'")))?;
        let descriptor = self
            .store
            .get_integration(&connection.short_name)
            .await?
            .ok_or_else(|| Error::not_found(format!("integration '{}'", connection.short_name)))?;
        Ok(PluginRef::new(
            descriptor.short_name,
            descriptor.implementation_name,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthenticatedCredential;
    use crate::connectors::{
        ChunkEntity, DestinationFactory, EmbeddingModelFactory, SourceFactory,
    };
    use crate::credentials::{PlaintextCipher, SerdeSchema, TokenRefresher, TokenResponse};
    use crate::auth::OAuth2Settings;
    use crate::models::{IntegrationType, OrgId};
    use crate::registry::{ConnectorCategory, Implementation};
    use crate::store::InMemorySyncStore;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingSource {
        credential: AuthenticatedCredential,
    }

    #[async_trait]
    impl Source for RecordingSource {
        fn short_name(&self) -> &'static str {
            "recording"
        }

        async fn generate_entities(&self) -> Result<Vec<ChunkEntity>> {
            let id = match &self.credential {
                AuthenticatedCredential::None => "anonymous".to_string(),
                AuthenticatedCredential::AccessToken(t) => t.clone(),
                AuthenticatedCredential::Structured { schema, .. } => schema.clone(),
            };
            Ok(vec![ChunkEntity::new(id, "recording", "ChunkEntity")?])
        }
    }

    struct RecordingSourceFactory;

    #[async_trait]
    impl SourceFactory for RecordingSourceFactory {
        async fn create(
            &self,
            credential: AuthenticatedCredential,
            _config: &Value,
        ) -> Result<Arc<dyn Source>> {
            Ok(Arc::new(RecordingSource { credential }))
        }
    }

    struct FixedModel(&'static str);

    #[async_trait]
    impl EmbeddingModel for FixedModel {
        fn model_name(&self) -> &str {
            self.0
        }

        fn vector_dimensions(&self) -> usize {
            3
        }

        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; 3]).collect())
        }
    }

    struct FixedModelFactory(&'static str);

    #[async_trait]
    impl EmbeddingModelFactory for FixedModelFactory {
        async fn create(&self) -> Result<Arc<dyn EmbeddingModel>> {
            Ok(Arc::new(FixedModel(self.0)))
        }
    }

    struct NamedDestination(&'static str);

    #[async_trait]
    impl Destination for NamedDestination {
        fn short_name(&self) -> &'static str {
            self.0
        }

        async fn bulk_insert(&self, _entities: &[ChunkEntity], _vectors: &[Vec<f32>]) -> Result<()> {
            Ok(())
        }
    }

    struct NamedDestinationFactory(&'static str);

    #[async_trait]
    impl DestinationFactory for NamedDestinationFactory {
        async fn create(
            &self,
            _sync_id: Uuid,
            _embedding_model: Arc<dyn EmbeddingModel>,
        ) -> Result<Arc<dyn Destination>> {
            Ok(Arc::new(NamedDestination(self.0)))
        }
    }

    #[derive(Default)]
    struct CountingRefresher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn refresh(&self, _settings: &OAuth2Settings, _token: &str) -> Result<TokenResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TokenResponse {
                access_token: "fresh".into(),
                token_type: None,
                expires_in: None,
                refresh_token: Some("rotated".into()),
                scope: None,
                extra_fields: Default::default(),
            })
        }
    }

    #[derive(Serialize, Deserialize)]
    struct KeyConfig {
        api_key: String,
    }

    fn registry() -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        for short_name in ["local_files", "linear", "jira"] {
            registry
                .register(ConnectorCategory::Source, short_name, || {
                    BTreeMap::from([(
                        "RecordingSource".to_string(),
                        Implementation::Source(Arc::new(RecordingSourceFactory)),
                    )])
                })
                .unwrap();
        }
        registry
            .register(ConnectorCategory::AuthConfig, "auth", || {
                BTreeMap::from([(
                    "KeyConfig".to_string(),
                    Implementation::AuthConfig(Arc::new(SerdeSchema::<KeyConfig>::new("KeyConfig"))),
                )])
            })
            .unwrap();
        for (short_name, implementation) in [("pgvector", "PgVectorDestination"), ("qdrant", "QdrantDestination")] {
            registry
                .register(ConnectorCategory::Destination, short_name, move || {
                    let factory: Arc<dyn DestinationFactory> =
                        Arc::new(NamedDestinationFactory(if implementation == "PgVectorDestination" {
                            "pgvector"
                        } else {
                            "qdrant"
                        }));
                    BTreeMap::from([(implementation.to_string(), Implementation::Destination(factory))])
                })
                .unwrap();
        }
        for (short_name, implementation) in [("local_text2vec", "LocalText2Vec"), ("openai", "OpenAIText2Vec")] {
            registry
                .register(ConnectorCategory::EmbeddingModel, short_name, move || {
                    let name = if short_name == "openai" { "openai" } else { "local" };
                    BTreeMap::from([(
                        implementation.to_string(),
                        Implementation::EmbeddingModel(Arc::new(FixedModelFactory(name))),
                    )])
                })
                .unwrap();
        }
        registry
    }

    const CATALOG: &str = r#"
integrations:
  jira:
    auth_type: oauth2_with_refresh_rotating
    url: https://auth.example.com/authorize
    backend_url: https://auth.example.com/oauth/token
    grant_type: authorization_code
    client_id: jira-client
    content_type: application/json
    client_credential_location: body
"#;

    struct Harness {
        store: InMemorySyncStore,
        actor: Actor,
        refresher: Arc<CountingRefresher>,
        factory: ConnectorFactory,
    }

    fn harness() -> Harness {
        let store = InMemorySyncStore::new();
        let actor = Actor::system(OrgId(Uuid::new_v4()), "test");
        let refresher = Arc::new(CountingRefresher::default());
        let resolver = CredentialResolver::new(
            Arc::new(store.clone()),
            Arc::new(PlaintextCipher),
            refresher.clone(),
        );
        let factory = ConnectorFactory::new(
            Arc::new(registry()),
            Arc::new(AuthCatalog::from_yaml_str(CATALOG).unwrap()),
            Arc::new(store.clone()),
            resolver,
        );
        Harness {
            store,
            actor,
            refresher,
            factory,
        }
    }

    fn integration(short_name: &str, integration_type: IntegrationType, auth_type: Option<AuthType>, implementation: &str) -> IntegrationDescriptor {
        IntegrationDescriptor {
            short_name: short_name.into(),
            name: short_name.into(),
            integration_type,
            auth_type,
            auth_config_class: None,
            implementation_name: implementation.into(),
        }
    }

    fn connection(h: &Harness, short_name: &str, integration_type: IntegrationType) -> Connection {
        let connection = Connection {
            id: Uuid::new_v4(),
            org_id: h.actor.org_id,
            name: short_name.into(),
            short_name: short_name.into(),
            integration_type,
            integration_credential_id: None,
            config: Value::Null,
        };
        h.store.insert_connection(connection.clone());
        connection
    }

    fn sync(h: &Harness, source: Uuid) -> Sync {
        Sync {
            id: Uuid::new_v4(),
            org_id: h.actor.org_id,
            name: "nightly".into(),
            source_connection_id: source,
            destination_connection_id: None,
            embedding_model_connection_id: None,
        }
    }

    #[tokio::test]
    async fn none_source_absent_from_catalog_is_built_without_credential() {
        let h = harness();
        h.store.insert_integration(integration(
            "local_files",
            IntegrationType::Source,
            Some(AuthType::None),
            "RecordingSource",
        ));
        let conn = connection(&h, "local_files", IntegrationType::Source);

        let source = h.factory.create_source(conn.id, &h.actor).await.unwrap();
        let entities = source.generate_entities().await.unwrap();
        assert_eq!(entities[0].entity_id, "anonymous");
    }

    #[tokio::test]
    async fn missing_connection_and_descriptor_are_not_found() {
        let h = harness();
        let err = h.factory.create_source(Uuid::new_v4(), &h.actor).await.err().unwrap();
        assert!(matches!(err, Error::NotFound(msg) if msg.contains("connection")));

        let conn = connection(&h, "local_files", IntegrationType::Source);
        let err = h.factory.create_source(conn.id, &h.actor).await.err().unwrap();
        assert!(matches!(err, Error::NotFound(msg) if msg.contains("source")));
    }

    #[tokio::test]
    async fn oauth_source_missing_from_catalog_is_not_found() {
        let h = harness();
        h.store.insert_integration(integration(
            "local_files",
            IntegrationType::Source,
            Some(AuthType::OAuth2),
            "RecordingSource",
        ));
        let conn = connection(&h, "local_files", IntegrationType::Source);
        let err = h.factory.create_source(conn.id, &h.actor).await.err().unwrap();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn structured_source_without_schema_class_fails_before_credential_lookup() {
        let h = harness();
        h.store.insert_integration(integration(
            "linear",
            IntegrationType::Source,
            Some(AuthType::ApiKey),
            "RecordingSource",
        ));
        let conn = connection(&h, "linear", IntegrationType::Source);
        let err = h.factory.create_source(conn.id, &h.actor).await.err().unwrap();
        assert!(matches!(err, Error::Resolution(msg) if msg.contains("auth config class")));
    }

    #[tokio::test]
    async fn unknown_implementation_does_not_touch_the_refresh_token() {
        let h = harness();
        h.store.insert_integration(integration(
            "jira",
            IntegrationType::Source,
            Some(AuthType::OAuth2WithRefreshRotating),
            "NoSuchSource",
        ));
        let conn = connection(&h, "jira", IntegrationType::Source);
        let err = h.factory.create_source(conn.id, &h.actor).await.err().unwrap();
        assert!(matches!(err, Error::Resolution(_)));
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fixed_selection_ignores_sync_connections() {
        let h = harness();
        h.store.insert_integration(integration(
            "qdrant",
            IntegrationType::Destination,
            None,
            "QdrantDestination",
        ));
        let dest = connection(&h, "qdrant", IntegrationType::Destination);
        let mut sync = sync(&h, Uuid::new_v4());
        sync.destination_connection_id = Some(dest.id);

        let model = h.factory.create_embedding_model(&sync, &h.actor).await.unwrap();
        assert_eq!(model.model_name(), "local");
        let destination = h
            .factory
            .create_destination(&sync, model, &h.actor)
            .await
            .unwrap();
        assert_eq!(destination.short_name(), "pgvector");
    }

    #[tokio::test]
    async fn by_connection_selection_follows_the_sync() {
        let h = harness();
        let factory = h.factory.clone().with_selection(DestinationSelection::ByConnection {
            fallback_destination: PluginRef::new("pgvector", "PgVectorDestination"),
            fallback_embedding_model: PluginRef::new("local_text2vec", "LocalText2Vec"),
        });
        h.store.insert_integration(integration(
            "qdrant",
            IntegrationType::Destination,
            None,
            "QdrantDestination",
        ));
        h.store.insert_integration(integration(
            "openai",
            IntegrationType::EmbeddingModel,
            None,
            "OpenAIText2Vec",
        ));
        let dest = connection(&h, "qdrant", IntegrationType::Destination);
        let emb = connection(&h, "openai", IntegrationType::EmbeddingModel);

        let mut declared = sync(&h, Uuid::new_v4());
        declared.destination_connection_id = Some(dest.id);
        declared.embedding_model_connection_id = Some(emb.id);
        let model = factory.create_embedding_model(&declared, &h.actor).await.unwrap();
        assert_eq!(model.model_name(), "openai");
        let destination = factory.create_destination(&declared, model, &h.actor).await.unwrap();
        assert_eq!(destination.short_name(), "qdrant");

        let bare = sync(&h, Uuid::new_v4());
        let model = factory.create_embedding_model(&bare, &h.actor).await.unwrap();
        assert_eq!(model.model_name(), "local");
        let destination = factory.create_destination(&bare, model, &h.actor).await.unwrap();
        assert_eq!(destination.short_name(), "pgvector");
    }

    #[tokio::test]
    async fn destination_config_from_env_reaches_the_factory() {
        let h = harness();
        let config = DestinationConfig::from_lookup(|key| match key {
            "TRIBUTARY_DESTINATION_SELECTION" => Some("by_connection".to_string()),
            _ => None,
        })
        .unwrap();
        let factory = h.factory.clone().with_config(&config);
        h.store.insert_integration(integration(
            "qdrant",
            IntegrationType::Destination,
            None,
            "QdrantDestination",
        ));
        let dest = connection(&h, "qdrant", IntegrationType::Destination);
        let mut declared = sync(&h, Uuid::new_v4());
        declared.destination_connection_id = Some(dest.id);

        let model = factory.create_embedding_model(&declared, &h.actor).await.unwrap();
        let destination = factory.create_destination(&declared, model.clone(), &h.actor).await.unwrap();
        assert_eq!(destination.short_name(), "qdrant");

        let fixed = h.factory.clone().with_config(&DestinationConfig::default());
        let destination = fixed.create_destination(&declared, model, &h.actor).await.unwrap();
        assert_eq!(destination.short_name(), "pgvector");
    }
}
