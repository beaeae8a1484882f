use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    Actor, Connection, EntityDefinitionDescriptor, IntegrationDescriptor, StoredCredential,
    TransformerDescriptor,
};
use crate::store::traits::SyncStore;
use crate::{Error, Result};

/// In-memory `SyncStore` for local development and tests.
///
/// Cloning shares the underlying maps.
#[derive(Clone, Default)]
pub struct InMemorySyncStore {
    connections: Arc<DashMap<Uuid, Connection>>,
    integrations: Arc<DashMap<String, IntegrationDescriptor>>,
    credentials: Arc<DashMap<Uuid, StoredCredential>>,
    transformers: Arc<DashMap<Uuid, Vec<TransformerDescriptor>>>,
    entity_definitions: Arc<DashMap<Uuid, Vec<EntityDefinitionDescriptor>>>,
}

impl InMemorySyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_connection(&self, connection: Connection) {
        self.connections.insert(connection.id, connection);
    }

    pub fn insert_integration(&self, descriptor: IntegrationDescriptor) {
        self.integrations
            .insert(descriptor.short_name.clone(), descriptor);
    }

    pub fn insert_credential(&self, credential: StoredCredential) {
        self.credentials.insert(credential.id, credential);
    }

    pub fn set_transformers(&self, sync_id: Uuid, transformers: Vec<TransformerDescriptor>) {
        self.transformers.insert(sync_id, transformers);
    }

    pub fn set_entity_definitions(
        &self,
        sync_id: Uuid,
        definitions: Vec<EntityDefinitionDescriptor>,
    ) {
        self.entity_definitions.insert(sync_id, definitions);
    }

    /// Raw credential record, ignoring org scoping (primarily for tests).
    pub fn credential(&self, id: Uuid) -> Option<StoredCredential> {
        self.credentials.get(&id).map(|c| c.value().clone())
    }
}

#[async_trait]
impl SyncStore for InMemorySyncStore {
    async fn get_connection(&self, id: Uuid, actor: &Actor) -> Result<Option<Connection>> {
        Ok(self
            .connections
            .get(&id)
            .filter(|c| c.org_id == actor.org_id)
            .map(|c| c.value().clone()))
    }

    async fn get_integration(&self, short_name: &str) -> Result<Option<IntegrationDescriptor>> {
        Ok(self.integrations.get(short_name).map(|d| d.value().clone()))
    }

    async fn get_credential(&self, id: Uuid, actor: &Actor) -> Result<Option<StoredCredential>> {
        Ok(self
            .credentials
            .get(&id)
            .filter(|c| c.org_id == actor.org_id)
            .map(|c| c.value().clone()))
    }

    async fn update_credential(
        &self,
        id: Uuid,
        actor: &Actor,
        encrypted_credentials: Vec<u8>,
    ) -> Result<()> {
        let mut entry = self
            .credentials
            .get_mut(&id)
            .filter(|c| c.org_id == actor.org_id)
            .ok_or_else(|| Error::not_found(format!("integration credential '{id}'")))?;
        entry.encrypted_credentials = encrypted_credentials;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn list_transformers(
        &self,
        sync_id: Uuid,
        _actor: &Actor,
    ) -> Result<Vec<TransformerDescriptor>> {
        Ok(self
            .transformers
            .get(&sync_id)
            .map(|t| t.value().clone())
            .unwrap_or_default())
    }

    async fn list_entity_definitions(
        &self,
        sync_id: Uuid,
        _actor: &Actor,
    ) -> Result<Vec<EntityDefinitionDescriptor>> {
        Ok(self
            .entity_definitions
            .get(&sync_id)
            .map(|d| d.value().clone())
            .unwrap_or_default())
    }
}
