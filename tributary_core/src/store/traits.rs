use async_trait::async_trait;
use uuid::Uuid;

use crate::Result;
use crate::models::{
    Actor, Connection, EntityDefinitionDescriptor, IntegrationDescriptor, StoredCredential,
    TransformerDescriptor,
};

/// Persistence boundary for sync assembly.
///
/// Lookups taking an `Actor` are scoped to the actor's org: records owned by
/// another org are reported as absent (`Ok(None)`), never as an error.
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn get_connection(&self, id: Uuid, actor: &Actor) -> Result<Option<Connection>>;

    async fn get_integration(&self, short_name: &str) -> Result<Option<IntegrationDescriptor>>;

    async fn get_credential(&self, id: Uuid, actor: &Actor) -> Result<Option<StoredCredential>>;

    /// Replace the encrypted payload of an existing credential.
    async fn update_credential(
        &self,
        id: Uuid,
        actor: &Actor,
        encrypted_credentials: Vec<u8>,
    ) -> Result<()>;

    async fn list_transformers(
        &self,
        sync_id: Uuid,
        actor: &Actor,
    ) -> Result<Vec<TransformerDescriptor>>;

    async fn list_entity_definitions(
        &self,
        sync_id: Uuid,
        actor: &Actor,
    ) -> Result<Vec<EntityDefinitionDescriptor>>;
}
