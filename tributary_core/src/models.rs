use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::AuthType;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdParseError {
    #[error("invalid uuid: {0}")]
    InvalidUuid(String),
}

/// Tenant identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(pub Uuid);

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for OrgId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for OrgId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Uuid::parse_str(s).map_err(|_| IdParseError::InvalidUuid(s.to_string()))?;
        Ok(Self(id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActorIdentity {
    /// A human user of the platform.
    User {
        user_id: Uuid,
        email: Option<String>,
    },
    /// A platform component (scheduler, CLI, worker).
    System { name: String },
}

/// Principal on whose behalf a sync is assembled.
///
/// Every persistence lookup is scoped to `org_id`; records of other orgs
/// behave as if they did not exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub org_id: OrgId,
    pub identity: ActorIdentity,
}

impl Actor {
    pub fn user(org_id: OrgId, user_id: Uuid) -> Self {
        Self {
            org_id,
            identity: ActorIdentity::User {
                user_id,
                email: None,
            },
        }
    }

    pub fn system(org_id: OrgId, name: impl Into<String>) -> Self {
        Self {
            org_id,
            identity: ActorIdentity::System { name: name.into() },
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationType {
    Source,
    Destination,
    EmbeddingModel,
}

/// A configured link between an org and one integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: Uuid,
    pub org_id: OrgId,
    pub name: String,
    pub short_name: String,
    pub integration_type: IntegrationType,
    #[serde(default)]
    pub integration_credential_id: Option<Uuid>,
    /// Integration-specific, non-secret settings (paths, workspace ids).
    #[serde(default)]
    pub config: Value,
}

/// Static description of an integration as registered with the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationDescriptor {
    pub short_name: String,
    pub name: String,
    pub integration_type: IntegrationType,
    #[serde(default)]
    pub auth_type: Option<AuthType>,
    /// Credential schema name for structured strategies.
    #[serde(default)]
    pub auth_config_class: Option<String>,
    pub implementation_name: String,
}

/// Encrypted credential record. Only the cipher can read `encrypted_credentials`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    pub id: Uuid,
    pub org_id: OrgId,
    pub integration_short_name: String,
    pub encrypted_credentials: Vec<u8>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sync {
    pub id: Uuid,
    pub org_id: OrgId,
    pub name: String,
    pub source_connection_id: Uuid,
    #[serde(default)]
    pub destination_connection_id: Option<Uuid>,
    #[serde(default)]
    pub embedding_model_connection_id: Option<Uuid>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: Uuid,
    pub sync_id: Uuid,
    pub org_id: OrgId,
    pub status: SyncJobStatus,
    pub created_at: DateTime<Utc>,
}

impl SyncJob {
    pub fn pending(sync: &Sync) -> Self {
        Self {
            id: Uuid::new_v4(),
            sync_id: sync.id,
            org_id: sync.org_id,
            status: SyncJobStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// Partner branding for OAuth flows started on behalf of a third party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhiteLabel {
    pub id: Uuid,
    pub name: String,
    pub source_short_name: String,
    pub client_id: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Transformer registered for use in syncs. `module_name` is the registry
/// unit, `method_name` both the implementation name and the context key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformerDescriptor {
    pub name: String,
    pub module_name: String,
    pub method_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinitionDescriptor {
    pub id: Uuid,
    pub name: String,
    pub module_name: String,
    pub class_name: String,
}
