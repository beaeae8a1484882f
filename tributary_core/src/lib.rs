//! Tributary core: everything needed to turn a stored sync definition into a
//! runnable `SyncContext`.

pub mod auth;
pub mod config;
pub mod connectors;
pub mod context;
pub mod credentials;
pub mod error;
pub mod factory;
pub mod models;
pub mod progress;
pub mod registry;
pub mod store;
pub mod telemetry;

pub use auth::{AuthCatalog, AuthStrategy, AuthType, AuthenticatedCredential};
pub use config::{CatalogConfig, CredentialConfig, DestinationConfig};
pub use connectors::{
    ChunkEntity, Destination, DestinationFactory, EmbeddingModel, EmbeddingModelFactory,
    EntityDefinition, Source, SourceFactory, TransformerFn,
};
pub use context::{SyncContext, SyncContextAssembler};
pub use credentials::{CredentialCipher, CredentialResolver, CredentialSchema, TokenRefresher};
pub use error::{Error, Result};
pub use factory::{ConnectorFactory, DestinationSelection, PluginRef};
pub use models::{
    Actor, Connection, IntegrationDescriptor, IntegrationType, OrgId, Sync, SyncJob, WhiteLabel,
};
pub use progress::{ProgressPublisher, SyncProgress, SyncProgressUpdate};
pub use registry::{ConnectorCategory, Implementation, PluginRegistry};
pub use store::{InMemorySyncStore, SyncStore};
