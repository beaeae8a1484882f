//! Plugin registry: resolves `(category, short_name, implementation_name)` to a
//! loaded implementation.
//!
//! Integrations register a loader per `(category, short_name)` unit at
//! startup. A unit's loader runs on first lookup and its implementations are
//! kept for the life of the registry. After startup the registry is shared
//! read-only behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::auth::AuthType;
use crate::connectors::{
    DestinationFactory, EmbeddingModelFactory, EntityDefinition, SourceFactory, TransformerFn,
};
use crate::credentials::CredentialSchema;
use crate::{Error, Result};

/// Auth-config unit holding SigV4 credential schemas.
pub const SIGV4_AUTH_UNIT: &str = "sigv4";
/// Auth-config unit holding every other credential schema.
pub const DEFAULT_AUTH_UNIT: &str = "auth";

/// Registry unit that holds the credential schema for `auth_type`.
pub fn auth_config_unit(auth_type: AuthType) -> &'static str {
    match auth_type {
        AuthType::SigV4 => SIGV4_AUTH_UNIT,
        _ => DEFAULT_AUTH_UNIT,
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorCategory {
    Source,
    Destination,
    EmbeddingModel,
    Transformer,
    EntityDefinition,
    AuthConfig,
}

impl ConnectorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectorCategory::Source => "source",
            ConnectorCategory::Destination => "destination",
            ConnectorCategory::EmbeddingModel => "embedding_model",
            ConnectorCategory::Transformer => "transformer",
            ConnectorCategory::EntityDefinition => "entity_definition",
            ConnectorCategory::AuthConfig => "auth_config",
        }
    }
}

impl fmt::Display for ConnectorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectorDescriptor {
    pub category: ConnectorCategory,
    pub short_name: String,
    pub implementation_name: String,
}

impl fmt::Display for ConnectorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.category, self.short_name, self.implementation_name
        )
    }
}

#[derive(Clone)]
pub enum Implementation {
    Source(Arc<dyn SourceFactory>),
    Destination(Arc<dyn DestinationFactory>),
    EmbeddingModel(Arc<dyn EmbeddingModelFactory>),
    Transformer(TransformerFn),
    EntityDefinition(Arc<EntityDefinition>),
    AuthConfig(Arc<dyn CredentialSchema>),
}

impl Implementation {
    pub fn category(&self) -> ConnectorCategory {
        match self {
            Implementation::Source(_) => ConnectorCategory::Source,
            Implementation::Destination(_) => ConnectorCategory::Destination,
            Implementation::EmbeddingModel(_) => ConnectorCategory::EmbeddingModel,
            Implementation::Transformer(_) => ConnectorCategory::Transformer,
            Implementation::EntityDefinition(_) => ConnectorCategory::EntityDefinition,
            Implementation::AuthConfig(_) => ConnectorCategory::AuthConfig,
        }
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Implementation::{}", self.category())
    }
}

pub type UnitImplementations = BTreeMap<String, Implementation>;

type Loader = Box<dyn Fn() -> UnitImplementations + Send + Sync>;

struct PluginUnit {
    loader: Loader,
    loaded: OnceLock<UnitImplementations>,
}

impl PluginUnit {
    fn implementations(&self) -> &UnitImplementations {
        self.loaded.get_or_init(|| (self.loader)())
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    units: HashMap<(ConnectorCategory, String), PluginUnit>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit loader. Each `(category, short_name)` may be registered
    /// once.
    pub fn register<F>(
        &mut self,
        category: ConnectorCategory,
        short_name: impl Into<String>,
        loader: F,
    ) -> Result<()>
    where
        F: Fn() -> UnitImplementations + Send + Sync + 'static,
    {
        let short_name = short_name.into();
        let key = (category, short_name);
        if self.units.contains_key(&key) {
            return Err(Error::InvalidInput(format!(
                "plugin unit {}/{} is already registered",
                key.0, key.1
            )));
        }
        tracing::debug!(category = %key.0, short_name = %key.1, "plugin unit registered");
        self.units.insert(
            key,
            PluginUnit {
                loader: Box::new(loader),
                loaded: OnceLock::new(),
            },
        );
        Ok(())
    }

    pub fn contains(&self, category: ConnectorCategory, short_name: &str) -> bool {
        self.units.contains_key(&(category, short_name.to_string()))
    }

    pub fn resolve(
        &self,
        category: ConnectorCategory,
        short_name: &str,
        implementation_name: &str,
    ) -> Result<Implementation> {
        let unit = self
            .units
            .get(&(category, short_name.to_string()))
            .ok_or_else(|| {
                Error::resolution(format!("no {category} plugin registered as '{short_name}'"))
            })?;
        let implementation = unit
            .implementations()
            .get(implementation_name)
            .ok_or_else(|| {
                Error::resolution(format!(
                    "{category} plugin '{short_name}' has no implementation '{implementation_name}'"
                ))
            })?;
        if implementation.category() != category {
            return Err(Error::resolution(format!(
                "{category}/{short_name}/{implementation_name} is a {} implementation",
                implementation.category()
            )));
        }
        Ok(implementation.clone())
    }

    pub fn resolve_source(
        &self,
        short_name: &str,
        implementation_name: &str,
    ) -> Result<Arc<dyn SourceFactory>> {
        match self.resolve(ConnectorCategory::Source, short_name, implementation_name)? {
            Implementation::Source(f) => Ok(f),
            other => Err(mismatch(ConnectorCategory::Source, &other)),
        }
    }

    pub fn resolve_destination(
        &self,
        short_name: &str,
        implementation_name: &str,
    ) -> Result<Arc<dyn DestinationFactory>> {
        match self.resolve(ConnectorCategory::Destination, short_name, implementation_name)? {
            Implementation::Destination(f) => Ok(f),
            other => Err(mismatch(ConnectorCategory::Destination, &other)),
        }
    }

    pub fn resolve_embedding_model(
        &self,
        short_name: &str,
        implementation_name: &str,
    ) -> Result<Arc<dyn EmbeddingModelFactory>> {
        match self.resolve(
            ConnectorCategory::EmbeddingModel,
            short_name,
            implementation_name,
        )? {
            Implementation::EmbeddingModel(f) => Ok(f),
            other => Err(mismatch(ConnectorCategory::EmbeddingModel, &other)),
        }
    }

    pub fn resolve_transformer(
        &self,
        short_name: &str,
        implementation_name: &str,
    ) -> Result<TransformerFn> {
        match self.resolve(ConnectorCategory::Transformer, short_name, implementation_name)? {
            Implementation::Transformer(f) => Ok(f),
            other => Err(mismatch(ConnectorCategory::Transformer, &other)),
        }
    }

    pub fn resolve_entity_definition(
        &self,
        short_name: &str,
        implementation_name: &str,
    ) -> Result<Arc<EntityDefinition>> {
        match self.resolve(
            ConnectorCategory::EntityDefinition,
            short_name,
            implementation_name,
        )? {
            Implementation::EntityDefinition(d) => Ok(d),
            other => Err(mismatch(ConnectorCategory::EntityDefinition, &other)),
        }
    }

    pub fn resolve_auth_config(
        &self,
        short_name: &str,
        implementation_name: &str,
    ) -> Result<Arc<dyn CredentialSchema>> {
        match self.resolve(ConnectorCategory::AuthConfig, short_name, implementation_name)? {
            Implementation::AuthConfig(s) => Ok(s),
            other => Err(mismatch(ConnectorCategory::AuthConfig, &other)),
        }
    }

    /// Every registered implementation, sorted. Loads all units.
    pub fn descriptors(&self) -> Vec<ConnectorDescriptor> {
        let mut out: Vec<ConnectorDescriptor> = self
            .units
            .iter()
            .flat_map(|((category, short_name), unit)| {
                unit.implementations()
                    .keys()
                    .map(|name| ConnectorDescriptor {
                        category: *category,
                        short_name: short_name.clone(),
                        implementation_name: name.clone(),
                    })
            })
            .collect();
        out.sort();
        out
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("units", &self.units.len())
            .finish()
    }
}

fn mismatch(expected: ConnectorCategory, found: &Implementation) -> Error {
    Error::resolution(format!(
        "expected a {expected} implementation, found {}",
        found.category()
    ))
}
