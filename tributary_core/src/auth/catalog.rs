//! Environment-specific catalog of integration auth strategies.
//!
//! The catalog document is YAML with a top-level `integrations` mapping:
//!
//! ```yaml
//! integrations:
//!   hubspot:
//!     auth_type: oauth2_with_refresh
//!     url: https://app.hubspot.com/oauth/authorize
//!     backend_url: https://api.hubapi.com/oauth/v1/token
//!     ...
//! ```
//!
//! Every entry is validated when the catalog is built; a catalog that loads is
//! fully usable.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::auth::models::{AuthStrategy, AuthType};
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthCatalog {
    entries: BTreeMap<String, AuthStrategy>,
}

impl AuthCatalog {
    #[tracing::instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let doc = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::backend(format!("read catalog {}", path.display()), e))?;
        let catalog = Self::from_yaml_str(&doc)?;
        tracing::info!(integrations = catalog.len(), "auth catalog loaded");
        Ok(catalog)
    }

    pub fn from_yaml_str(doc: &str) -> Result<Self> {
        let document: CatalogDocument = serde_yaml::from_str(doc).map_err(|e| {
            let message = e.to_string();
            match duplicate_key(&message) {
                Some(key) => Error::catalog(key, "duplicate integration entry"),
                None => Error::InvalidInput(format!("catalog document: {message}")),
            }
        })?;

        let mut entries = BTreeMap::new();
        for (short_name, raw) in document.integrations {
            if entries.contains_key(&short_name) {
                return Err(Error::catalog(short_name, "duplicate integration entry"));
            }
            let strategy = parse_entry(&short_name, raw)?;
            entries.insert(short_name, strategy);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, short_name: &str) -> Result<&AuthStrategy> {
        self.entries.get(short_name).ok_or_else(|| {
            Error::not_found(format!("auth settings for integration '{short_name}'"))
        })
    }

    pub fn contains(&self, short_name: &str) -> bool {
        self.entries.contains_key(short_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AuthStrategy)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_entry(short_name: &str, raw: YamlValue) -> Result<AuthStrategy> {
    let YamlValue::Mapping(mut map) = raw else {
        return Err(Error::catalog(short_name, "entry must be a mapping"));
    };

    let tag = match map.get("auth_type") {
        Some(YamlValue::String(tag)) => tag.clone(),
        Some(_) => return Err(Error::catalog(short_name, "auth_type must be a string")),
        None => return Err(Error::catalog(short_name, "auth_type is missing")),
    };
    let auth_type = AuthType::parse_str(&tag).ok_or_else(|| Error::UnsupportedAuthType {
        integration: short_name.to_string(),
        auth_type: tag.clone(),
    })?;

    if matches!(
        auth_type,
        AuthType::OAuth2 | AuthType::OAuth2WithRefresh | AuthType::OAuth2WithRefreshRotating
    ) {
        map.insert(
            YamlValue::from("integration_short_name"),
            YamlValue::from(short_name),
        );
    }

    serde_yaml::from_value(YamlValue::Mapping(map))
        .map_err(|e| Error::catalog(short_name, e.to_string()))
}

// serde_yaml may reject a repeated key before our visitor sees it.
fn duplicate_key(message: &str) -> Option<String> {
    let rest = message.split("duplicate entry with key").nth(1)?;
    let key = rest.trim().split(['"', '\'']).find(|s| !s.trim().is_empty())?;
    Some(key.trim().to_string())
}

#[derive(Deserialize)]
struct CatalogDocument {
    #[serde(default, deserialize_with = "ordered_entries")]
    integrations: Vec<(String, YamlValue)>,
}

fn ordered_entries<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, YamlValue)>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_map(EntriesVisitor)
}

/// Collects entries without collapsing repeated keys.
struct EntriesVisitor;

impl<'de> Visitor<'de> for EntriesVisitor {
    type Value = Vec<(String, YamlValue)>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping of integration short names to auth settings")
    }

    fn visit_unit<E>(self) -> std::result::Result<Self::Value, E> {
        Ok(Vec::new())
    }

    fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut out = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, YamlValue>()? {
            out.push((key, value));
        }
        Ok(out)
    }
}
