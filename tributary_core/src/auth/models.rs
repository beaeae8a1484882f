use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::{Error, Result};

/// Wire tag of an authentication strategy, as written in catalog files and
/// integration descriptors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuthType {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "api_key")]
    ApiKey,
    #[serde(rename = "oauth2")]
    OAuth2,
    #[serde(rename = "oauth2_with_refresh")]
    OAuth2WithRefresh,
    #[serde(rename = "oauth2_with_refresh_rotating")]
    OAuth2WithRefreshRotating,
    #[serde(rename = "config_class")]
    ConfigClass,
    #[serde(rename = "native_functionality")]
    NativeFunctionality,
    #[serde(rename = "sigv4")]
    SigV4,
    #[serde(rename = "trello_auth")]
    TrelloAuth,
}

impl AuthType {
    pub const ALL: [AuthType; 9] = [
        AuthType::None,
        AuthType::ApiKey,
        AuthType::OAuth2,
        AuthType::OAuth2WithRefresh,
        AuthType::OAuth2WithRefreshRotating,
        AuthType::ConfigClass,
        AuthType::NativeFunctionality,
        AuthType::SigV4,
        AuthType::TrelloAuth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::None => "none",
            AuthType::ApiKey => "api_key",
            AuthType::OAuth2 => "oauth2",
            AuthType::OAuth2WithRefresh => "oauth2_with_refresh",
            AuthType::OAuth2WithRefreshRotating => "oauth2_with_refresh_rotating",
            AuthType::ConfigClass => "config_class",
            AuthType::NativeFunctionality => "native_functionality",
            AuthType::SigV4 => "sigv4",
            AuthType::TrelloAuth => "trello_auth",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Strategies whose credentials are validated against a schema.
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            AuthType::ApiKey | AuthType::ConfigClass | AuthType::SigV4 | AuthType::TrelloAuth
        )
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientCredentialLocation {
    /// HTTP Basic authorization header.
    Header,
    /// Form or JSON body fields.
    Body,
}

/// Settings shared by the three OAuth2 strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Settings {
    pub integration_short_name: String,
    /// Provider authorize URL used by the frontend.
    pub url: String,
    /// Token endpoint.
    pub backend_url: String,
    pub grant_type: String,
    pub client_id: String,
    #[serde(default, skip_serializing)]
    pub client_secret: Option<String>,
    pub content_type: String,
    pub client_credential_location: ClientCredentialLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_frontend_params: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl OAuth2Settings {
    pub fn uses_json_body(&self) -> bool {
        self.content_type.contains("json")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SigV4Settings {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing)]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing)]
    pub secret_access_key: Option<String>,
    #[serde(default, skip_serializing)]
    pub session_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrelloAuthSettings {
    pub key: String,
    pub url: String,
    pub scope: String,
    pub callback_method: String,
    pub expiration: String,
    pub name: String,
}

/// How an integration authenticates, with the settings that strategy needs.
///
/// Catalog entries deserialize straight into this type; the `auth_type` key
/// selects the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "auth_type")]
pub enum AuthStrategy {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "api_key")]
    ApiKey,
    #[serde(rename = "oauth2")]
    OAuth2(OAuth2Settings),
    #[serde(rename = "oauth2_with_refresh")]
    OAuth2WithRefresh(OAuth2Settings),
    #[serde(rename = "oauth2_with_refresh_rotating")]
    OAuth2WithRefreshRotating(OAuth2Settings),
    #[serde(rename = "config_class")]
    ConfigClass,
    #[serde(rename = "native_functionality")]
    NativeFunctionality,
    #[serde(rename = "sigv4")]
    SigV4(SigV4Settings),
    #[serde(rename = "trello_auth")]
    TrelloAuth(TrelloAuthSettings),
}

impl AuthStrategy {
    pub fn auth_type(&self) -> AuthType {
        match self {
            AuthStrategy::None => AuthType::None,
            AuthStrategy::ApiKey => AuthType::ApiKey,
            AuthStrategy::OAuth2(_) => AuthType::OAuth2,
            AuthStrategy::OAuth2WithRefresh(_) => AuthType::OAuth2WithRefresh,
            AuthStrategy::OAuth2WithRefreshRotating(_) => AuthType::OAuth2WithRefreshRotating,
            AuthStrategy::ConfigClass => AuthType::ConfigClass,
            AuthStrategy::NativeFunctionality => AuthType::NativeFunctionality,
            AuthStrategy::SigV4(_) => AuthType::SigV4,
            AuthStrategy::TrelloAuth(_) => AuthType::TrelloAuth,
        }
    }

    pub fn oauth_settings(&self) -> Option<&OAuth2Settings> {
        match self {
            AuthStrategy::OAuth2(s)
            | AuthStrategy::OAuth2WithRefresh(s)
            | AuthStrategy::OAuth2WithRefreshRotating(s) => Some(s),
            _ => None,
        }
    }
}

/// Credential fields after decryption, keyed by field name.
pub type CredentialFields = Map<String, Value>;

/// Credential ready to hand to a connector.
#[derive(Clone, PartialEq)]
pub enum AuthenticatedCredential {
    /// The integration needs no credential.
    None,
    AccessToken(String),
    /// Fields validated against the named credential schema.
    Structured {
        schema: String,
        fields: CredentialFields,
    },
}

impl AuthenticatedCredential {
    pub fn is_none(&self) -> bool {
        matches!(self, AuthenticatedCredential::None)
    }

    pub fn access_token(&self) -> Option<&str> {
        match self {
            AuthenticatedCredential::AccessToken(token) => Some(token),
            _ => None,
        }
    }

    pub fn fields(&self) -> Option<&CredentialFields> {
        match self {
            AuthenticatedCredential::Structured { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Deserialize structured fields into a connector's typed config.
    pub fn structured_as<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            AuthenticatedCredential::Structured { schema, fields } => {
                serde_json::from_value(Value::Object(fields.clone()))
                    .map_err(|e| Error::validation(schema.clone(), e.to_string()))
            }
            AuthenticatedCredential::None => Err(Error::InvalidInput(
                "expected structured credential, got none".to_string(),
            )),
            AuthenticatedCredential::AccessToken(_) => Err(Error::InvalidInput(
                "expected structured credential, got access token".to_string(),
            )),
        }
    }
}

// Secrets stay out of logs and panic messages.
impl fmt::Debug for AuthenticatedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthenticatedCredential::None => f.write_str("None"),
            AuthenticatedCredential::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            AuthenticatedCredential::Structured { schema, fields } => f
                .debug_struct("Structured")
                .field("schema", schema)
                .field("fields", &fields.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_type_tags_round_trip_through_parse() {
        for t in AuthType::ALL {
            assert_eq!(AuthType::parse_str(t.as_str()), Some(t));
            let json = serde_json::to_value(t).unwrap();
            assert_eq!(json, Value::String(t.as_str().to_string()));
        }
        assert_eq!(AuthType::parse_str("url_and_api_key"), None);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let token = AuthenticatedCredential::AccessToken("sekrit".into());
        assert!(!format!("{token:?}").contains("sekrit"));

        let mut fields = CredentialFields::new();
        fields.insert("api_key".into(), Value::String("sekrit".into()));
        let structured = AuthenticatedCredential::Structured {
            schema: "LinearAuthConfig".into(),
            fields,
        };
        let rendered = format!("{structured:?}");
        assert!(rendered.contains("api_key"));
        assert!(!rendered.contains("sekrit"));
    }

    #[test]
    fn structured_as_reports_schema_on_mismatch() {
        #[derive(Deserialize)]
        #[allow(dead_code)]
        struct NeedsKey {
            api_key: String,
        }
        let cred = AuthenticatedCredential::Structured {
            schema: "LinearAuthConfig".into(),
            fields: CredentialFields::new(),
        };
        let err = cred.structured_as::<NeedsKey>().err().unwrap();
        assert!(matches!(err, Error::Validation { field, .. } if field == "LinearAuthConfig"));
    }
}
