use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::Result;
use crate::auth::{CredentialFields, OAuth2Settings};

/// Encryption-at-rest boundary for stored credentials.
#[async_trait]
pub trait CredentialCipher: Send + Sync {
    async fn encrypt(&self, fields: &CredentialFields) -> Result<Vec<u8>>;

    async fn decrypt(&self, payload: &[u8]) -> Result<CredentialFields>;
}

/// OAuth2 token endpoint boundary.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange `refresh_token` for a new access token. Every failure
    /// (transport, timeout, non-2xx, malformed body) is reported as
    /// `Error::CredentialRefresh`.
    async fn refresh(&self, settings: &OAuth2Settings, refresh_token: &str)
    -> Result<TokenResponse>;
}

/// Validates decrypted credential fields for one integration.
pub trait CredentialSchema: Send + Sync {
    fn name(&self) -> &str;

    /// Return the normalized fields, or `Error::Validation` naming the first
    /// offending field.
    fn validate(&self, fields: CredentialFields) -> Result<CredentialFields>;
}

#[derive(Clone, PartialEq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra_fields: Map<String, Value>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
