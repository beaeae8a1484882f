//! Credential resolution: stored (possibly stale) credential in, ready-to-use
//! credential out.
//!
//! | strategy | action |
//! |---|---|
//! | `none`, `native_functionality` | nothing to resolve |
//! | `api_key`, `config_class`, `sigv4`, `trello_auth` | decrypt, validate against the schema |
//! | `oauth2` | decrypt, return the stored access token |
//! | `oauth2_with_refresh` | exchange the stored refresh token, store nothing |
//! | `oauth2_with_refresh_rotating` | exchange and persist the newly issued refresh token |

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{Instrument, instrument};
use uuid::Uuid;

use crate::auth::{AuthStrategy, AuthenticatedCredential, CredentialFields, OAuth2Settings};
use crate::credentials::traits::{CredentialCipher, CredentialSchema, TokenRefresher};
use crate::models::{Actor, Connection};
use crate::store::SyncStore;
use crate::{Error, Result};

#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn SyncStore>,
    cipher: Arc<dyn CredentialCipher>,
    refresher: Arc<dyn TokenRefresher>,
    rotation_locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CredentialResolver {
    pub fn new(
        store: Arc<dyn SyncStore>,
        cipher: Arc<dyn CredentialCipher>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            store,
            cipher,
            refresher,
            rotation_locks: Arc::new(DashMap::new()),
        }
    }

    #[instrument(
        level = "info",
        skip_all,
        fields(
            integration = %connection.short_name,
            connection_id = %connection.id,
            auth_type = %strategy.auth_type()
        )
    )]
    pub async fn resolve(
        &self,
        strategy: &AuthStrategy,
        connection: &Connection,
        actor: &Actor,
        schema: Option<&dyn CredentialSchema>,
    ) -> Result<AuthenticatedCredential> {
        match strategy {
            AuthStrategy::None | AuthStrategy::NativeFunctionality => {
                Ok(AuthenticatedCredential::None)
            }
            AuthStrategy::ApiKey
            | AuthStrategy::ConfigClass
            | AuthStrategy::SigV4(_)
            | AuthStrategy::TrelloAuth(_) => {
                let fields = self.load_fields(connection, actor).await?;
                let schema = schema.ok_or_else(|| {
                    Error::resolution(format!(
                        "auth config class required for auth type {} ({})",
                        strategy.auth_type(),
                        connection.short_name
                    ))
                })?;
                let fields = schema.validate(fields)?;
                Ok(AuthenticatedCredential::Structured {
                    schema: schema.name().to_string(),
                    fields,
                })
            }
            AuthStrategy::OAuth2(_) => {
                let fields = self.load_fields(connection, actor).await?;
                let token = required_str(&fields, "access_token")?;
                Ok(AuthenticatedCredential::AccessToken(token))
            }
            AuthStrategy::OAuth2WithRefresh(settings) => {
                let fields = self.load_fields(connection, actor).await?;
                let refresh_token = required_str(&fields, "refresh_token")?;
                let response = self
                    .refresher
                    .refresh(settings, &refresh_token)
                    .await
                    .map_err(|e| as_refresh_error(&connection.short_name, e))?;
                tracing::info!("access token refreshed");
                Ok(AuthenticatedCredential::AccessToken(response.access_token))
            }
            AuthStrategy::OAuth2WithRefreshRotating(settings) => {
                let token = self.rotate(settings, connection, actor).await?;
                Ok(AuthenticatedCredential::AccessToken(token))
            }
        }
    }

    fn credential_id(connection: &Connection) -> Result<Uuid> {
        connection.integration_credential_id.ok_or_else(|| {
            Error::not_found(format!(
                "credential for connection '{}'",
                connection.id
            ))
        })
    }

    async fn load_fields(&self, connection: &Connection, actor: &Actor) -> Result<CredentialFields> {
        let credential_id = Self::credential_id(connection)?;
        load_and_decrypt(self.store.as_ref(), self.cipher.as_ref(), credential_id, actor).await
    }

    /// Refresh and persist a single-use refresh token.
    ///
    /// The exchange runs on its own task, so dropping the caller cannot stop it
    /// between the provider rotating the token and the new token being saved.
    /// Resolutions of the same credential are serialized so a refresh token is
    /// never sent twice.
    async fn rotate(
        &self,
        settings: &OAuth2Settings,
        connection: &Connection,
        actor: &Actor,
    ) -> Result<String> {
        let credential_id = Self::credential_id(connection)?;
        let lock = self
            .rotation_locks
            .entry(credential_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let store = self.store.clone();
        let cipher = self.cipher.clone();
        let refresher = self.refresher.clone();
        let settings = settings.clone();
        let actor = actor.clone();
        let integration = connection.short_name.clone();

        let locks = self.rotation_locks.clone();
        let span = tracing::Span::current();
        let task = tokio::spawn(
            async move {
                let result = async {
                    let _guard = lock.clone().lock_owned().await;

                    let mut fields =
                        load_and_decrypt(store.as_ref(), cipher.as_ref(), credential_id, &actor)
                            .await?;
                    let refresh_token = required_str(&fields, "refresh_token")?;

                    let response = refresher
                        .refresh(&settings, &refresh_token)
                        .await
                        .map_err(|e| as_refresh_error(&integration, e))?;
                    let rotated = response
                        .refresh_token
                        .clone()
                        .filter(|t| !t.trim().is_empty())
                        .ok_or_else(|| {
                            Error::refresh(
                                &integration,
                                "provider did not return a new refresh token",
                            )
                        })?;

                    fields.insert("refresh_token".into(), Value::String(rotated));
                    fields.insert(
                        "access_token".into(),
                        Value::String(response.access_token.clone()),
                    );
                    let persist = async {
                        let payload = cipher.encrypt(&fields).await?;
                        store.update_credential(credential_id, &actor, payload).await
                    };
                    persist.await.map_err(|e| {
                        tracing::error!(error = %e, "rotated refresh token could not be persisted");
                        Error::refresh(&integration, format!("persist rotated refresh token: {e}"))
                    })?;

                    tracing::info!(%credential_id, "refresh token rotated");
                    Ok::<_, Error>(response.access_token)
                }
                .await;

                // Entries live only while a rotation holds or waits on them.
                drop(lock);
                locks.remove_if(&credential_id, |_, l| Arc::strong_count(l) == 1);
                result
            }
            .instrument(span),
        );

        task.await.map_err(|e| {
            Error::refresh(&connection.short_name, format!("rotation task failed: {e}"))
        })?
    }
}

async fn load_and_decrypt(
    store: &dyn SyncStore,
    cipher: &dyn CredentialCipher,
    credential_id: Uuid,
    actor: &Actor,
) -> Result<CredentialFields> {
    let credential = store
        .get_credential(credential_id, actor)
        .await?
        .ok_or_else(|| Error::not_found(format!("integration credential '{credential_id}'")))?;
    cipher.decrypt(&credential.encrypted_credentials).await
}

fn required_str(fields: &CredentialFields, field: &str) -> Result<String> {
    match fields.get(field).and_then(Value::as_str) {
        Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
        _ => Err(Error::validation(field, "missing from stored credential")),
    }
}

fn as_refresh_error(integration: &str, err: Error) -> Error {
    match err {
        e @ Error::CredentialRefresh { .. } => e,
        other => Error::refresh(integration, other.to_string()),
    }
}
