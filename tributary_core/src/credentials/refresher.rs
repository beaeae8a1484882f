use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::instrument;

use crate::auth::{ClientCredentialLocation, OAuth2Settings};
use crate::credentials::traits::{TokenRefresher, TokenResponse};
use crate::{Error, Result};

pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

/// `TokenRefresher` that calls the provider's token endpoint over HTTP.
#[derive(Clone)]
pub struct HttpTokenRefresher {
    client: Client,
}

impl HttpTokenRefresher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::backend_reqwest)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    #[instrument(
        level = "debug",
        skip(self, settings, refresh_token),
        fields(integration = %settings.integration_short_name)
    )]
    async fn refresh(
        &self,
        settings: &OAuth2Settings,
        refresh_token: &str,
    ) -> Result<TokenResponse> {
        let integration = settings.integration_short_name.as_str();

        let mut body: BTreeMap<&str, &str> = BTreeMap::new();
        body.insert("grant_type", "refresh_token");
        body.insert("refresh_token", refresh_token);

        let mut req = self.client.post(&settings.backend_url);
        match settings.client_credential_location {
            ClientCredentialLocation::Header => {
                req = req.basic_auth(&settings.client_id, settings.client_secret.as_deref());
            }
            ClientCredentialLocation::Body => {
                body.insert("client_id", &settings.client_id);
                if let Some(secret) = settings.client_secret.as_deref() {
                    body.insert("client_secret", secret);
                }
            }
        }
        req = if settings.uses_json_body() {
            req.json(&body)
        } else {
            req.form(&body)
        };

        let resp = req.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "token endpoint timed out".to_string()
            } else {
                format!("token endpoint request failed: {e}")
            };
            Error::refresh(integration, message)
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            tracing::warn!(%status, "token refresh rejected");
            return Err(Error::refresh(
                integration,
                format!("token endpoint returned {status}: {snippet}"),
            ));
        }

        resp.json::<TokenResponse>().await.map_err(|e| {
            let message = if e.is_timeout() {
                "token endpoint timed out".to_string()
            } else {
                format!("malformed token response: {e}")
            };
            Error::refresh(integration, message)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer, location: ClientCredentialLocation) -> OAuth2Settings {
        OAuth2Settings {
            integration_short_name: "hubspot".into(),
            url: "https://app.example.com/oauth/authorize".into(),
            backend_url: format!("{}/oauth/token", server.uri()),
            grant_type: "authorization_code".into(),
            client_id: "client-1".into(),
            client_secret: Some("secret-1".into()),
            content_type: "application/x-www-form-urlencoded".into(),
            client_credential_location: location,
            additional_frontend_params: None,
            scope: None,
        }
    }

    #[tokio::test]
    async fn body_credentials_are_form_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt-1"))
            .and(body_string_contains("client_id=client-1"))
            .and(body_string_contains("client_secret=secret-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-2",
                "expires_in": 1800,
                "token_type": "bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let refresher = HttpTokenRefresher::new(DEFAULT_REFRESH_TIMEOUT).unwrap();
        let resp = refresher
            .refresh(&settings(&server, ClientCredentialLocation::Body), "rt-1")
            .await
            .unwrap();
        assert_eq!(resp.access_token, "at-2");
        assert_eq!(resp.expires_in, Some(1800));
        assert!(resp.refresh_token.is_none());
    }

    #[tokio::test]
    async fn header_credentials_use_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-3",
                "refresh_token": "rt-2",
                "instance_url": "https://tenant.example.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut settings = settings(&server, ClientCredentialLocation::Header);
        settings.content_type = "application/json".into();
        let refresher = HttpTokenRefresher::new(DEFAULT_REFRESH_TIMEOUT).unwrap();
        let resp = refresher.refresh(&settings, "rt-1").await.unwrap();
        assert_eq!(resp.refresh_token.as_deref(), Some("rt-2"));
        assert!(resp.extra_fields.contains_key("instance_url"));
    }

    #[tokio::test]
    async fn rejected_refresh_is_a_refresh_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let refresher = HttpTokenRefresher::new(DEFAULT_REFRESH_TIMEOUT).unwrap();
        let err = refresher
            .refresh(&settings(&server, ClientCredentialLocation::Body), "revoked")
            .await
            .unwrap_err();
        match err {
            Error::CredentialRefresh {
                integration,
                message,
            } => {
                assert_eq!(integration, "hubspot");
                assert!(message.contains("invalid_grant"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "late"}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let refresher = HttpTokenRefresher::new(Duration::from_millis(50)).unwrap();
        let err = refresher
            .refresh(&settings(&server, ClientCredentialLocation::Body), "rt-1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CredentialRefresh { .. }));
    }
}
