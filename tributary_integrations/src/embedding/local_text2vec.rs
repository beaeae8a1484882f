//! Embedding model backed by a local text2vec HTTP service.
//!
//! `POST {url}/vectors` with `{"text": ...}` answers `{"vector": [...]}`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tributary_core::connectors::{EmbeddingModel, EmbeddingModelFactory};
use tributary_core::{Error, Result};

use crate::connectors::{check_status, http_client};

pub const SHORT_NAME: &str = "local_text2vec";
pub const IMPLEMENTATION: &str = "LocalText2Vec";

#[derive(Serialize)]
struct VectorRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct VectorResponse {
    vector: Vec<f32>,
}

pub struct LocalText2Vec {
    client: Client,
    url: String,
    dimensions: usize,
}

impl LocalText2Vec {
    pub fn new(url: impl Into<String>, dimensions: usize) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            url: url.into().trim_end_matches('/').to_string(),
            dimensions,
        })
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let resp = self
            .client
            .post(format!("{}/vectors", self.url))
            .json(&VectorRequest { text })
            .send()
            .await
            .map_err(Error::backend_reqwest)?;
        let body: VectorResponse = check_status(SHORT_NAME, resp)
            .await?
            .json()
            .await
            .map_err(Error::backend_reqwest)?;
        if body.vector.len() != self.dimensions {
            return Err(Error::BackendMessage(format!(
                "text2vec returned {} dimensions, expected {}",
                body.vector.len(),
                self.dimensions
            )));
        }
        Ok(body.vector)
    }
}

#[async_trait]
impl EmbeddingModel for LocalText2Vec {
    fn model_name(&self) -> &str {
        SHORT_NAME
    }

    fn vector_dimensions(&self) -> usize {
        self.dimensions
    }

    #[tracing::instrument(level = "debug", skip_all, fields(count = texts.len()))]
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_one(text).await?);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub struct LocalText2VecFactory {
    url: String,
    dimensions: usize,
}

impl LocalText2VecFactory {
    pub fn new(url: impl Into<String>, dimensions: usize) -> Self {
        Self {
            url: url.into(),
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingModelFactory for LocalText2VecFactory {
    async fn create(&self) -> Result<Arc<dyn EmbeddingModel>> {
        if self.dimensions == 0 {
            return Err(Error::InvalidInput(
                "text2vec dimensions must be > 0".to_string(),
            ));
        }
        Ok(Arc::new(LocalText2Vec::new(self.url.clone(), self.dimensions)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn embeds_each_text_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors"))
            .and(body_json(json!({"text": "alpha"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"vector": [1.0, 0.0]})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vectors"))
            .and(body_json(json!({"text": "beta"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"vector": [0.0, 1.0]})))
            .mount(&server)
            .await;

        let model = LocalText2VecFactory::new(server.uri(), 2).create().await.unwrap();
        let vectors = model
            .embed_many(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn wrong_dimension_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"vector": [1.0]})))
            .mount(&server)
            .await;

        let model = LocalText2VecFactory::new(server.uri(), 3).create().await.unwrap();
        let err = model.embed_many(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::BackendMessage(msg) if msg.contains("expected 3")));
    }

    #[tokio::test]
    async fn zero_dimensions_are_rejected() {
        assert!(LocalText2VecFactory::new("http://localhost:9878", 0).create().await.is_err());
    }
}
