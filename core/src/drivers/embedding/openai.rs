use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use super::EmbeddingModelDriver;
use crate::{
    config::{parse_config, read_api_key},
    drivers::{http::bearer_headers, DriverError},
    tokenizers::{Tokenizer, VendorTokenizer},
};

const DRIVER: &str = "OpenAiEmbeddingModel";
const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";
const URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_key_var: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f64>,
}

#[derive(Debug)]
pub struct OpenAiEmbeddingModel {
    api_url: String,
    headers: HeaderMap,
    model: String,
    tokenizer: VendorTokenizer,
}

impl OpenAiEmbeddingModel {
    pub fn new(
        api_key: &str,
        api_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, DriverError> {
        let model = model.into();
        Ok(Self {
            api_url: api_url.into(),
            headers: bearer_headers(DRIVER, api_key)?,
            tokenizer: VendorTokenizer::openai(model.clone()),
            model,
        })
    }

    #[instrument]
    pub fn from_config(json_config: Option<&str>) -> Result<Self, DriverError> {
        let config: ModelConfig = parse_config(DRIVER, json_config)?;
        let api_key = read_api_key(
            DRIVER,
            config.api_key_var.as_deref().unwrap_or(API_KEY_ENV_VAR),
        )?;
        Self::new(
            &api_key,
            config.api_url.unwrap_or_else(|| URL.to_string()),
            config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        )
    }
}

impl EmbeddingModelDriver for OpenAiEmbeddingModel {
    fn name(&self) -> &'static str {
        DRIVER
    }

    fn api_url(&self) -> &str {
        &self.api_url
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn tokenizer(&self) -> &dyn Tokenizer {
        &self.tokenizer
    }

    fn chunk_to_model_params(&self, chunk: &str) -> Value {
        json!({
            "input": chunk,
            "model": self.model,
        })
    }

    fn process_output(&self, output: Value) -> Result<Vec<f64>, DriverError> {
        let response: OpenAiEmbeddingResponse = serde_json::from_value(output)
            .map_err(|e| DriverError::protocol(DRIVER, "embed_string", e))?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| DriverError::protocol(DRIVER, "embed_string", "Response holds no embedding"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::embedding::{EmbeddingDriver, HttpEmbeddingDriver};
    use crate::retry::RetryPolicy;

    #[test]
    fn test_process_output() {
        let model = OpenAiEmbeddingModel::new("k", URL, DEFAULT_MODEL).unwrap();
        let output = json!({"data": [{"embedding": [0.1, 0.2], "index": 0}]});
        assert_eq!(model.process_output(output).unwrap(), vec![0.1, 0.2]);
        assert!(matches!(
            model.process_output(json!({"data": []})),
            Err(DriverError::Protocol { .. })
        ));
    }

    #[test]
    fn test_from_config_rejects_unknown_fields() {
        let err = OpenAiEmbeddingModel::from_config(Some(r#"{"dimensions": 3}"#)).unwrap_err();
        assert!(matches!(err, DriverError::Config { driver: DRIVER, .. }));
    }

    #[tokio::test]
    async fn test_embed_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::Json(
                json!({"input": "test", "model": "text-embedding-3-small"}),
            ))
            .with_body(json!({"data": [{"embedding": [1.0, 0.0, 0.0]}]}).to_string())
            .create_async()
            .await;

        let model = OpenAiEmbeddingModel::new(
            "test-key",
            format!("{}/v1/embeddings", server.url()),
            DEFAULT_MODEL,
        )
        .unwrap();
        let driver = HttpEmbeddingDriver::new(model).with_retry_policy(RetryPolicy::no_retry());
        let embedding = driver.embed_string("test").await.unwrap();

        mock.assert_async().await;
        assert_eq!(embedding, vec![1.0, 0.0, 0.0]);
    }
}
