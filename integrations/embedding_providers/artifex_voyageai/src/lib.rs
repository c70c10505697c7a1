//! [Voyage AI](https://voyageai.com) embeddings for Artifex.
//!
//! [`VoyageAiEmbeddingModel`] is the vendor half of an
//! [`HttpEmbeddingDriver`](artifex::drivers::embedding::HttpEmbeddingDriver):
//!
//! ```rust,no_run
//! use artifex::drivers::embedding::{EmbeddingDriver, HttpEmbeddingDriver};
//! use artifex_voyageai::VoyageAiEmbeddingModel;
//!
//! # async fn run() -> Result<(), artifex::drivers::DriverError> {
//! let model = VoyageAiEmbeddingModel::from_config(Some(r#"{"model": "voyage-3-lite"}"#))?;
//! let vector = HttpEmbeddingDriver::new(model).embed_string("hello").await?;
//! # Ok(())
//! # }
//! ```

use artifex::{
    config::{parse_config, read_api_key},
    drivers::{embedding::EmbeddingModelDriver, http::bearer_headers, DriverError},
    tokenizers::{Tokenizer, VendorTokenizer},
};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

const DRIVER: &str = "VoyageAiEmbeddingModel";
const API_KEY_ENV_VAR: &str = "VOYAGEAI_API_KEY";
const URL: &str = "https://api.voyageai.com/v1/embeddings";

/// Hint telling Voyage whether the text is stored or searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Query,
    Document,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_key_var: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
    input_type: Option<InputType>,
}

#[derive(Deserialize)]
struct VoyageAiEmbeddingResponse {
    data: Vec<VoyageAiEmbeddingData>,
}

#[derive(Deserialize)]
struct VoyageAiEmbeddingData {
    embedding: Vec<f64>,
}

/// # Supported Configuration
///
/// - `model` (required): e.g. `voyage-3-lite`
/// - `api_key_var`: environment variable holding the API key, defaults to
///   `VOYAGEAI_API_KEY`
/// - `api_url`: custom endpoint URL
/// - `input_type`: `query` or `document`
pub struct VoyageAiEmbeddingModel {
    api_url: String,
    headers: HeaderMap,
    model: String,
    input_type: Option<InputType>,
    tokenizer: VendorTokenizer,
}

impl VoyageAiEmbeddingModel {
    pub fn new(
        api_key: &str,
        api_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, DriverError> {
        let model = model.into();
        Ok(Self {
            api_url: api_url.into(),
            headers: bearer_headers(DRIVER, api_key)?,
            input_type: None,
            tokenizer: VendorTokenizer::voyage(model.clone()),
            model,
        })
    }

    #[instrument]
    pub fn from_config(json_config: Option<&str>) -> Result<Self, DriverError> {
        let config: ModelConfig = parse_config(DRIVER, json_config)?;
        let model = config.model.ok_or_else(|| DriverError::Config {
            driver: DRIVER,
            message: "the `model` field is required".to_string(),
        })?;
        let api_key = read_api_key(
            DRIVER,
            config.api_key_var.as_deref().unwrap_or(API_KEY_ENV_VAR),
        )?;
        let mut this = Self::new(
            &api_key,
            config.api_url.unwrap_or_else(|| URL.to_string()),
            model,
        )?;
        this.input_type = config.input_type;
        Ok(this)
    }

    #[must_use]
    pub fn with_input_type(mut self, input_type: InputType) -> Self {
        self.input_type = Some(input_type);
        self
    }
}

impl EmbeddingModelDriver for VoyageAiEmbeddingModel {
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
        let mut params = json!({
            "input": [chunk],
            "model": self.model,
        });
        if let Some(input_type) = self.input_type {
            params["input_type"] = json!(input_type);
        }
        params
    }

    fn process_output(&self, output: Value) -> Result<Vec<f64>, DriverError> {
        let response: VoyageAiEmbeddingResponse = serde_json::from_value(output)
            .map_err(|e| DriverError::protocol(DRIVER, "embed_string", e))?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| DriverError::protocol(DRIVER, "embed_string", "No embedding returned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artifex::{
        drivers::embedding::{EmbeddingDriver, HttpEmbeddingDriver},
        retry::RetryPolicy,
    };

    #[test]
    fn test_params_carry_input_type() {
        let model = VoyageAiEmbeddingModel::new("k", URL, "voyage-3-lite")
            .unwrap()
            .with_input_type(InputType::Query);
        assert_eq!(
            model.chunk_to_model_params("q"),
            json!({"input": ["q"], "model": "voyage-3-lite", "input_type": "query"})
        );
        assert_eq!(model.tokenizer().max_input_tokens(), 32_000);
    }

    #[test]
    fn test_missing_model_is_config_error() {
        let err = VoyageAiEmbeddingModel::from_config(Some("{}")).err().unwrap();
        assert!(matches!(err, DriverError::Config { driver: DRIVER, .. }));
    }

    #[test]
    fn test_empty_data_is_protocol_error() {
        let model = VoyageAiEmbeddingModel::new("k", URL, "voyage-3").unwrap();
        let err = model.process_output(json!({"data": []})).unwrap_err();
        assert!(matches!(err, DriverError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_embed_through_http_driver() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::Json(
                json!({"input": ["hello"], "model": "voyage-3"}),
            ))
            .with_body(json!({"data": [{"embedding": [0.1, 0.2, 0.3]}]}).to_string())
            .create_async()
            .await;

        let model = VoyageAiEmbeddingModel::new(
            "test-key",
            format!("{}/v1/embeddings", server.url()),
            "voyage-3",
        )
        .unwrap();
        let embedding = HttpEmbeddingDriver::new(model)
            .with_retry_policy(RetryPolicy::no_retry())
            .embed_string("hello")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
    }
}
