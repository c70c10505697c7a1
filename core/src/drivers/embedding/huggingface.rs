use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use super::EmbeddingModelDriver;
use crate::{
    config::{parse_config, read_api_key},
    drivers::{http::bearer_headers, DriverError},
    tokenizers::{SimpleTokenizer, Tokenizer, DEFAULT_MAX_INPUT_TOKENS, MAX_BYTES_PER_TOKEN},
};

const DRIVER: &str = "HuggingFaceEmbeddingModel";
const API_KEY_ENV_VAR: &str = "HUGGINGFACE_HUB_ACCESS_TOKEN";
const BASE_URL: &str = "https://api-inference.huggingface.co/pipeline/feature-extraction";
const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_key_var: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_input_tokens: Option<usize>,
}

/// Feature extraction through the Hugging Face inference API.
///
/// Answers are either a flat vector or one vector per token; the latter
/// is mean pooled.
pub struct HuggingFaceEmbeddingModel {
    api_url: String,
    headers: HeaderMap,
    tokenizer: SimpleTokenizer,
}

impl HuggingFaceEmbeddingModel {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        max_input_tokens: usize,
    ) -> Result<Self, DriverError> {
        let tokenizer = SimpleTokenizer::new(model, MAX_BYTES_PER_TOKEN, max_input_tokens, 0)
            .map_err(|e| DriverError::Config {
                driver: DRIVER,
                message: e.to_string(),
            })?;
        Ok(Self {
            api_url: format!("{}/{model}", base_url.trim_end_matches('/')),
            headers: bearer_headers(DRIVER, api_key)?,
            tokenizer,
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
            config.base_url.as_deref().unwrap_or(BASE_URL),
            config.model.as_deref().unwrap_or(DEFAULT_MODEL),
            config.max_input_tokens.unwrap_or(DEFAULT_MAX_INPUT_TOKENS),
        )
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureOutput {
    Pooled(Vec<f64>),
    PerToken(Vec<Vec<f64>>),
}

impl EmbeddingModelDriver for HuggingFaceEmbeddingModel {
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
        json!({ "inputs": chunk })
    }

    fn process_output(&self, output: Value) -> Result<Vec<f64>, DriverError> {
        let output: FeatureOutput = serde_json::from_value(output)
            .map_err(|e| DriverError::protocol(DRIVER, "embed_string", e))?;
        match output {
            FeatureOutput::Pooled(vector) => Ok(vector),
            FeatureOutput::PerToken(rows) if rows.is_empty() => Err(DriverError::protocol(
                DRIVER,
                "embed_string",
                "Response holds no embedding",
            )),
            FeatureOutput::PerToken(rows) => {
                let mut pooled = vec![0.0; rows[0].len()];
                for row in &rows {
                    for (acc, x) in pooled.iter_mut().zip(row) {
                        *acc += x;
                    }
                }
                pooled.iter_mut().for_each(|x| *x /= rows.len() as f64);
                Ok(pooled)
            }
        }
    }
}
