use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{message_role, Prompt, PromptDriver, PromptParams};
use crate::{
    artifacts::TextArtifact,
    config::{parse_config, read_api_key},
    drivers::{
        http::{bearer_headers, post_json},
        DriverEnvelope, DriverError,
    },
    observability::Instrumentation,
    retry::RetryPolicy,
    tokenizers::{Tokenizer, VendorTokenizer},
};

const DRIVER: &str = "OpenAiChatPromptDriver";
const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";
const URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_key_var: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
}

/// Prompt driver for the OpenAI chat completions API.
pub struct OpenAiChatPromptDriver {
    api_url: String,
    headers: HeaderMap,
    client: reqwest::Client,
    model: String,
    tokenizer: Box<dyn Tokenizer>,
    envelope: DriverEnvelope,
}

impl OpenAiChatPromptDriver {
    pub fn new(
        api_key: &str,
        api_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, DriverError> {
        let model = model.into();
        Ok(Self {
            api_url: api_url.into(),
            headers: bearer_headers(DRIVER, api_key)?,
            client: reqwest::Client::new(),
            tokenizer: Box::new(VendorTokenizer::openai(model.clone())),
            model,
            envelope: DriverEnvelope::default(),
        })
    }

    /// Builds the driver from an optional JSON config with the optional
    /// fields `api_key_var`, `api_url` and `model`.
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

    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.envelope.retry_policy = retry_policy;
        self
    }

    #[must_use]
    pub fn with_instrumentation(mut self, instrumentation: Arc<dyn Instrumentation>) -> Self {
        self.envelope.instrumentation = instrumentation;
        self
    }

    #[must_use]
    pub fn with_tokenizer(mut self, tokenizer: impl Tokenizer + 'static) -> Self {
        self.tokenizer = Box::new(tokenizer);
        self
    }

    fn request_body(&self, prompt: &Prompt, params: &PromptParams) -> Value {
        let messages: Vec<Value> = prompt
            .messages()
            .into_iter()
            .map(|m| json!({"role": message_role(m), "content": m.value}))
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": params.temperature,
            "max_tokens": self.max_tokens(params),
        });
        if !params.stop.is_empty() {
            body["stop"] = json!(params.stop);
        }
        body
    }
}

#[async_trait]
impl PromptDriver for OpenAiChatPromptDriver {
    fn name(&self) -> &'static str {
        DRIVER
    }

    fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    fn envelope(&self) -> &DriverEnvelope {
        &self.envelope
    }

    #[instrument(skip(self, prompt, params), fields(model = %self.model))]
    async fn try_complete(
        &self,
        prompt: &Prompt,
        params: &PromptParams,
    ) -> Result<TextArtifact, DriverError> {
        let body = self.request_body(prompt, params);
        let response = post_json(
            &self.client,
            DRIVER,
            "complete",
            &self.api_url,
            &self.headers,
            &body,
        )
        .await?;

        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| DriverError::protocol(DRIVER, "complete", "Invalid response body"))?;

        let mut output = TextArtifact::new(content);
        if let Some(usage) = response.get("usage").filter(|u| !u.is_null()) {
            info!(total_tokens = ?usage["total_tokens"].as_u64(), "Prompt completed");
            output = output.annotated("usage", usage.clone());
        }
        Ok(output.annotated("model", json!(self.model)))
    }
}
