//! [Anthropic](https://anthropic.com) messages API behind Artifex's
//! [`PromptDriver`] trait.

use artifex::{
    artifacts::TextArtifact,
    config::{parse_config, read_api_key},
    drivers::{
        http::{header_map, post_json},
        prompt::{message_role, Prompt, PromptDriver, PromptParams},
        DriverEnvelope, DriverError,
    },
    observability::Instrumentation,
    retry::RetryPolicy,
    tokenizers::{Tokenizer, VendorTokenizer},
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};

const DRIVER: &str = "AnthropicPromptDriver";
const API_KEY_ENV_VAR: &str = "ANTHROPIC_API_KEY";
const URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_key_var: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
}

/// Prompt driver for Anthropic's `/v1/messages` endpoint.
///
/// # Supported Configuration
///
/// [`AnthropicPromptDriver::from_config`] accepts the optional fields:
///
/// - `model`: model identifier, defaults to `claude-3-7-sonnet-20250219`
/// - `api_key_var`: environment variable holding the API key, defaults to
///   `ANTHROPIC_API_KEY`
/// - `api_url`: custom endpoint URL
///
/// # Examples
///
/// ```rust,no_run
/// use artifex::drivers::prompt::{PromptDriver, PromptParams};
/// use artifex_anthropic::AnthropicPromptDriver;
///
/// # async fn run() -> Result<(), artifex::drivers::DriverError> {
/// let driver = AnthropicPromptDriver::from_config(Some(r#"{"model": "claude-3-5-haiku-latest"}"#))?;
/// let answer = driver.complete(&"hi".into(), &PromptParams::default()).await?;
/// # Ok(())
/// # }
/// ```
///
/// Conversation entries annotated with role `system` are sent through the
/// top level `system` field, everything else as `user` or `assistant`
/// messages.
pub struct AnthropicPromptDriver {
    api_url: String,
    headers: HeaderMap,
    client: reqwest::Client,
    model: String,
    tokenizer: Box<dyn Tokenizer>,
    envelope: DriverEnvelope,
}

impl AnthropicPromptDriver {
    pub fn new(
        api_key: &str,
        api_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, DriverError> {
        let model = model.into();
        let headers = header_map(
            DRIVER,
            &[
                ("x-api-key", api_key),
                ("anthropic-version", API_VERSION),
                ("content-type", "application/json"),
            ],
        )?;
        Ok(Self {
            api_url: api_url.into(),
            headers,
            client: reqwest::Client::new(),
            tokenizer: Box::new(VendorTokenizer::anthropic(model.clone())),
            model,
            envelope: DriverEnvelope::default(),
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
        let mut system = Vec::new();
        let mut messages = Vec::new();
        for message in prompt.messages() {
            match message_role(message) {
                "system" => system.push(message.value.as_str()),
                role => messages.push(AnthropicMessage {
                    role: if role == "assistant" { "assistant" } else { "user" },
                    content: vec![ContentBlock::Text {
                        text: message.value.clone(),
                    }],
                }),
            }
        }

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": params.temperature,
            "max_tokens": self.max_tokens(params),
        });
        if !system.is_empty() {
            body["system"] = json!(system.join("\n\n"));
        }
        if !params.stop.is_empty() {
            body["stop_sequences"] = json!(params.stop);
        }
        body
    }
}

#[derive(Serialize, Debug, PartialEq)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
        signature: String,
    },
    RedactedThinking {
        data: String,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize, Serialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[async_trait]
impl PromptDriver for AnthropicPromptDriver {
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
        let output = post_json(
            &self.client,
            DRIVER,
            "complete",
            &self.api_url,
            &self.headers,
            &body,
        )
        .await?;
        let response: MessagesResponse = serde_json::from_value(output)
            .map_err(|e| DriverError::protocol(DRIVER, "complete", e))?;

        let mut text = String::new();
        for block in response.content {
            match block {
                ContentBlock::Text { text: t } => text.push_str(&t),
                ContentBlock::Thinking { .. } | ContentBlock::RedactedThinking { .. } => {}
                ContentBlock::Unsupported => warn!("Skipping unsupported content block"),
            }
        }

        let mut output = TextArtifact::new(text);
        if let Some(usage) = response.usage {
            info!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Prompt completed"
            );
            output = output.annotated(
                "usage",
                json!({
                    "input_tokens": usage.input_tokens,
                    "output_tokens": usage.output_tokens,
                    "total_tokens": usage.input_tokens + usage.output_tokens,
                }),
            );
        }
        Ok(output.annotated("model", json!(self.model)))
    }
}
