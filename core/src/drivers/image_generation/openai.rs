use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{instrument, warn};

use super::{decode_image, TextToImageGenerationDriver};
use crate::{
    artifacts::ImageArtifact,
    config::{parse_config, read_api_key},
    drivers::{
        http::{bearer_headers, post_json},
        DriverEnvelope, DriverError,
    },
    observability::Instrumentation,
    retry::RetryPolicy,
};

const DRIVER: &str = "OpenAiImageGenerationDriver";
const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";
const URL: &str = "https://api.openai.com/v1/images/generations";
const DEFAULT_MODEL: &str = "dall-e-3";
const DEFAULT_SIZE: (u32, u32) = (1024, 1024);

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_key_var: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Text-to-image through the OpenAI images API.
pub struct OpenAiImageGenerationDriver {
    api_url: String,
    headers: HeaderMap,
    client: reqwest::Client,
    model: String,
    size: (u32, u32),
    envelope: DriverEnvelope,
}

impl OpenAiImageGenerationDriver {
    pub fn new(
        api_key: &str,
        api_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, DriverError> {
        Ok(Self {
            api_url: api_url.into(),
            headers: bearer_headers(DRIVER, api_key)?,
            client: reqwest::Client::new(),
            model: model.into(),
            size: DEFAULT_SIZE,
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
        Ok(Self::new(
            &api_key,
            config.api_url.unwrap_or_else(|| URL.to_string()),
            config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        )?
        .with_size(
            config.width.unwrap_or(DEFAULT_SIZE.0),
            config.height.unwrap_or(DEFAULT_SIZE.1),
        ))
    }

    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
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
}

#[async_trait]
impl TextToImageGenerationDriver for OpenAiImageGenerationDriver {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate_image(
        &self,
        prompts: &[String],
        negative_prompts: Option<&[String]>,
    ) -> Result<ImageArtifact, DriverError> {
        if negative_prompts.is_some_and(|n| !n.is_empty()) {
            warn!(driver = DRIVER, "Negative prompts are not supported, ignoring them");
        }
        let prompt = prompts.join(", ");
        let (width, height) = self.size;
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "size": format!("{width}x{height}"),
            "response_format": "b64_json",
            "n": 1,
        });

        let bytes = self
            .envelope
            .call(DRIVER, "generate_image", |_| async {
                let output = post_json(
                    &self.client,
                    DRIVER,
                    "generate_image",
                    &self.api_url,
                    &self.headers,
                    &body,
                )
                .await?;
                decode_image(DRIVER, "generate_image", output["data"][0]["b64_json"].as_str())
            })
            .await?;

        Ok(ImageArtifact::new(bytes, "png", width, height)
            .annotated("prompt", json!(prompt))
            .annotated("model", json!(self.model)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_image() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/images/generations")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "dall-e-3",
                "prompt": "a fox, in snow",
                "size": "256x256"
            })))
            .with_body(json!({"data": [{"b64_json": "cG5n"}]}).to_string())
            .create_async()
            .await;

        let driver = OpenAiImageGenerationDriver::new(
            "k",
            format!("{}/v1/images/generations", server.url()),
            DEFAULT_MODEL,
        )
        .unwrap()
        .with_size(256, 256);
        let prompts = vec!["a fox".to_string(), "in snow".to_string()];
        let image = driver.generate_image(&prompts, None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(image.value, b"png");
        assert_eq!(image.meta.get("prompt").unwrap(), "a fox, in snow");
    }

    #[tokio::test]
    async fn test_missing_image_is_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_body(json!({"data": []}).to_string())
            .create_async()
            .await;

        let driver = OpenAiImageGenerationDriver::new("k", server.url(), DEFAULT_MODEL)
            .unwrap()
            .with_retry_policy(RetryPolicy::no_retry());
        let err = driver
            .generate_image(&["x".to_string()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::Protocol { driver: DRIVER, .. }));
    }
}
