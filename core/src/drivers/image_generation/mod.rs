//! Image generation drivers.
//!
//! Text-to-image and image-to-image are separate capabilities; a driver
//! offering both is an [`ImageGenerationDriver`] through the blanket impl.
//! Every call runs in its own retry envelope.

mod openai;
mod stable_diffusion;

pub use openai::OpenAiImageGenerationDriver;
pub use stable_diffusion::StableDiffusionImageModel;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::HeaderMap;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

use super::{http::post_json, DriverEnvelope, DriverError};
use crate::{artifacts::ImageArtifact, observability::Instrumentation, retry::RetryPolicy};

const DEFAULT_WIDTH: u32 = 512;
const DEFAULT_HEIGHT: u32 = 512;

#[async_trait]
pub trait TextToImageGenerationDriver: Send + Sync {
    async fn generate_image(
        &self,
        prompts: &[String],
        negative_prompts: Option<&[String]>,
    ) -> Result<ImageArtifact, DriverError>;
}

#[async_trait]
pub trait ImageToImageGenerationDriver: Send + Sync {
    async fn image_to_image_generation(
        &self,
        input_image: &ImageArtifact,
        prompts: &[String],
        mask_image: Option<&ImageArtifact>,
        negative_prompts: Option<&[String]>,
    ) -> Result<ImageArtifact, DriverError>;
}

pub trait ImageGenerationDriver: TextToImageGenerationDriver + ImageToImageGenerationDriver {}

impl<T> ImageGenerationDriver for T where T: TextToImageGenerationDriver + ImageToImageGenerationDriver {}

/// Everything a model driver needs to build one request.
#[derive(Debug, Clone, Copy)]
pub struct ImageRequest<'a> {
    pub prompts: &'a [String],
    pub negative_prompts: Option<&'a [String]>,
    pub width: u32,
    pub height: u32,
    pub seed: Option<u64>,
}

/// Vendor specific half of an [`HttpImageGenerationDriver`].
pub trait ImageModelDriver: Send + Sync {
    fn name(&self) -> &'static str;

    fn text_to_image_request_parameters(&self, request: &ImageRequest<'_>) -> Value;

    fn image_to_image_request_parameters(
        &self,
        request: &ImageRequest<'_>,
        input_image: &ImageArtifact,
        mask_image: Option<&ImageArtifact>,
    ) -> Value;

    /// Extracts the generated image bytes from a response body.
    fn process_output(&self, output: Value) -> Result<Vec<u8>, DriverError>;
}

/// Decodes a base64 image payload, mapping failures to a protocol error.
pub(crate) fn decode_image(
    driver: &'static str,
    operation: &'static str,
    payload: Option<&str>,
) -> Result<Vec<u8>, DriverError> {
    let payload =
        payload.ok_or_else(|| DriverError::protocol(driver, operation, "Response holds no image"))?;
    STANDARD
        .decode(payload)
        .map_err(|e| DriverError::protocol(driver, operation, format!("Invalid image payload: {e}")))
}

/// Image generation driver posting JSON built by `M` to one endpoint.
pub struct HttpImageGenerationDriver<M> {
    model: M,
    api_url: String,
    headers: HeaderMap,
    client: reqwest::Client,
    width: u32,
    height: u32,
    seed: Option<u64>,
    envelope: DriverEnvelope,
}

impl<M: ImageModelDriver> HttpImageGenerationDriver<M> {
    pub fn new(model: M, api_url: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            model,
            api_url: api_url.into(),
            headers,
            client: reqwest::Client::new(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            seed: None,
            envelope: DriverEnvelope::default(),
        }
    }

    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
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

    fn request<'a>(
        &self,
        prompts: &'a [String],
        negative_prompts: Option<&'a [String]>,
        (width, height): (u32, u32),
    ) -> ImageRequest<'a> {
        ImageRequest {
            prompts,
            negative_prompts,
            width,
            height,
            seed: self.seed,
        }
    }

    /// Posts `body` and labels the image with the size it was requested at.
    async fn generate(
        &self,
        operation: &'static str,
        body: Value,
        request: &ImageRequest<'_>,
    ) -> Result<ImageArtifact, DriverError> {
        let name = self.model.name();
        let bytes = self
            .envelope
            .call(name, operation, |_| async {
                let output =
                    post_json(&self.client, name, operation, &self.api_url, &self.headers, &body)
                        .await?;
                self.model.process_output(output)
            })
            .await?;

        Ok(ImageArtifact::new(bytes, "png", request.width, request.height)
            .annotated("prompt", json!(request.prompts.join(", ")))
            .annotated("model", json!(name)))
    }
}

#[async_trait]
impl<M: ImageModelDriver> TextToImageGenerationDriver for HttpImageGenerationDriver<M> {
    #[instrument(skip_all, fields(driver = self.model.name()))]
    async fn generate_image(
        &self,
        prompts: &[String],
        negative_prompts: Option<&[String]>,
    ) -> Result<ImageArtifact, DriverError> {
        let request = self.request(prompts, negative_prompts, (self.width, self.height));
        let body = self.model.text_to_image_request_parameters(&request);
        self.generate("generate_image", body, &request).await
    }
}

#[async_trait]
impl<M: ImageModelDriver> ImageToImageGenerationDriver for HttpImageGenerationDriver<M> {
    #[instrument(skip_all, fields(driver = self.model.name()))]
    async fn image_to_image_generation(
        &self,
        input_image: &ImageArtifact,
        prompts: &[String],
        mask_image: Option<&ImageArtifact>,
        negative_prompts: Option<&[String]>,
    ) -> Result<ImageArtifact, DriverError> {
        // Variations keep the input's dimensions, not the configured size.
        let request = self.request(
            prompts,
            negative_prompts,
            (input_image.width, input_image.height),
        );
        let body = self
            .model
            .image_to_image_request_parameters(&request, input_image, mask_image);
        self.generate("image_to_image_generation", body, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_image() {
        assert_eq!(decode_image("D", "op", Some("cG5n")).unwrap(), b"png");
        assert!(matches!(
            decode_image("D", "op", None),
            Err(DriverError::Protocol { .. })
        ));
        assert!(matches!(
            decode_image("D", "op", Some("***")),
            Err(DriverError::Protocol { .. })
        ));
    }

    #[tokio::test]
    async fn test_combined_driver_runs_both_operations() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/generate")
            .with_body(json!({"artifacts": [{"base64": "cG5n", "finishReason": "SUCCESS"}]}).to_string())
            .expect(2)
            .create_async()
            .await;

        let driver = HttpImageGenerationDriver::new(
            StableDiffusionImageModel::default(),
            format!("{}/generate", server.url()),
            HeaderMap::new(),
        )
        .with_size(64, 32)
        .with_retry_policy(RetryPolicy::no_retry());

        fn as_combined(driver: &dyn ImageGenerationDriver) -> &dyn ImageGenerationDriver {
            driver
        }
        let driver = as_combined(&driver);

        let prompts = vec!["a red fox".to_string()];
        let generated = driver.generate_image(&prompts, None).await.unwrap();
        assert_eq!(generated.value, b"png");
        assert_eq!((generated.width, generated.height), (64, 32));
        assert_eq!(generated.meta.get("prompt").unwrap(), "a red fox");

        let varied = driver
            .image_to_image_generation(&generated, &prompts, None, None)
            .await
            .unwrap();
        assert_eq!(varied.value, b"png");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_image_to_image_keeps_input_size() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/generate")
            .with_body(json!({"artifacts": [{"base64": "cG5n", "finishReason": "SUCCESS"}]}).to_string())
            .create_async()
            .await;

        let driver = HttpImageGenerationDriver::new(
            StableDiffusionImageModel::default(),
            format!("{}/generate", server.url()),
            HeaderMap::new(),
        )
        .with_size(64, 32)
        .with_retry_policy(RetryPolicy::no_retry());

        let input = ImageArtifact::new(b"png".to_vec(), "png", 300, 200);
        let varied = driver
            .image_to_image_generation(&input, &["snowy".to_string()], None, None)
            .await
            .unwrap();
        assert_eq!((varied.width, varied.height), (300, 200));
        assert_eq!(varied.meta.get("prompt").unwrap(), "snowy");
    }
}
