//! Placeholder drivers. Every operation fails with [`DriverError::Dummy`]
//! naming the driver and the method, so a missing configuration shows up
//! at the call site instead of as a silent no-op.

use async_trait::async_trait;

use super::{
    embedding::EmbeddingDriver,
    image_generation::{ImageToImageGenerationDriver, TextToImageGenerationDriver},
    prompt::{Prompt, PromptDriver, PromptParams},
    DriverEnvelope, DriverError,
};
use crate::{
    artifacts::{ImageArtifact, TextArtifact},
    retry::RetryPolicy,
    tokenizers::{SimpleTokenizer, Tokenizer},
};

fn envelope() -> DriverEnvelope {
    DriverEnvelope {
        retry_policy: RetryPolicy::no_retry(),
        ..DriverEnvelope::default()
    }
}

#[derive(Debug)]
pub struct DummyPromptDriver {
    tokenizer: SimpleTokenizer,
    envelope: DriverEnvelope,
}

impl Default for DummyPromptDriver {
    fn default() -> Self {
        Self {
            tokenizer: SimpleTokenizer::default(),
            envelope: envelope(),
        }
    }
}

#[async_trait]
impl PromptDriver for DummyPromptDriver {
    fn name(&self) -> &'static str {
        "DummyPromptDriver"
    }

    fn tokenizer(&self) -> &dyn Tokenizer {
        &self.tokenizer
    }

    fn envelope(&self) -> &DriverEnvelope {
        &self.envelope
    }

    async fn try_complete(
        &self,
        _prompt: &Prompt,
        _params: &PromptParams,
    ) -> Result<TextArtifact, DriverError> {
        Err(DriverError::dummy(self.name(), "try_complete"))
    }
}

#[derive(Debug)]
pub struct DummyEmbeddingDriver {
    tokenizer: SimpleTokenizer,
    envelope: DriverEnvelope,
}

impl Default for DummyEmbeddingDriver {
    fn default() -> Self {
        Self {
            tokenizer: SimpleTokenizer::default(),
            envelope: envelope(),
        }
    }
}

#[async_trait]
impl EmbeddingDriver for DummyEmbeddingDriver {
    fn name(&self) -> &'static str {
        "DummyEmbeddingDriver"
    }

    fn tokenizer(&self) -> &dyn Tokenizer {
        &self.tokenizer
    }

    fn envelope(&self) -> &DriverEnvelope {
        &self.envelope
    }

    async fn try_embed_chunk(&self, _chunk: &str) -> Result<Vec<f64>, DriverError> {
        Err(DriverError::dummy(self.name(), "try_embed_chunk"))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DummyImageGenerationDriver;

#[async_trait]
impl TextToImageGenerationDriver for DummyImageGenerationDriver {
    async fn generate_image(
        &self,
        _prompts: &[String],
        _negative_prompts: Option<&[String]>,
    ) -> Result<ImageArtifact, DriverError> {
        Err(DriverError::dummy("DummyImageGenerationDriver", "generate_image"))
    }
}

#[async_trait]
impl ImageToImageGenerationDriver for DummyImageGenerationDriver {
    async fn image_to_image_generation(
        &self,
        _input_image: &ImageArtifact,
        _prompts: &[String],
        _mask_image: Option<&ImageArtifact>,
        _negative_prompts: Option<&[String]>,
    ) -> Result<ImageArtifact, DriverError> {
        Err(DriverError::dummy(
            "DummyImageGenerationDriver",
            "image_to_image_generation",
        ))
    }
}
