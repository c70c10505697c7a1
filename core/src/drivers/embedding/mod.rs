//! Embedding drivers.
//!
//! An [`HttpEmbeddingDriver`] owns the transport, retries and chunking, and
//! composes an [`EmbeddingModelDriver`] that knows the vendor's request and
//! response shapes.

mod huggingface;
mod openai;

pub use huggingface::HuggingFaceEmbeddingModel;
pub use openai::OpenAiEmbeddingModel;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument};

use super::{http::post_json, DriverEnvelope, DriverError};
use crate::{
    artifacts::TextArtifact, observability::Instrumentation, retry::RetryPolicy,
    tokenizers::Tokenizer,
};

#[async_trait]
pub trait EmbeddingDriver: Send + Sync {
    fn name(&self) -> &'static str;
    fn tokenizer(&self) -> &dyn Tokenizer;
    fn envelope(&self) -> &DriverEnvelope;

    /// Embeds a chunk that fits the tokenizer's input budget. One round
    /// trip, no retries.
    async fn try_embed_chunk(&self, chunk: &str) -> Result<Vec<f64>, DriverError>;

    /// Embeds `text`, splitting it into chunks of at most
    /// `max_input_tokens` tokens. Chunk vectors are averaged, weighted by
    /// chunk length, and normalized.
    async fn embed_string(&self, text: &str) -> Result<Vec<f64>, DriverError> {
        let chunks = chunk_text(self.tokenizer(), text);
        if chunks.len() > 1 {
            debug!(driver = self.name(), chunks = chunks.len(), "Embedding long input in chunks");
        }

        let mut embeddings = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let embedding = self
                .envelope()
                .call(self.name(), "embed_string", |_| self.try_embed_chunk(chunk))
                .await?;
            embeddings.push((embedding, chunk.len()));
        }

        match embeddings.len() {
            1 => Ok(embeddings.swap_remove(0).0),
            _ => Ok(weighted_average(&embeddings)),
        }
    }

    async fn embed_text_artifact(&self, artifact: &TextArtifact) -> Result<Vec<f64>, DriverError> {
        self.embed_string(&artifact.value).await
    }
}

fn chunk_text(tokenizer: &dyn Tokenizer, text: &str) -> Vec<String> {
    let max_tokens = tokenizer.max_input_tokens().max(1);
    if tokenizer.count_tokens(text) <= max_tokens {
        return vec![text.to_string()];
    }
    tokenizer
        .encode(text)
        .chunks(max_tokens)
        .map(|tokens| tokenizer.decode(tokens))
        .collect()
}

fn weighted_average(embeddings: &[(Vec<f64>, usize)]) -> Vec<f64> {
    let dimension = embeddings.first().map_or(0, |(v, _)| v.len());
    let total: f64 = embeddings.iter().map(|(_, len)| *len as f64).sum();
    let mut average = vec![0.0; dimension];
    for (vector, len) in embeddings {
        let weight = if total > 0.0 { *len as f64 / total } else { 0.0 };
        for (acc, x) in average.iter_mut().zip(vector) {
            *acc += x * weight;
        }
    }

    let norm = average.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        average.iter_mut().for_each(|x| *x /= norm);
    }
    average
}

/// Vendor specific half of an [`HttpEmbeddingDriver`].
pub trait EmbeddingModelDriver: Send + Sync {
    fn name(&self) -> &'static str;
    fn api_url(&self) -> &str;
    fn headers(&self) -> &HeaderMap;
    fn tokenizer(&self) -> &dyn Tokenizer;

    fn chunk_to_model_params(&self, chunk: &str) -> Value;
    fn process_output(&self, output: Value) -> Result<Vec<f64>, DriverError>;
}

/// Embedding driver posting JSON to a vendor endpoint described by `M`.
///
/// The embedding dimension is pinned by the first successful answer; later
/// answers of another size fail with [`DriverError::Protocol`].
pub struct HttpEmbeddingDriver<M> {
    model: M,
    client: reqwest::Client,
    envelope: DriverEnvelope,
    dimension: OnceLock<usize>,
}

impl<M: EmbeddingModelDriver> HttpEmbeddingDriver<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            client: reqwest::Client::new(),
            envelope: DriverEnvelope::default(),
            dimension: OnceLock::new(),
        }
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

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Dimension observed so far, if any call succeeded.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }
}

#[async_trait]
impl<M: EmbeddingModelDriver> EmbeddingDriver for HttpEmbeddingDriver<M> {
    fn name(&self) -> &'static str {
        self.model.name()
    }

    fn tokenizer(&self) -> &dyn Tokenizer {
        self.model.tokenizer()
    }

    fn envelope(&self) -> &DriverEnvelope {
        &self.envelope
    }

    #[instrument(skip(self, chunk), fields(driver = self.model.name()))]
    async fn try_embed_chunk(&self, chunk: &str) -> Result<Vec<f64>, DriverError> {
        let body = self.model.chunk_to_model_params(chunk);
        let output = post_json(
            &self.client,
            self.model.name(),
            "embed_string",
            self.model.api_url(),
            self.model.headers(),
            &body,
        )
        .await?;
        let embedding = self.model.process_output(output)?;

        let pinned = *self.dimension.get_or_init(|| embedding.len());
        if pinned != embedding.len() {
            return Err(DriverError::protocol(
                self.model.name(),
                "embed_string",
                format!(
                    "embedding dimension changed from {pinned} to {}",
                    embedding.len()
                ),
            ));
        }
        Ok(embedding)
    }
}
