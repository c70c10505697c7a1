use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use super::RerankDriver;
use crate::{
    artifacts::TextArtifact,
    drivers::{embedding::EmbeddingDriver, vector::cosine_similarity, DriverError},
    runnable::RunHooks,
};

/// Reranks by cosine similarity between the query's embedding and each
/// artifact's embedding. Every artifact is kept; each is annotated with
/// its `score`.
pub struct LocalRerankDriver {
    embedding_driver: Arc<dyn EmbeddingDriver>,
    hooks: RunHooks,
}

impl LocalRerankDriver {
    pub fn new(embedding_driver: Arc<dyn EmbeddingDriver>) -> Self {
        Self {
            embedding_driver,
            hooks: RunHooks::default(),
        }
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: RunHooks) -> Self {
        self.hooks = hooks;
        self
    }

    async fn rerank(
        &self,
        query: &str,
        artifacts: Vec<TextArtifact>,
    ) -> Result<Vec<TextArtifact>, DriverError> {
        if artifacts.is_empty() {
            return Ok(artifacts);
        }
        let query = self.embedding_driver.embed_string(query).await?;

        let mut scored = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let embedding = artifact
                .generate_embedding(self.embedding_driver.as_ref())
                .await?;
            scored.push((cosine_similarity(&query, &embedding), artifact));
        }
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .map(|(score, artifact)| artifact.annotated("score", json!(score)))
            .collect())
    }
}

#[async_trait]
impl RerankDriver for LocalRerankDriver {
    async fn run(
        &self,
        query: &str,
        artifacts: Vec<TextArtifact>,
    ) -> Result<Vec<TextArtifact>, DriverError> {
        self.hooks
            .run("LocalRerankDriver", self.rerank(query, artifacts))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{drivers::DriverEnvelope, tokenizers::{SimpleTokenizer, Tokenizer}};

    /// Embeds text as (count of 'a', count of 'b').
    #[derive(Default)]
    struct LetterEmbeddingDriver {
        tokenizer: SimpleTokenizer,
        envelope: DriverEnvelope,
    }

    #[async_trait]
    impl EmbeddingDriver for LetterEmbeddingDriver {
        fn name(&self) -> &'static str {
            "LetterEmbeddingDriver"
        }
        fn tokenizer(&self) -> &dyn Tokenizer {
            &self.tokenizer
        }
        fn envelope(&self) -> &DriverEnvelope {
            &self.envelope
        }
        async fn try_embed_chunk(&self, chunk: &str) -> Result<Vec<f64>, DriverError> {
            let count = |c| chunk.chars().filter(|x| *x == c).count() as f64;
            Ok(vec![count('a'), count('b')])
        }
    }

    #[tokio::test]
    async fn test_local_rerank_orders_by_similarity() {
        let driver = LocalRerankDriver::new(Arc::new(LetterEmbeddingDriver::default()));
        let result = driver
            .run(
                "aaa",
                vec![
                    TextArtifact::new("bbb"),
                    TextArtifact::new("aab"),
                    TextArtifact::new("aaa"),
                ],
            )
            .await
            .unwrap();

        let values: Vec<_> = result.iter().map(|a| a.value.as_str()).collect();
        assert_eq!(values, vec!["aaa", "aab", "bbb"]);
        assert_eq!(result[0].meta.get("score").unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_local_rerank_of_nothing() {
        let driver = LocalRerankDriver::new(Arc::new(LetterEmbeddingDriver::default()));
        assert!(driver.run("q", Vec::new()).await.unwrap().is_empty());
    }
}
