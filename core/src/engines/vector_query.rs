use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::{
    artifacts::{Artifact, ArtifactMeta, ListArtifact, TextArtifact},
    drivers::{
        prompt::{Prompt, PromptDriver, PromptParams},
        vector::VectorStoreDriver,
        DriverError,
    },
};

/// Stores text artifacts as vectors and retrieves them by similarity.
#[derive(Clone)]
pub struct VectorQueryEngine {
    vector_store: Arc<dyn VectorStoreDriver>,
}

impl VectorQueryEngine {
    pub fn new(vector_store: Arc<dyn VectorStoreDriver>) -> Self {
        Self { vector_store }
    }

    pub fn vector_store(&self) -> &dyn VectorStoreDriver {
        self.vector_store.as_ref()
    }

    /// Embeds and stores `artifact`, returning the vector entry id.
    pub async fn upsert_text_artifact(
        &self,
        artifact: &TextArtifact,
        namespace: &str,
    ) -> Result<String, DriverError> {
        self.vector_store
            .upsert_text_artifact(namespace, artifact)
            .await
    }

    /// Every artifact of `namespace` in insertion order; empty for unknown
    /// namespaces.
    pub async fn load_artifacts(&self, namespace: &str) -> Result<ListArtifact, DriverError> {
        let entries = self.vector_store.load_entries(namespace).await?;
        Ok(entries.into_iter().map(|e| Artifact::from(e.artifact)).collect())
    }

    /// The `count` artifacts closest to `query`, best first, annotated with
    /// their `score`.
    #[instrument(skip(self))]
    pub async fn query(
        &self,
        query: &str,
        namespace: &str,
        count: usize,
    ) -> Result<ListArtifact, DriverError> {
        let entries = self.vector_store.query(namespace, query, count).await?;
        debug!(results = entries.len(), "Vector query finished");
        Ok(entries
            .into_iter()
            .map(|e| {
                let score = e.score.unwrap_or_default();
                Artifact::from(e.artifact.annotated("score", json!(score)))
            })
            .collect())
    }

    /// Answers `query` with `prompt_driver`, using the closest artifacts of
    /// `namespace` as context.
    pub async fn answer(
        &self,
        prompt_driver: &dyn PromptDriver,
        query: &str,
        namespace: &str,
        count: usize,
    ) -> Result<TextArtifact, DriverError> {
        let context = self.query(query, namespace, count).await?;
        let prompt = Prompt::Conversation(vec![
            TextArtifact::new(format!(
                "Answer the question using only the following context. If the \
                 context does not contain the answer, say so.\n\n{}",
                context.to_text()
            ))
            .annotated("role", json!("system")),
            TextArtifact::new(query),
        ]);

        let mut answer = prompt_driver
            .complete(&prompt, &PromptParams::default())
            .await?;
        let mut meta = ArtifactMeta::derived(context.value);
        if let ArtifactMeta::Generic(annotations) = std::mem::take(&mut answer.meta) {
            meta.merge(annotations);
        }
        Ok(answer.with_meta(meta))
    }
}
