use async_trait::async_trait;
use std::sync::Arc;

use super::{check_namespace, ArtifactStorage, ToolMemoryError, CANT_SUMMARIZE};
use crate::{
    artifacts::{Artifact, InfoArtifact, ListArtifact},
    engines::{SummaryEngine, VectorQueryEngine},
};

const DEFAULT_QUERY_COUNT: usize = 5;

/// Text storage backed by a [`VectorQueryEngine`]. Holds no artifacts
/// itself.
pub struct TextArtifactStorage {
    query_engine: VectorQueryEngine,
    summary_engine: Option<Arc<dyn SummaryEngine>>,
    query_count: usize,
}

impl TextArtifactStorage {
    pub fn new(query_engine: VectorQueryEngine) -> Self {
        Self {
            query_engine,
            summary_engine: None,
            query_count: DEFAULT_QUERY_COUNT,
        }
    }

    #[must_use]
    pub fn with_summary_engine(mut self, summary_engine: Arc<dyn SummaryEngine>) -> Self {
        self.summary_engine = Some(summary_engine);
        self
    }

    #[must_use]
    pub fn with_query_count(mut self, query_count: usize) -> Self {
        self.query_count = query_count;
        self
    }
}

#[async_trait]
impl ArtifactStorage for TextArtifactStorage {
    fn can_store(&self, artifact: &Artifact) -> bool {
        matches!(artifact, Artifact::Text(_))
    }

    async fn store_artifact(&self, namespace: &str, artifact: Artifact) -> Result<(), ToolMemoryError> {
        check_namespace(namespace)?;
        let Artifact::Text(text) = artifact else {
            return Err(ToolMemoryError::UnsupportedArtifact {
                type_name: artifact.type_name(),
            });
        };
        self.query_engine
            .upsert_text_artifact(&text, namespace)
            .await?;
        Ok(())
    }

    async fn load_artifacts(&self, namespace: &str) -> Result<ListArtifact, ToolMemoryError> {
        Ok(self.query_engine.load_artifacts(namespace).await?)
    }

    async fn summarize(&self, namespace: &str) -> Result<Artifact, ToolMemoryError> {
        let Some(summary_engine) = &self.summary_engine else {
            return Ok(InfoArtifact::new(CANT_SUMMARIZE).into());
        };
        let artifacts = self.load_artifacts(namespace).await?;
        Ok(summary_engine.summarize_artifacts(&artifacts).await?.into())
    }

    async fn query(&self, namespace: &str, query: &str) -> Result<Artifact, ToolMemoryError> {
        Ok(self
            .query_engine
            .query(query, namespace, self.query_count)
            .await?
            .into())
    }
}
