use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{cosine_similarity, VectorEntry, VectorStoreDriver};
use crate::{
    artifacts::TextArtifact,
    drivers::{embedding::EmbeddingDriver, DriverError},
};

/// In-process vector store. Entries keep insertion order; an upsert with a
/// known id replaces the entry in place.
pub struct LocalVectorStoreDriver {
    embedding_driver: Arc<dyn EmbeddingDriver>,
    entries: RwLock<Vec<VectorEntry>>,
}

impl LocalVectorStoreDriver {
    pub fn new(embedding_driver: Arc<dyn EmbeddingDriver>) -> Self {
        Self {
            embedding_driver,
            entries: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorStoreDriver for LocalVectorStoreDriver {
    fn embedding_driver(&self) -> &dyn EmbeddingDriver {
        self.embedding_driver.as_ref()
    }

    async fn upsert_vector(
        &self,
        namespace: &str,
        id: Option<String>,
        vector: Vec<f64>,
        artifact: TextArtifact,
    ) -> Result<String, DriverError> {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let entry = VectorEntry {
            id: id.clone(),
            vector,
            namespace: namespace.to_string(),
            artifact,
            score: None,
        };

        let mut entries = self.entries.write().await;
        match entries
            .iter_mut()
            .find(|e| e.id == id && e.namespace == namespace)
        {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        debug!(namespace, id, "Upserted vector");
        Ok(id)
    }

    async fn load_entries(&self, namespace: &str) -> Result<Vec<VectorEntry>, DriverError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn query_vector(
        &self,
        namespace: &str,
        vector: &[f64],
        count: usize,
    ) -> Result<Vec<VectorEntry>, DriverError> {
        let mut results = self
            .load_entries(namespace)
            .await?
            .into_iter()
            .map(|mut entry| {
                entry.score = Some(cosine_similarity(vector, &entry.vector));
                entry
            })
            .collect::<Vec<_>>();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(count);
        Ok(results)
    }
}
