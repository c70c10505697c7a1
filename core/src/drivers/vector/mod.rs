//! Vector store drivers, the persistence behind text tool memory.

mod local;

pub use local::LocalVectorStoreDriver;

use async_trait::async_trait;

use super::{embedding::EmbeddingDriver, DriverError};
use crate::artifacts::TextArtifact;

/// One stored vector with the artifact it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    pub id: String,
    pub vector: Vec<f64>,
    pub namespace: String,
    pub artifact: TextArtifact,
    /// Similarity to the query, set on query results only.
    pub score: Option<f64>,
}

#[async_trait]
pub trait VectorStoreDriver: Send + Sync {
    fn embedding_driver(&self) -> &dyn EmbeddingDriver;

    /// Inserts a vector, replacing the entry with the same id if any.
    /// Returns the entry id.
    async fn upsert_vector(
        &self,
        namespace: &str,
        id: Option<String>,
        vector: Vec<f64>,
        artifact: TextArtifact,
    ) -> Result<String, DriverError>;

    /// Entries of `namespace` in insertion order.
    async fn load_entries(&self, namespace: &str) -> Result<Vec<VectorEntry>, DriverError>;

    /// The `count` entries of `namespace` closest to `vector`, best first.
    async fn query_vector(
        &self,
        namespace: &str,
        vector: &[f64],
        count: usize,
    ) -> Result<Vec<VectorEntry>, DriverError>;

    async fn upsert_text_artifact(
        &self,
        namespace: &str,
        artifact: &TextArtifact,
    ) -> Result<String, DriverError> {
        let vector = artifact.generate_embedding(self.embedding_driver()).await?;
        self.upsert_vector(namespace, None, vector, artifact.clone())
            .await
    }

    async fn query(
        &self,
        namespace: &str,
        query: &str,
        count: usize,
    ) -> Result<Vec<VectorEntry>, DriverError> {
        let vector = self.embedding_driver().embed_string(query).await?;
        self.query_vector(namespace, &vector, count).await
    }
}

/// Cosine similarity of two vectors, 0 when either has no magnitude.
#[must_use]
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
