use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::{check_namespace, ArtifactStorage, ToolMemoryError, CANT_QUERY, CANT_SUMMARIZE};
use crate::artifacts::{Artifact, InfoArtifact, ListArtifact};

/// Keeps blob and image artifacts in memory, per namespace in append
/// order.
#[derive(Debug, Default)]
pub struct BlobArtifactStorage {
    blobs: DashMap<String, Vec<Artifact>>,
}

impl BlobArtifactStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStorage for BlobArtifactStorage {
    fn can_store(&self, artifact: &Artifact) -> bool {
        matches!(artifact, Artifact::Blob(_) | Artifact::Image(_))
    }

    async fn store_artifact(&self, namespace: &str, artifact: Artifact) -> Result<(), ToolMemoryError> {
        check_namespace(namespace)?;
        if !self.can_store(&artifact) {
            return Err(ToolMemoryError::UnsupportedArtifact {
                type_name: artifact.type_name(),
            });
        }
        // The entry guard holds the namespace's shard lock until the push
        // is done.
        let mut entry = self.blobs.entry(namespace.to_string()).or_default();
        entry.push(artifact);
        debug!(namespace, count = entry.len(), "Stored blob");
        Ok(())
    }

    async fn load_artifacts(&self, namespace: &str) -> Result<ListArtifact, ToolMemoryError> {
        Ok(self
            .blobs
            .get(namespace)
            .map(|blobs| ListArtifact::new(blobs.value().clone()))
            .unwrap_or_default())
    }

    async fn summarize(&self, _namespace: &str) -> Result<Artifact, ToolMemoryError> {
        Ok(InfoArtifact::new(CANT_SUMMARIZE).into())
    }

    async fn query(&self, _namespace: &str, _query: &str) -> Result<Artifact, ToolMemoryError> {
        Ok(InfoArtifact::new(CANT_QUERY).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{BlobArtifact, TextArtifact};

    #[tokio::test]
    async fn test_store_and_load() {
        let storage = BlobArtifactStorage::new();
        storage
            .store_artifact("test", BlobArtifact::new(b"foo".to_vec()).with_name("foo").into())
            .await
            .unwrap();

        assert_eq!(
            storage.load_artifacts("test").await.unwrap().value,
            vec![Artifact::from(BlobArtifact::new(b"foo".to_vec()).with_name("foo"))]
        );
        assert!(storage.load_artifacts("empty").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_order_is_kept() {
        let storage = BlobArtifactStorage::new();
        let blobs: Vec<Artifact> = (0u8..5).map(|i| BlobArtifact::new(vec![i]).into()).collect();
        for blob in &blobs {
            storage.store_artifact("ns", blob.clone()).await.unwrap();
        }
        storage.store_artifact("ns", blobs[0].clone()).await.unwrap();

        let loaded = storage.load_artifacts("ns").await.unwrap().value;
        assert_eq!(&loaded[..5], &blobs[..]);
        assert_eq!(loaded[5], blobs[0]);
    }

    #[tokio::test]
    async fn test_summarize_and_query() {
        let storage = BlobArtifactStorage::new();
        assert_eq!(storage.summarize("ns").await.unwrap().to_text(), CANT_SUMMARIZE);
        assert_eq!(storage.query("ns", "q").await.unwrap().to_text(), CANT_QUERY);
    }

    #[tokio::test]
    async fn test_rejects_text() {
        let storage = BlobArtifactStorage::new();
        let err = storage
            .store_artifact("ns", TextArtifact::new("t").into())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolMemoryError::UnsupportedArtifact { .. }));
    }
}
