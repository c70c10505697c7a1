//! Namespaced tool memory.
//!
//! [`ToolMemory`] routes artifacts to the first registered
//! [`ArtifactStorage`] backend that accepts them. Backends keep append
//! order per namespace and hand out snapshots on load.

mod blob;
mod text;

pub use blob::BlobArtifactStorage;
pub use text::TextArtifactStorage;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    artifacts::{Artifact, InfoArtifact, ListArtifact},
    drivers::DriverError,
};

pub const CANT_SUMMARIZE: &str = "Can't summarize artifacts";
pub const CANT_QUERY: &str = "Can't query artifacts";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolMemoryError {
    #[error("no storage accepts {type_name} artifacts")]
    UnsupportedArtifact { type_name: &'static str },
    #[error("namespace must not be empty")]
    EmptyNamespace,
    #[error(transparent)]
    Driver(#[from] DriverError),
}

pub(crate) fn check_namespace(namespace: &str) -> Result<(), ToolMemoryError> {
    if namespace.is_empty() {
        Err(ToolMemoryError::EmptyNamespace)
    } else {
        Ok(())
    }
}

#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    fn can_store(&self, artifact: &Artifact) -> bool;

    /// Appends `artifact` to `namespace`.
    async fn store_artifact(&self, namespace: &str, artifact: Artifact) -> Result<(), ToolMemoryError>;

    /// Artifacts of `namespace` in append order; an empty list for unknown
    /// namespaces.
    async fn load_artifacts(&self, namespace: &str) -> Result<ListArtifact, ToolMemoryError>;

    async fn summarize(&self, namespace: &str) -> Result<Artifact, ToolMemoryError>;

    async fn query(&self, namespace: &str, query: &str) -> Result<Artifact, ToolMemoryError>;
}

/// Routes artifacts to storage backends by type.
pub struct ToolMemory {
    name: String,
    storages: Vec<Arc<dyn ArtifactStorage>>,
    namespaces: RwLock<Vec<String>>,
}

impl ToolMemory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storages: Vec::new(),
            namespaces: RwLock::new(Vec::new()),
        }
    }

    /// Registers a backend; earlier registrations take precedence.
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn ArtifactStorage>) -> Self {
        self.storages.push(storage);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn storage_for(&self, artifact: &Artifact) -> Option<&Arc<dyn ArtifactStorage>> {
        self.storages.iter().find(|s| s.can_store(artifact))
    }

    #[must_use]
    pub fn can_store(&self, artifact: &Artifact) -> bool {
        self.storage_for(artifact).is_some()
    }

    #[instrument(skip(self, artifact), fields(memory = %self.name, kind = artifact.type_name()))]
    pub async fn store_artifact(&self, namespace: &str, artifact: Artifact) -> Result<(), ToolMemoryError> {
        check_namespace(namespace)?;
        let storage = self
            .storage_for(&artifact)
            .ok_or(ToolMemoryError::UnsupportedArtifact {
                type_name: artifact.type_name(),
            })?;
        storage.store_artifact(namespace, artifact).await?;

        let mut namespaces = self.namespaces.write().await;
        if !namespaces.iter().any(|n| n == namespace) {
            namespaces.push(namespace.to_string());
        }
        Ok(())
    }

    /// Stores a tool's output under a fresh namespace and returns an info
    /// artifact pointing at it.
    ///
    /// A list is stored item by item, and only when it has items and every
    /// item is storable. Output nothing accepts is returned unchanged.
    pub async fn process_output(&self, activity: &str, output: Artifact) -> Result<Artifact, ToolMemoryError> {
        let storable = match &output {
            Artifact::List(list) => list.has_items() && list.iter().all(|a| self.can_store(a)),
            other => self.can_store(other),
        };
        if !storable {
            debug!(memory = %self.name, activity, "Output not storable, passing it through");
            return Ok(output);
        }

        let namespace = Uuid::new_v4().simple().to_string();
        match output {
            Artifact::List(list) => {
                for item in list.value {
                    self.store_artifact(&namespace, item).await?;
                }
            }
            other => self.store_artifact(&namespace, other).await?,
        }

        Ok(InfoArtifact::new(format!(
            "Output of \"{activity}\" was stored in memory \"{}\" with namespace \"{namespace}\"",
            self.name
        ))
        .annotated("namespace", serde_json::json!(namespace))
        .into())
    }

    /// Artifacts of `namespace` across all backends, in registration order.
    pub async fn load_artifacts(&self, namespace: &str) -> Result<ListArtifact, ToolMemoryError> {
        check_namespace(namespace)?;
        let mut merged = ListArtifact::default();
        for storage in &self.storages {
            merged.value.extend(storage.load_artifacts(namespace).await?.value);
        }
        Ok(merged)
    }

    /// The first backend holding artifacts of `namespace` summarizes it.
    pub async fn summarize(&self, namespace: &str) -> Result<Artifact, ToolMemoryError> {
        match self.owner_of(namespace).await? {
            Some(storage) => storage.summarize(namespace).await,
            None => Ok(InfoArtifact::new(format!("Namespace \"{namespace}\" is empty")).into()),
        }
    }

    pub async fn query(&self, namespace: &str, query: &str) -> Result<Artifact, ToolMemoryError> {
        match self.owner_of(namespace).await? {
            Some(storage) => storage.query(namespace, query).await,
            None => Ok(InfoArtifact::new(format!("Namespace \"{namespace}\" is empty")).into()),
        }
    }

    async fn owner_of(&self, namespace: &str) -> Result<Option<&Arc<dyn ArtifactStorage>>, ToolMemoryError> {
        check_namespace(namespace)?;
        for storage in &self.storages {
            if storage.load_artifacts(namespace).await?.has_items() {
                return Ok(Some(storage));
            }
        }
        Ok(None)
    }

    /// Namespaces written through this memory, in first-write order.
    pub async fn namespaces(&self) -> Vec<String> {
        self.namespaces.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        artifacts::{BlobArtifact, ImageArtifact, TextArtifact, UrlArtifact},
        drivers::{dummy::DummyEmbeddingDriver, vector::LocalVectorStoreDriver},
        engines::VectorQueryEngine,
    };

    fn blob_memory() -> ToolMemory {
        ToolMemory::new("blobs").with_storage(Arc::new(BlobArtifactStorage::new()))
    }

    #[tokio::test]
    async fn test_routes_to_first_accepting_backend() {
        let first = Arc::new(BlobArtifactStorage::new());
        let second = Arc::new(BlobArtifactStorage::new());
        let memory = ToolMemory::new("m")
            .with_storage(first.clone())
            .with_storage(second.clone());

        memory
            .store_artifact("ns", BlobArtifact::new(b"a".to_vec()).into())
            .await
            .unwrap();

        assert_eq!(first.load_artifacts("ns").await.unwrap().len(), 1);
        assert!(second.load_artifacts("ns").await.unwrap().is_empty());
        assert_eq!(memory.namespaces().await, vec!["ns".to_string()]);
    }

    #[tokio::test]
    async fn test_unsupported_and_empty_namespace() {
        let memory = blob_memory();
        let err = memory
            .store_artifact("ns", TextArtifact::new("t").into())
            .await
            .unwrap_err();
        assert_eq!(err, ToolMemoryError::UnsupportedArtifact { type_name: "TextArtifact" });

        let err = memory
            .store_artifact("", BlobArtifact::new(Vec::new()).into())
            .await
            .unwrap_err();
        assert_eq!(err, ToolMemoryError::EmptyNamespace);
    }

    #[tokio::test]
    async fn test_can_store_partitions_artifacts() {
        let text = TextArtifactStorage::new(VectorQueryEngine::new(Arc::new(
            LocalVectorStoreDriver::new(Arc::new(DummyEmbeddingDriver::default())),
        )));
        let blob = BlobArtifactStorage::new();
        let samples: Vec<Artifact> = vec![
            TextArtifact::new("t").into(),
            BlobArtifact::new(b"b".to_vec()).into(),
            ImageArtifact::new(b"i".to_vec(), "png", 1, 1).into(),
        ];
        for sample in &samples {
            assert!(text.can_store(sample) ^ blob.can_store(sample));
        }
        let url: Artifact = UrlArtifact::new("https://example.com").into();
        assert!(!text.can_store(&url) && !blob.can_store(&url));
    }

    #[tokio::test]
    async fn test_process_output_stores_list_items() {
        let memory = blob_memory();
        let output = ListArtifact::default()
            .with_item(BlobArtifact::new(b"1".to_vec()))
            .with_item(BlobArtifact::new(b"2".to_vec()));

        let info = memory.process_output("download", output.into()).await.unwrap();

        let Artifact::Info(info) = info else {
            panic!("expected an info artifact");
        };
        let namespace = info.meta.get("namespace").unwrap().as_str().unwrap().to_string();
        assert!(info.value.contains("download"));
        assert_eq!(memory.namespaces().await, vec![namespace.clone()]);
        assert_eq!(memory.load_artifacts(&namespace).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_process_output_passes_unstorable_through() {
        let memory = blob_memory();
        let output: Artifact = TextArtifact::new("plain").into();
        assert_eq!(memory.process_output("say", output.clone()).await.unwrap(), output);
        assert!(memory.namespaces().await.is_empty());
    }

    #[tokio::test]
    async fn test_process_output_passes_empty_list_through() {
        let memory = blob_memory();
        let output: Artifact = ListArtifact::default().into();
        assert_eq!(memory.process_output("act", output.clone()).await.unwrap(), output);
        assert!(memory.namespaces().await.is_empty());
    }

    #[tokio::test]
    async fn test_summarize_delegates_to_owner() {
        let memory = blob_memory();
        memory
            .store_artifact("ns", BlobArtifact::new(b"a".to_vec()).into())
            .await
            .unwrap();
        assert_eq!(memory.summarize("ns").await.unwrap().to_text(), CANT_SUMMARIZE);
        assert_eq!(
            memory.summarize("other").await.unwrap().to_text(),
            "Namespace \"other\" is empty"
        );
    }
}
