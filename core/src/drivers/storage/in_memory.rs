use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::StorageDriver;
use crate::drivers::DriverError;

#[derive(Debug, Default)]
pub struct InMemoryStorageDriver {
    blobs: DashMap<String, Vec<u8>>,
}

impl InMemoryStorageDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl StorageDriver for InMemoryStorageDriver {
    async fn save(&self, value: Vec<u8>) -> Result<String, DriverError> {
        let key = Uuid::new_v4().to_string();
        self.blobs.insert(key.clone(), value);
        Ok(key)
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, DriverError> {
        Ok(self.blobs.get(key).map(|v| v.value().clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), DriverError> {
        self.blobs.remove(key);
        Ok(())
    }
}
