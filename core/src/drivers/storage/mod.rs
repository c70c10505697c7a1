//! Key/value blob storage drivers. Keys are UUIDs generated on `save`.

mod in_memory;
mod local_file;

pub use in_memory::InMemoryStorageDriver;
pub use local_file::LocalFileStorageDriver;

use async_trait::async_trait;

use super::DriverError;

#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Stores `value` under a fresh key and returns the key.
    async fn save(&self, value: Vec<u8>) -> Result<String, DriverError>;

    /// `None` for keys that were never saved or have been deleted.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, DriverError>;

    /// Deleting an unknown key is not an error.
    async fn delete(&self, key: &str) -> Result<(), DriverError>;
}
