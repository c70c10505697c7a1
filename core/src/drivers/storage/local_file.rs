use async_trait::async_trait;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::StorageDriver;
use crate::drivers::DriverError;

const DRIVER: &str = "LocalFileStorageDriver";

/// Stores every value as a file named after its key inside `dir`.
#[derive(Debug, Clone)]
pub struct LocalFileStorageDriver {
    dir: PathBuf,
}

impl LocalFileStorageDriver {
    /// Creates `dir` if needed.
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, DriverError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DriverError::io(DRIVER, "new", &e))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keys are generated UUIDs; anything else cannot name a stored file.
    fn path_for(&self, key: &str) -> Option<PathBuf> {
        Uuid::parse_str(key).ok().map(|id| self.dir.join(id.to_string()))
    }
}

#[async_trait]
impl StorageDriver for LocalFileStorageDriver {
    #[instrument(skip(self, value), fields(dir = %self.dir.display(), bytes = value.len()))]
    async fn save(&self, value: Vec<u8>) -> Result<String, DriverError> {
        let key = Uuid::new_v4().to_string();
        tokio::fs::write(self.dir.join(&key), value)
            .await
            .map_err(|e| DriverError::io(DRIVER, "save", &e))?;
        debug!(key, "Saved value");
        Ok(key)
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, DriverError> {
        let Some(path) = self.path_for(key) else {
            return Ok(None);
        };
        match tokio::fs::read(path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DriverError::io(DRIVER, "load", &e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), DriverError> {
        let Some(path) = self.path_for(key) else {
            return Ok(());
        };
        match tokio::fs::remove_file(path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(DriverError::io(DRIVER, "delete", &e)),
            _ => Ok(()),
        }
    }
}
