//! Whole-file JSON store.
//!
//! Every save rewrites the file through a temporary sibling followed by a
//! rename, so a crash leaves either the previous or the new state on disk.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use super::{Groups, Store, StoreResult, schema};
use crate::Clock;

#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn load(&self, clock: &dyn Clock) -> StoreResult<Groups> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!("no state file at {}, starting empty", self.path.display());
                return Ok(Groups::new());
            }
            Err(err) => return Err(err.into()),
        };
        schema::decode_document(&raw, clock)
    }

    async fn save(&self, groups: &Groups) -> StoreResult<()> {
        let document = schema::encode_document(groups)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, document).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}
