//! [`FsStorage`]: artifacts laid out as files under a root directory.
//!
//! `build:content:raw:dump.posts.sql` maps to `<root>/build/content/raw/dump.posts.sql`.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::{Storage, StorageError};

/// Filesystem-backed [`Storage`].
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Serve artifacts from below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a storage key onto a path below the root.
    ///
    /// Every segment must be a plain file name: no separators, no `.`/`..`.
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let mut path = self.root.clone();
        for segment in key.split(':') {
            let plain = !segment.is_empty()
                && segment != "."
                && segment != ".."
                && !segment.contains(['/', '\\', '\0']);
            if !plain {
                return Err(StorageError::InvalidKey(key.to_owned()));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key, "storage miss");
                Ok(None)
            }
            Err(source) => Err(StorageError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }
}
