//! Local filesystem store.
//!
//! One file per key under the root directory, holding the fingerprint as
//! plain text. Keys that are not safe file names are hex-encoded.
//!
//! ```text
//! {root}/
//! ├── alert_A1
//! ├── alert_A2
//! └── %616c6572742f31      # "alert/1"
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::FingerprintStore;
use crate::error::{AppError, Result};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(file_name(key))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let path = self.path(key);
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::store(format!("read {key}: {e}"))),
        }
    }
}

/// Map a key to a file name. Safe keys are used as-is.
fn file_name(key: &str) -> String {
    let safe = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if safe && !key.ends_with(".tmp") {
        key.to_string()
    } else {
        format!("%{}", hex::encode(key))
    }
}

#[async_trait]
impl FingerprintStore for LocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.read_bytes(key).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(|value| Some(value.trim().to_string()))
                .map_err(|e| AppError::store(format!("{key} is not UTF-8: {e}"))),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.write_bytes(key, value.as_bytes())
            .await
            .map_err(|e| AppError::store(format!("write {key}: {e}")))
    }
}
