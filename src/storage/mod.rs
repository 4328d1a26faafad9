//! Fingerprint persistence.
//!
//! A store maps `{key_prefix}{alert_id}` to the hex fingerprint of the last
//! content that was published for that alert. Keys are never deleted.
//!
//! ```text
//! alert_A1  -> 3f1c...e9
//! alert_A2  -> 77ab...04
//! ```

pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

pub use local::LocalStore;
pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

/// Trait for fingerprint storage backends.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Read the value stored under `key`, `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

/// Wrapper that reads from the inner store and discards writes.
pub struct ReadOnlyStore {
    inner: Arc<dyn FingerprintStore>,
}

impl ReadOnlyStore {
    pub fn new(inner: Arc<dyn FingerprintStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl FingerprintStore for ReadOnlyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        log::info!("Dry run: not writing {} = {}", key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_only_store_discards_writes() {
        let inner = Arc::new(MemoryStore::new());
        inner.put("alert_A1", "old").await.unwrap();

        let store = ReadOnlyStore::new(inner.clone());
        store.put("alert_A1", "new").await.unwrap();
        store.put("alert_A2", "x").await.unwrap();

        assert_eq!(store.get("alert_A1").await.unwrap().as_deref(), Some("old"));
        assert_eq!(inner.get("alert_A2").await.unwrap(), None);
    }
}
