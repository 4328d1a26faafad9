//! AWS S3 fingerprint store.
//!
//! Each key is an object `{prefix}/{key}` whose body is the fingerprint.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use super::FingerprintStore;
use crate::error::{AppError, Result};
use crate::models::StoreConfig;

/// S3-backed fingerprint store.
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    /// Create a new S3 store instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Create an S3 store from the ambient AWS configuration.
    ///
    /// Fails when `store.s3_bucket` is not set.
    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        let bucket = config
            .s3_bucket
            .clone()
            .ok_or_else(|| AppError::config("store.s3_bucket is not set"))?;
        let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Ok(Self::new(Client::new(&aws), bucket, config.s3_prefix.clone()))
    }

    fn object_key(&self, key: &str) -> String {
        let prefix = self.prefix.trim_end_matches('/');
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}/{key}")
        }
    }
}

#[async_trait]
impl FingerprintStore for S3Store {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let object_key = self.object_key(key);
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::store(format!("s3://{}/{object_key}: {e}", self.bucket)))?
                    .into_bytes();
                let value = String::from_utf8(bytes.to_vec())
                    .map_err(|e| AppError::store(format!("{object_key} is not UTF-8: {e}")))?;
                Ok(Some(value.trim().to_string()))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    log::debug!("No fingerprint at s3://{}/{}", self.bucket, object_key);
                    Ok(None)
                } else {
                    Err(AppError::store(service_err))
                }
            }
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let object_key = self.object_key(key);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(value.as_bytes().to_vec()))
            .content_type("text/plain")
            .send()
            .await
            .map_err(|e| AppError::store(e.into_service_error()))?;

        log::debug!("Wrote s3://{}/{}", self.bucket, object_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(prefix: &str) -> S3Store {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-west-2"))
            .build();
        S3Store::new(Client::from_conf(config), "bucket", prefix)
    }

    #[test]
    fn test_object_key() {
        assert_eq!(store("metrolert").object_key("alert_A1"), "metrolert/alert_A1");
        assert_eq!(store("metrolert/").object_key("alert_A1"), "metrolert/alert_A1");
        assert_eq!(store("").object_key("alert_A1"), "alert_A1");
    }
}
