//! Implements upload of archives to S3 using [S3Publisher].

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use super::{Publish, PublishError, PublishOutcome};
use crate::config::StorageConfig;

const CREDENTIALS_PROVIDER: &str = "grafana-backup-config";

/// The [S3Publisher] stores archives as `s3://<bucket>/<prefix>/<archive name>`.
///
/// Uploads are skipped unless the [StorageConfig] is complete.
#[derive(Debug, Clone)]
pub struct S3Publisher {
    storage: StorageConfig,
}

impl S3Publisher {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }

    async fn put(&self, archive: &Path, key: &str) -> Result<(), PublishError> {
        let credentials = Credentials::new(
            &self.storage.access_key_id,
            &self.storage.secret_access_key,
            None,
            None,
            CREDENTIALS_PROVIDER,
        );
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.storage.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;
        let client = Client::new(&sdk_config);

        let body = ByteStream::from_path(archive)
            .await
            .map_err(|source| PublishError::Open {
                path: archive.to_path_buf(),
                source,
            })?;

        client
            .put_object()
            .bucket(&self.storage.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| PublishError::Put(e.into()))?;

        Ok(())
    }
}

/// Joins `prefix` and `file_name` without doubling the separator.
pub fn object_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{prefix}/{file_name}")
    }
}

impl Publish for S3Publisher {
    fn publish(&self, archive: &Path) -> Result<PublishOutcome, PublishError> {
        if !self.storage.is_complete() {
            log::info!(target: "publish::s3", "S3 configuration incomplete, skip upload");
            return Ok(PublishOutcome::Skipped);
        }

        let file_name = archive
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PublishError::InvalidArchivePath(archive.to_path_buf()))?;
        let key = object_key(&self.storage.prefix, file_name);
        log::info!(target: "publish::s3", "Upload {} as {key}", archive.display());

        // the SDK is async only
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(PublishError::Runtime)?;
        runtime.block_on(self.put(archive, &key))?;

        let location = format!("s3://{}/{key}", self.storage.bucket);
        log::info!(target: "publish::s3", "Upload success, archive located at {location}");

        Ok(PublishOutcome::Uploaded { location })
    }
}
