use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::S3Config;

/// Where uploaded pictures end up. Keys are relative, slash separated, server generated.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    /// URL a browser can fetch the object from.
    fn public_url(&self, key: &str) -> String;
}

/// Pictures on local disk, served by the app under `/assets`.
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub async fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create assets dir {}", root.display()))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        let rel = Path::new(key);
        if key.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            bail!("invalid storage key {key:?}");
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl StorageClient for DiskStorage {
    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        let dest = self.path_for(key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create dir {}", parent.display()))?;
        }

        // Write next to the destination and rename, so readers never see a partial file.
        let tmp = dest.with_file_name(format!(".{}.tmp", Uuid::new_v4()));
        let written = async {
            tokio::fs::write(&tmp, &body).await?;
            tokio::fs::rename(&tmp, &dest).await
        }
        .await;
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(error = %cleanup, path = %tmp.display(), "failed to remove temp upload");
                }
            }
            return Err(e).with_context(|| format!("write {}", dest.display()));
        }
        debug!(key, bytes = body.len(), "stored object on disk");
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("/assets/{key}")
    }
}

/// S3 / MinIO bucket.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    endpoint: String,
    bucket: String,
}

impl S3Storage {
    pub async fn new(cfg: &S3Config) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            bucket: cfg.bucket.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for S3Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

/// A stored object that is deleted again unless [`PendingUpload::commit`] is called.
///
/// Created only after a successful `put_object`. Dropping it on an error path
/// schedules the delete on the current runtime.
pub struct PendingUpload {
    storage: Arc<dyn StorageClient>,
    key: String,
    armed: bool,
}

impl PendingUpload {
    pub async fn put(
        storage: Arc<dyn StorageClient>,
        key: String,
        body: Bytes,
        content_type: &str,
    ) -> anyhow::Result<Self> {
        storage
            .put_object(&key, body, content_type)
            .await
            .with_context(|| format!("put_object {key}"))?;
        Ok(Self {
            storage,
            key,
            armed: true,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Keeps the object.
    pub fn commit(mut self) {
        self.armed = false;
    }

    /// Deletes the object now instead of in the background.
    pub async fn discard(mut self) -> anyhow::Result<()> {
        self.armed = false;
        self.storage.delete_object(&self.key).await
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let storage = self.storage.clone();
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = storage.delete_object(&key).await {
                        warn!(error = ?e, key = %key, "failed to roll back upload");
                    } else {
                        debug!(key = %key, "rolled back upload");
                    }
                });
            }
            Err(_) => warn!(key = %key, "no runtime to roll back upload"),
        }
    }
}
