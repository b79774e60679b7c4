//! Object storage for announcement photos and AR model assets.
//!
//! Filesystem-rooted. Object paths are deterministic and namespaced by
//! category and entity id; download URLs point at the `/media` route served
//! straight from the blob directory.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use url::Url;
use uuid::Uuid;

use crate::config::BlobConfig;

/// Uploads that take longer than this fail. The only timeout in the system.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
    limit: u64,
    host_name: String,
}

/// Build the canonical object path for an entity's asset.
pub fn object_path(category: &str, entity_id: &str, ext: &str) -> String {
    format!("{category}/{entity_id}/{}.{ext}", Uuid::new_v4())
}

impl ObjectStore {
    pub fn new(config: &BlobConfig, host_name: impl Into<String>) -> Self {
        Self {
            root: config.path.clone(),
            limit: config.limit,
            host_name: host_name.into(),
        }
    }

    /// The configured upload size limit, in bytes.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Store `bytes` under `path`, creating parent directories as needed.
    /// Returns the path back on success.
    pub async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String> {
        if bytes.len() as u64 > self.limit {
            bail!("object exceeds the {} byte upload limit", self.limit);
        }
        // Paths are server-built, but never trust them enough to escape the
        // blob root.
        if path.starts_with('/') || path.split('/').any(|seg| seg.is_empty() || seg == "..") {
            bail!("invalid object path: {path}");
        }

        let target = self.root.join(path);
        let write = async {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("failed to create object directory")?;
            }
            tokio::fs::write(&target, bytes)
                .await
                .context("failed to write object")
        };

        tokio::time::timeout(UPLOAD_TIMEOUT, write)
            .await
            .context("upload timed out")??;

        Ok(path.to_owned())
    }

    /// Deterministic download URL for a stored object.
    pub fn download_url(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("https://{}/media/{}", self.host_name, path))
            .context("failed to build download url")
    }
}
