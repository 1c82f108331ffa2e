use crate::data_fetcher::api::fetch_utils::{map_request_error, read_json};
use crate::error::AppError;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use tracing::{info, instrument};

/// A stored object, addressable by the warehouse through `uri`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub key: String,
    pub uri: String,
}

impl ObjectRef {
    /// Filesystem path of a `file://` object.
    pub fn local_path(&self) -> Option<PathBuf> {
        self.uri.strip_prefix("file://").map(PathBuf::from)
    }
}

/// Write-only blob storage for the CSV snapshots.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<ObjectRef, AppError>;
}

/// Keys are relative `/`-separated paths without `..` segments.
fn validate_key(key: &str) -> Result<(), AppError> {
    if key.is_empty() {
        return Err(AppError::storage(key, "object key is empty"));
    }
    let path = Path::new(key);
    let relative = path
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !relative || key.contains('\\') {
        return Err(AppError::storage(
            key,
            "object key must be a relative path without '..'",
        ));
    }
    Ok(())
}

/// Google Cloud Storage through the JSON API simple upload.
#[derive(Debug, Clone)]
pub struct GcsStore {
    client: Client,
    base_url: String,
    bucket: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
    bucket: String,
}

impl GcsStore {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        GcsStore {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            access_token: access_token.into(),
        }
    }
}

impl ObjectStore for GcsStore {
    #[instrument(skip(self, bytes), fields(bucket = %self.bucket, size = bytes.len()))]
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<ObjectRef, AppError> {
        validate_key(key)?;
        let url = format!("{}/upload/storage/v1/b/{}/o", self.base_url, self.bucket);
        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", key)])
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| map_request_error(e, &url))?;

        let object: ObjectResource = read_json(response, &url)
            .await
            .map_err(|e| AppError::storage(key, e.to_string()))?;

        let uri = format!("gs://{}/{}", object.bucket, object.name);
        info!("Uploaded {uri}");
        Ok(ObjectRef {
            key: key.to_string(),
            uri,
        })
    }
}

/// Objects as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStore { root: root.into() }
    }
}

impl ObjectStore for LocalStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<ObjectRef, AppError> {
        validate_key(key)?;
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::storage(key, format!("creating {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AppError::storage(key, format!("writing {}: {e}", path.display())))?;

        let uri = format!("file://{}", path.display());
        info!("Wrote {} bytes to {uri}", bytes.len());
        Ok(ObjectRef {
            key: key.to_string(),
            uri,
        })
    }
}
