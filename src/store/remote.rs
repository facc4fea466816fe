use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{error, info, instrument};

use crate::config::{Remote, RemoteKind};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("object {0} not found")]
    NotFound(String),
    #[error("invalid object key {0:?}")]
    InvalidKey(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("remote error: {0:#}")]
    Backend(#[from] anyhow::Error),
}

/// Minimal key-value object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), RemoteError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, RemoteError>;
}

/// Build the store described by `remote`.
pub fn from_config(remote: &Remote) -> Result<Box<dyn ObjectStore>, RemoteError> {
    match remote.kind {
        RemoteKind::Fs => Ok(Box::new(FsBucket::new(&remote.location))),
        RemoteKind::Http => {
            let base = Url::parse(&remote.location)
                .with_context(|| format!("invalid remote base URL {}", remote.location))?;
            Ok(Box::new(HttpBucket::new(base, remote.token.clone())?))
        }
    }
}

/// A local directory used as a bucket.
#[derive(Debug, Clone)]
pub struct FsBucket {
    root: PathBuf,
}

impl FsBucket {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, RemoteError> {
        let rel = Path::new(key);
        let safe = !key.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(RemoteError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ObjectStore for FsBucket {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), RemoteError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, RemoteError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(RemoteError::NotFound(key.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Object store reached with plain HTTP PUT/GET under a base URL.
#[derive(Clone)]
pub struct HttpBucket {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl fmt::Debug for HttpBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBucket")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpBucket {
    pub fn new(base_url: Url, token: Option<String>) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .user_agent("job-harvester/0.1")
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    fn url_for(&self, key: &str) -> Result<Url, RemoteError> {
        let invalid = || RemoteError::InvalidKey(key.to_string());
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|s| s == "..")
            || Url::parse(key).is_ok()
        {
            return Err(invalid());
        }
        let url = self.base_url.join(key).map_err(|_| invalid())?;
        // The bearer token must never leave the configured base.
        if url.origin() != self.base_url.origin() || !url.path().starts_with(self.base_url.path()) {
            return Err(invalid());
        }
        Ok(url)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpBucket {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), RemoteError> {
        let url = self.url_for(key)?;
        let res = self
            .request(self.http.put(url.clone()).body(bytes))
            .send()
            .await
            .with_context(|| format!("failed to reach {}", url))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("PUT {} returned {}: {}", url, status, body).into());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, RemoteError> {
        let url = self.url_for(key)?;
        let res = self
            .request(self.http.get(url.clone()))
            .send()
            .await
            .with_context(|| format!("failed to reach {}", url))?;
        if res.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(key.to_string()));
        }
        if !res.status().is_success() {
            return Err(anyhow::anyhow!("GET {} returned {}", url, res.status()).into());
        }
        let bytes = res.bytes().await.context("failed to read object body")?;
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    Upload,
    Download,
}

/// Copy `local_path` to `remote_id`, or the other way round. Failures are
/// logged here and returned; the caller decides whether they are fatal.
#[instrument(skip_all, fields(local = %local_path.display(), remote_id = %remote_id, direction = ?direction))]
pub async fn sync_remote(
    store: &dyn ObjectStore,
    local_path: &Path,
    remote_id: &str,
    direction: SyncDirection,
) -> Result<(), RemoteError> {
    let result = match direction {
        SyncDirection::Upload => match fs::read(local_path).await {
            Ok(bytes) => store.put(remote_id, bytes).await,
            Err(err) => Err(err.into()),
        },
        SyncDirection::Download => match store.get(remote_id).await {
            Ok(bytes) => write_local(local_path, bytes).await,
            Err(err) => Err(err),
        },
    };
    match &result {
        Ok(()) => info!("remote sync complete"),
        Err(err) => error!(%err, "remote sync failed"),
    }
    result
}

async fn write_local(path: &Path, bytes: Vec<u8>) -> Result<(), RemoteError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, bytes).await?;
    Ok(())
}
