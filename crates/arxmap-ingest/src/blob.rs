use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arxmap_core::config::{expand_path, StorageSettings};
use arxmap_core::error::{Error, Result};
use arxmap_core::traits::BlobStore;

/// Blobs as files under a root directory; keys are relative paths.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path { &self.root }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let rel = Path::new(key);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || escapes {
            return Err(Error::Config(format!("blob key '{key}' must be a relative path inside the store")));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.resolve(key)?).await?)
    }

    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }
}

/// Remote object storage addressed as `GET`/`PUT {base_url}/{key}`.
pub struct HttpBlobStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBlobStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("cannot build http client: {e}")))?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let url = self.url(key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::External(format!("GET {url}: {e}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::External(format!("GET {url}: status {}", response.status())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::External(format!("GET {url}: {e}")))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let url = self.url(key);
        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| Error::External(format!("PUT {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::External(format!("PUT {url}: status {}", response.status())));
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let url = self.url(key);
        let response = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|e| Error::External(format!("HEAD {url}: {e}")))?;
        Ok(response.status().is_success())
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

pub fn open_blob_store(settings: &StorageSettings, timeout: Duration) -> Result<Arc<dyn BlobStore>> {
    match settings.backend.as_str() {
        "local" => Ok(Arc::new(LocalBlobStore::new(expand_path(&settings.local_root)))),
        "http" => {
            let base = settings
                .http_base_url
                .as_deref()
                .ok_or_else(|| Error::Config("storage.http_base_url is required for the http backend".into()))?;
            Ok(Arc::new(HttpBlobStore::new(base, timeout)?))
        }
        other => Err(Error::Config(format!("unknown storage backend '{other}'"))),
    }
}
