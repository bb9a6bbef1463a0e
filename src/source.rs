//! Where probe batches come from: a local file or an HTTP(S) URL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait ProbeSource: Send + Sync {
    /// Human-readable origin, for logs.
    fn location(&self) -> &str;

    /// Raw bytes of the batch, possibly gzip-compressed.
    async fn load(&self) -> Result<Vec<u8>>;
}

pub struct FileSource {
    path: String,
}

impl FileSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ProbeSource for FileSource {
    fn location(&self) -> &str {
        &self.path
    }

    async fn load(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read probe file '{}'", self.path))
    }
}

pub struct HttpSource {
    url: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ProbeSource for HttpSource {
    fn location(&self) -> &str {
        &self.url
    }

    async fn load(&self) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("failed to fetch '{}'", self.url))?
            .error_for_status()
            .with_context(|| format!("bad status from '{}'", self.url))?;
        let bytes = resp
            .bytes()
            .await
            .with_context(|| format!("failed to read body from '{}'", self.url))?;
        Ok(bytes.to_vec())
    }
}

/// `http://` and `https://` locations are fetched; anything else is a path.
pub fn source_for(location: &str) -> Box<dyn ProbeSource> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Box::new(HttpSource::new(location))
    } else {
        Box::new(FileSource::new(location))
    }
}

#[tracing::instrument]
pub async fn load_source(location: &str) -> Result<Vec<u8>> {
    let source = source_for(location);
    let bytes = source.load().await?;
    debug!(source = source.location(), bytes = bytes.len(), "Probe batch loaded");
    Ok(bytes)
}
