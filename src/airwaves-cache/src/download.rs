//! Streaming downloads that only ever publish complete files.

use crate::layout::temp_path_for;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("origin returned status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("origin returned an empty body for {url}")]
    EmptyBody { url: String },
    #[error("filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("download task ended abnormally: {message}")]
    Aborted { message: String },
}

pub type ByteStream = BoxStream<'static, Result<Bytes, DownloadError>>;

/// Where audio bytes come from. The HTTP implementation is the only one used
/// in production; tests substitute slow or failing sources.
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Start fetching `url`. Non-success statuses fail here, before any bytes are written.
    async fn open(&self, url: &str) -> Result<ByteStream, DownloadError>;
}

#[derive(Debug, Clone)]
pub struct HttpAudioSource {
    client: Client,
}

impl HttpAudioSource {
    /// `timeout` bounds the whole transfer so a hung origin releases its slot.
    pub fn new(timeout: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|e| DownloadError::Request {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AudioSource for HttpAudioSource {
    async fn open(&self, url: &str) -> Result<ByteStream, DownloadError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let url = url.to_string();
        Ok(resp
            .bytes_stream()
            .map(move |chunk| {
                chunk.map_err(|e| DownloadError::Request {
                    url: url.clone(),
                    message: e.to_string(),
                })
            })
            .boxed())
    }
}

/// Fetch `url` into `dest` through a sibling temp file and an atomic rename.
///
/// On failure the temp file is removed and `dest` is left as it was.
/// Returns the number of bytes published.
pub async fn download_atomically(
    source: &dyn AudioSource,
    url: &str,
    dest: &Path,
) -> Result<u64, DownloadError> {
    let stream = source.open(url).await?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| DownloadError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let temp = temp_path_for(dest);
    let written = match write_stream(stream, &temp).await {
        Ok(0) => {
            discard(&temp).await;
            return Err(DownloadError::EmptyBody {
                url: url.to_string(),
            });
        }
        Ok(written) => written,
        Err(e) => {
            discard(&temp).await;
            return Err(e);
        }
    };

    if let Err(source) = fs::rename(&temp, dest).await {
        discard(&temp).await;
        return Err(DownloadError::Io {
            path: dest.to_path_buf(),
            source,
        });
    }

    tracing::debug!(bytes = written, path = %dest.display(), "published cached audio");
    Ok(written)
}

async fn write_stream(mut stream: ByteStream, temp: &Path) -> Result<u64, DownloadError> {
    let io_err = |source| DownloadError::Io {
        path: temp.to_path_buf(),
        source,
    };

    let file = fs::File::create(temp).await.map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }
    writer.flush().await.map_err(io_err)?;
    writer.into_inner().sync_all().await.map_err(io_err)?;
    Ok(written)
}

async fn discard(temp: &Path) {
    if let Err(e) = fs::remove_file(temp).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!(error = %e, path = %temp.display(), "failed to remove partial download");
        }
    }
}
