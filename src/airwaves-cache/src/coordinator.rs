//! Single-flight coordination of episode downloads.
//!
//! At most one download per cache file runs at a time within the process.
//! Callers that arrive while one is running await the same shared future and
//! observe the same outcome. Different episodes never contend: the map lock is
//! held only for the check-and-insert, never across an await.

use crate::download::{download_atomically, AudioSource, DownloadError};
use crate::freshness;
use crate::layout::{sanitize_id, CacheLayout};
use airwaves_core::EpisodeId;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

type SharedDownload = Shared<BoxFuture<'static, Result<u64, Arc<DownloadError>>>>;
type InflightMap = Arc<Mutex<HashMap<String, SharedDownload>>>;

/// How an `ensure_cached` call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The cached file was within its TTL; nothing was fetched.
    Fresh,
    /// This call started the download.
    Downloaded { bytes: u64 },
    /// This call waited on a download another caller started.
    Joined { bytes: u64 },
}

pub type EnsureResult = Result<EnsureOutcome, Arc<DownloadError>>;

pub struct AudioCache {
    layout: CacheLayout,
    ttl: Duration,
    source: Arc<dyn AudioSource>,
    inflight: InflightMap,
}

impl std::fmt::Debug for AudioCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioCache")
            .field("root", &self.layout.root())
            .field("ttl", &self.ttl)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl AudioCache {
    pub fn new(layout: CacheLayout, ttl: Duration, source: Arc<dyn AudioSource>) -> Self {
        Self {
            layout,
            ttl,
            source,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn path_for(&self, id: &EpisodeId) -> PathBuf {
        self.layout.episode_path(id)
    }

    pub async fn is_fresh(&self, id: &EpisodeId) -> bool {
        freshness::is_fresh(&self.path_for(id), self.ttl).await
    }

    /// Whatever complete file exists for `id`, fresh or stale.
    pub async fn cached_file(&self, id: &EpisodeId) -> Option<PathBuf> {
        let path = self.path_for(id);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    /// Number of downloads currently running.
    pub fn in_flight(&self) -> usize {
        self.lock_inflight().len()
    }

    pub fn is_downloading(&self, id: &EpisodeId) -> bool {
        self.lock_inflight().contains_key(&sanitize_id(id.as_str()))
    }

    /// Make sure a fresh copy of `url` is cached for `id`.
    ///
    /// Starts a download only when the cached file is missing or stale and no
    /// download for the same file is already running; otherwise joins it.
    pub async fn ensure_cached(&self, id: &EpisodeId, url: &str) -> EnsureResult {
        let path = self.path_for(id);
        if freshness::is_fresh(&path, self.ttl).await {
            return Ok(EnsureOutcome::Fresh);
        }

        let key = sanitize_id(id.as_str());
        let (download, leader) = {
            let mut inflight = self.lock_inflight();
            match inflight.get(&key) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let download = self.spawn_download(key.clone(), id.clone(), url, path);
                    inflight.insert(key, download.clone());
                    (download, true)
                }
            }
        };

        if !leader {
            tracing::debug!(episode_id = %id, "joining in-flight download");
        }
        let bytes = download.await?;
        Ok(if leader {
            EnsureOutcome::Downloaded { bytes }
        } else {
            EnsureOutcome::Joined { bytes }
        })
    }

    /// Runs the download on its own task so it completes, and its map entry is
    /// cleared, even if every waiting caller goes away.
    fn spawn_download(
        &self,
        key: String,
        id: EpisodeId,
        url: &str,
        path: PathBuf,
    ) -> SharedDownload {
        let source = Arc::clone(&self.source);
        let url = url.to_string();
        let guard = InflightGuard {
            inflight: Arc::clone(&self.inflight),
            key,
        };

        let task = tokio::spawn(async move {
            let _guard = guard;
            let started = std::time::Instant::now();
            match download_atomically(source.as_ref(), &url, &path).await {
                Ok(bytes) => {
                    tracing::info!(
                        episode_id = %id,
                        bytes,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "cached episode audio"
                    );
                    Ok(bytes)
                }
                Err(e) => {
                    tracing::warn!(episode_id = %id, error = %e, "episode download failed");
                    Err(Arc::new(e))
                }
            }
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(join_err) => Err(Arc::new(DownloadError::Aborted {
                    message: join_err.to_string(),
                })),
            }
        }
        .boxed()
        .shared()
    }

    fn lock_inflight(&self) -> std::sync::MutexGuard<'_, HashMap<String, SharedDownload>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes the in-flight entry when the download task finishes, however it finishes.
struct InflightGuard {
    inflight: InflightMap,
    key: String,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::ByteStream;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream::{self, StreamExt};

    struct Fixed;

    #[async_trait]
    impl AudioSource for Fixed {
        async fn open(&self, _url: &str) -> Result<ByteStream, DownloadError> {
            Ok(stream::iter(vec![Ok(Bytes::from_static(b"audio"))]).boxed())
        }
    }

    #[tokio::test]
    async fn fresh_file_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::new(
            CacheLayout::new(dir.path()),
            Duration::from_secs(3600),
            Arc::new(Fixed),
        );
        let id = EpisodeId::new("9");

        assert_eq!(
            cache.ensure_cached(&id, "https://cdn/9.mp3").await.unwrap(),
            EnsureOutcome::Downloaded { bytes: 5 }
        );
        assert_eq!(
            cache.ensure_cached(&id, "https://cdn/9.mp3").await.unwrap(),
            EnsureOutcome::Fresh
        );
        assert_eq!(cache.in_flight(), 0);
        assert!(!cache.is_downloading(&id));
        assert!(cache.cached_file(&id).await.is_some());
    }

    #[tokio::test]
    async fn missing_file_has_no_cached_copy() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::new(
            CacheLayout::new(dir.path()),
            Duration::from_secs(3600),
            Arc::new(Fixed),
        );
        assert!(cache.cached_file(&EpisodeId::new("404")).await.is_none());
        assert!(!cache.is_fresh(&EpisodeId::new("404")).await);
    }
}
