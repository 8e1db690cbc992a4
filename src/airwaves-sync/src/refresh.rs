use airwaves_cache::AudioCache;
use airwaves_core::{
    CatalogStore, Episode, Origin, OriginError, ProgramId, RefreshSummary, StoreError,
};
use chrono::Utc;
use futures::future::join_all;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(14 * 24 * 3600);
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("origin error: {0}")]
    Origin(#[from] OriginError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("invalid refresh window: {0:?}")]
    Window(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Trailing window ending at "now".
    pub window: Duration,
    /// Prefetch worker count. Zero is treated as one.
    pub concurrency: usize,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Syncs episode metadata for a set of programs and warms the audio cache for them.
#[derive(Clone)]
pub struct BatchRefresher {
    store: Arc<dyn CatalogStore>,
    origin: Arc<dyn Origin>,
    cache: Arc<AudioCache>,
    defaults: RefreshOptions,
}

impl std::fmt::Debug for BatchRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRefresher")
            .field("origin", &self.origin.id())
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl BatchRefresher {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        origin: Arc<dyn Origin>,
        cache: Arc<AudioCache>,
    ) -> Self {
        Self {
            store,
            origin,
            cache,
            defaults: RefreshOptions::default(),
        }
    }

    /// Options used by [`refresh_followed`](Self::refresh_followed).
    pub fn with_defaults(mut self, defaults: RefreshOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> RefreshOptions {
        self.defaults
    }

    /// Fetch the trailing window for `programs`, upsert it, then prefetch audio
    /// with `opts.concurrency` workers. Ids that are not numeric are dropped;
    /// if none remain nothing happens.
    pub async fn refresh_programs(
        &self,
        programs: &[ProgramId],
        opts: RefreshOptions,
    ) -> Result<RefreshSummary, RefreshError> {
        let valid: Vec<(ProgramId, i64)> = programs
            .iter()
            .filter_map(|id| id.as_numeric().map(|n| (id.clone(), n)))
            .collect();
        if valid.is_empty() {
            tracing::debug!(requested = programs.len(), "no numeric program ids to refresh");
            return Ok(RefreshSummary::default());
        }

        let to = Utc::now();
        let window =
            chrono::Duration::from_std(opts.window).map_err(|_| RefreshError::Window(opts.window))?;
        let from = to - window;

        let numeric: Vec<i64> = valid.iter().map(|(_, n)| *n).collect();
        let fetched = self.origin.fetch_episodes(&numeric, from, to).await?;
        let mut synced = 0usize;
        for episode in fetched {
            self.store.upsert_episode(episode).await?;
            synced += 1;
        }

        let ids: Vec<ProgramId> = valid.into_iter().map(|(id, _)| id).collect();
        let pending = self.store.cacheable_episodes(&ids, from).await?;
        let queued = pending.len();
        let cached = self.prefetch(pending, opts.concurrency.max(1)).await;

        tracing::info!(
            programs = ids.len(),
            synced,
            queued,
            cached,
            "batch refresh finished"
        );
        Ok(RefreshSummary { cached, synced })
    }

    /// Refresh every program followed by any user, using the configured defaults.
    pub async fn refresh_followed(&self) -> Result<RefreshSummary, RefreshError> {
        let programs = self.store.followed_programs().await?;
        if programs.is_empty() {
            tracing::debug!("no followed programs; skipping refresh");
            return Ok(RefreshSummary::default());
        }
        self.refresh_programs(&programs, self.defaults).await
    }

    /// N workers drain a shared queue. Failures are logged and not counted.
    async fn prefetch(&self, episodes: Vec<Episode>, concurrency: usize) -> usize {
        let queue = Mutex::new(VecDeque::from(episodes));
        let workers = (0..concurrency).map(|worker| self.prefetch_worker(worker, &queue));
        join_all(workers).await.into_iter().sum()
    }

    async fn prefetch_worker(&self, worker: usize, queue: &Mutex<VecDeque<Episode>>) -> usize {
        let mut cached = 0;
        loop {
            let next = queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(episode) = next else { break };
            let Some(url) = episode.audio_url.as_deref() else {
                continue;
            };
            match self.cache.ensure_cached(&episode.id, url).await {
                Ok(outcome) => {
                    tracing::trace!(worker, episode_id = %episode.id, ?outcome, "prefetched");
                    cached += 1;
                }
                Err(e) => {
                    tracing::warn!(worker, episode_id = %episode.id, error = %e, "prefetch failed");
                }
            }
        }
        cached
    }
}
