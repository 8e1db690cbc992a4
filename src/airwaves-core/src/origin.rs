use crate::models::{Episode, EpisodeId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures talking to the upstream broadcaster API.
#[derive(Debug, Error)]
pub enum OriginError {
    #[error("network error: {message}")]
    Network { message: String },
    #[error("origin returned status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("failed to decode origin response: {message}")]
    Decode { message: String },
    #[error("origin has no {entity}")]
    NotFound { entity: String },
}

pub type OriginResult<T> = Result<T, OriginError>;

/// Upstream catalog source.
///
/// Implementations return episode metadata only; audio bytes are fetched by
/// the cache from [`Episode::audio_url`].
#[async_trait]
pub trait Origin: Send + Sync {
    /// Stable identifier used in logs (e.g. "sr").
    fn id(&self) -> &str;

    /// Episodes of the given programs published between `from` and `to`.
    async fn fetch_episodes(
        &self,
        program_ids: &[i64],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> OriginResult<Vec<Episode>>;

    /// A single episode, or `None` when the origin does not know it.
    async fn fetch_episode(&self, id: &EpisodeId) -> OriginResult<Option<Episode>>;
}
