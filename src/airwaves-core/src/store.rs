//! Catalog storage seam.
//!
//! The relational catalog (channels, programs, episodes, users) lives behind
//! [`CatalogStore`]. [`MemoryStore`] is the in-process implementation used by
//! the binary and by tests; it can be seeded from a JSON catalog file.

use crate::models::{Episode, EpisodeId, Program, ProgramId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("corrupt catalog {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("storage backend error: {message}")]
    Backend { message: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_episode(&self, id: &EpisodeId) -> StoreResult<Option<Episode>>;

    /// Create or replace the record keyed by `episode.id`. Returns `true` when it was new.
    async fn upsert_episode(&self, episode: Episode) -> StoreResult<bool>;

    /// The subset of `ids` that name known programs, in input order.
    async fn existing_programs(&self, ids: &[ProgramId]) -> StoreResult<Vec<ProgramId>>;

    /// Episodes of `programs` published at or after `since` that have an audio URL.
    async fn cacheable_episodes(
        &self,
        programs: &[ProgramId],
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<Episode>>;

    /// Distinct programs followed by any user.
    async fn followed_programs(&self) -> StoreResult<Vec<ProgramId>>;

    async fn episode_count(&self) -> StoreResult<usize>;
}

/// JSON shape accepted by [`MemoryStore::from_seed_file`].
#[derive(Debug, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub programs: Vec<Program>,
    #[serde(default)]
    pub episodes: Vec<Episode>,
    /// user id -> followed program ids
    #[serde(default)]
    pub follows: HashMap<String, Vec<ProgramId>>,
}

#[derive(Debug, Default)]
struct Catalog {
    programs: HashMap<ProgramId, Program>,
    episodes: HashMap<EpisodeId, Episode>,
    follows: HashMap<String, Vec<ProgramId>>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Catalog>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: CatalogSeed) -> Self {
        let catalog = Catalog {
            programs: seed
                .programs
                .into_iter()
                .map(|program| (program.id.clone(), program))
                .collect(),
            episodes: seed
                .episodes
                .into_iter()
                .map(|episode| (episode.id.clone(), episode))
                .collect(),
            follows: seed.follows,
        };
        Self {
            inner: RwLock::new(catalog),
        }
    }

    pub fn from_seed_file(path: &Path) -> StoreResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let seed: CatalogSeed =
            serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(
            programs = seed.programs.len(),
            episodes = seed.episodes.len(),
            users = seed.follows.len(),
            path = %path.display(),
            "loaded catalog seed"
        );
        Ok(Self::from_seed(seed))
    }

    pub async fn add_program(&self, program: Program) {
        self.inner
            .write()
            .await
            .programs
            .insert(program.id.clone(), program);
    }

    pub async fn follow(&self, user: &str, program: ProgramId) {
        let mut catalog = self.inner.write().await;
        let followed = catalog.follows.entry(user.to_string()).or_default();
        if !followed.contains(&program) {
            followed.push(program);
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_episode(&self, id: &EpisodeId) -> StoreResult<Option<Episode>> {
        Ok(self.inner.read().await.episodes.get(id).cloned())
    }

    async fn upsert_episode(&self, episode: Episode) -> StoreResult<bool> {
        let mut catalog = self.inner.write().await;
        Ok(catalog
            .episodes
            .insert(episode.id.clone(), episode)
            .is_none())
    }

    async fn existing_programs(&self, ids: &[ProgramId]) -> StoreResult<Vec<ProgramId>> {
        let catalog = self.inner.read().await;
        Ok(ids
            .iter()
            .filter(|id| catalog.programs.contains_key(*id))
            .cloned()
            .collect())
    }

    async fn cacheable_episodes(
        &self,
        programs: &[ProgramId],
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<Episode>> {
        let catalog = self.inner.read().await;
        let mut episodes: Vec<Episode> = catalog
            .episodes
            .values()
            .filter(|episode| programs.contains(&episode.program_id))
            .filter(|episode| episode.published_at >= since && episode.has_audio())
            .cloned()
            .collect();
        episodes.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(episodes)
    }

    async fn followed_programs(&self) -> StoreResult<Vec<ProgramId>> {
        let catalog = self.inner.read().await;
        let distinct: BTreeSet<ProgramId> = catalog.follows.values().flatten().cloned().collect();
        Ok(distinct.into_iter().collect())
    }

    async fn episode_count(&self) -> StoreResult<usize> {
        Ok(self.inner.read().await.episodes.len())
    }
}
