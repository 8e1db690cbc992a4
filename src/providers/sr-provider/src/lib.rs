mod mapping;
pub mod models;

use airwaves_core::{Episode, EpisodeId, Origin, OriginError, OriginResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mapping::map_episode;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

pub use mapping::parse_sr_date;

#[derive(Debug, Clone)]
pub struct SrConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for SrConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.sr.se".into(),
            timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SrOrigin {
    client: Client,
    base_url: Url,
}

impl SrOrigin {
    pub fn new(config: SrConfig) -> OriginResult<Self> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| OriginError::Network {
            message: format!("invalid base_url: {e}"),
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.timeout)
            .build()
            .map_err(|e| OriginError::Network {
                message: e.to_string(),
            })?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> OriginResult<Url> {
        self.base_url.join(path).map_err(|e| OriginError::Network {
            message: e.to_string(),
        })
    }

    /// GET `url`; `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> OriginResult<Option<T>> {
        let resp = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|e| OriginError::Network {
                message: e.to_string(),
            })?;
        match resp.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(OriginError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                })
            }
            _ => {}
        }
        resp.json::<T>()
            .await
            .map(Some)
            .map_err(|e| OriginError::Decode {
                message: e.to_string(),
            })
    }

    async fn program_episodes(
        &self,
        program_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> OriginResult<Vec<Episode>> {
        let url = self.endpoint("api/v2/episodes/index")?;
        let query = [
            ("programid", program_id.to_string()),
            ("fromdate", from.format("%Y-%m-%d").to_string()),
            ("todate", to.format("%Y-%m-%d").to_string()),
            ("format", "json".to_string()),
            ("pagination", "false".to_string()),
        ];
        let body: Option<models::EpisodeListResponse> = self.get_json(url, &query).await?;
        Ok(body
            .map(|body| body.episodes)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|episode| map_episode(episode, Some(program_id)))
            .collect())
    }
}

#[async_trait]
impl Origin for SrOrigin {
    fn id(&self) -> &str {
        "sr"
    }

    /// Fetches each program in turn. A failing program is logged and skipped;
    /// the call fails only when every program fails.
    async fn fetch_episodes(
        &self,
        program_ids: &[i64],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> OriginResult<Vec<Episode>> {
        let mut episodes = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0usize;
        for &program_id in program_ids {
            match self.program_episodes(program_id, from, to).await {
                Ok(mut found) => {
                    succeeded += 1;
                    tracing::debug!(program_id, count = found.len(), "fetched program episodes");
                    episodes.append(&mut found);
                }
                Err(e) => {
                    tracing::warn!(program_id, error = %e, "failed to fetch program episodes");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(episodes),
        }
    }

    async fn fetch_episode(&self, id: &EpisodeId) -> OriginResult<Option<Episode>> {
        let url = self.endpoint("api/v2/episodes/get")?;
        let query = [("id", id.to_string()), ("format", "json".to_string())];
        let body: Option<models::EpisodeResponse> = self.get_json(url, &query).await?;
        Ok(body.and_then(|body| map_episode(body.episode, None)))
    }
}
