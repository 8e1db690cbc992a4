use crate::error::ApiError;
use crate::range::serve_file;
use crate::state::AppState;
use airwaves_core::{EpisodeId, ProgramId, RefreshSummary};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

/// Upper bound on program ids accepted by one refresh request.
pub const MAX_REFRESH_PROGRAMS: usize = 50;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/audio", get(audio))
        .route("/api/episodes/refresh", post(refresh))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct AudioQuery {
    id: Option<String>,
    #[serde(rename = "episodeId")]
    episode_id: Option<String>,
}

async fn audio(
    State(state): State<AppState>,
    Query(query): Query<AudioQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = query
        .id
        .or(query.episode_id)
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(EpisodeId::new)
        .ok_or_else(|| ApiError::BadRequest("missing episode id".into()))?;

    let url = resolve_audio_url(&state, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no audio for episode {id}")))?;

    let path = match state.cache.ensure_cached(&id, &url).await {
        Ok(outcome) => {
            tracing::debug!(episode_id = %id, ?outcome, "audio ready");
            state.cache.path_for(&id)
        }
        Err(e) => match state.cache.cached_file(&id).await {
            Some(stale) => {
                tracing::warn!(episode_id = %id, error = %e, "refresh failed; serving stale copy");
                stale
            }
            None => return Err(ApiError::Upstream(e.to_string())),
        },
    };

    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());
    Ok(serve_file(&path, range).await?)
}

/// Look the episode up in the catalog, falling back to the origin and
/// recording what it returns.
async fn resolve_audio_url(state: &AppState, id: &EpisodeId) -> Result<Option<String>, ApiError> {
    if let Some(episode) = state.store.get_episode(id).await? {
        if episode.has_audio() {
            return Ok(episode.audio_url);
        }
    }

    let Some(episode) = state.origin.fetch_episode(id).await? else {
        return Ok(None);
    };
    let url = episode.audio_url.clone().filter(|_| episode.has_audio());
    state.store.upsert_episode(episode).await?;
    tracing::debug!(episode_id = %id, "stored episode fetched on demand");
    Ok(url)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    program_ids: Vec<Value>,
}

async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshSummary>, ApiError> {
    let requested = normalize_program_ids(&request.program_ids);
    if requested.is_empty() {
        return Err(ApiError::BadRequest("programIds must not be empty".into()));
    }

    let programs = state.store.existing_programs(&requested).await?;
    if programs.is_empty() {
        return Err(ApiError::NotFound("no matching programs".into()));
    }

    let summary = state
        .refresher
        .refresh_programs(&programs, state.refresher.defaults())
        .await?;
    Ok(Json(summary))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "downloadsInFlight": state.cache.in_flight(),
    }))
}

/// Accept strings or numbers; trim, drop blanks, dedupe keeping first
/// occurrence, cap at [`MAX_REFRESH_PROGRAMS`].
pub fn normalize_program_ids(raw: &[Value]) -> Vec<ProgramId> {
    let mut ids: Vec<ProgramId> = Vec::new();
    for value in raw {
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        if text.is_empty() {
            continue;
        }
        let id = ProgramId::new(text);
        if !ids.contains(&id) {
            ids.push(id);
        }
        if ids.len() == MAX_REFRESH_PROGRAMS {
            break;
        }
    }
    ids
}
