use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin-assigned episode identifier.
///
/// Treated as an opaque, case-sensitive key. Upstream ids are numeric in
/// practice but nothing here relies on that.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeId(pub String);

impl EpisodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EpisodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EpisodeId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for EpisodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Program (show) identifier as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramId(pub String);

impl ProgramId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The origin addresses programs numerically; anything else is not fetchable.
    pub fn as_numeric(&self) -> Option<i64> {
        self.0.trim().parse().ok()
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProgramId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<i64> for ProgramId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

/// Episode metadata as persisted by the catalog store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: EpisodeId,
    pub program_id: ProgramId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Remote audio object; `None` when the origin has not published one yet.
    #[serde(default)]
    pub audio_url: Option<String>,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

impl Episode {
    pub fn has_audio(&self) -> bool {
        self.audio_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub name: String,
}

/// Counts reported by a batch refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSummary {
    /// Episodes whose audio is now present and fresh in the cache.
    pub cached: usize,
    /// Episode metadata records upserted from the origin.
    pub synced: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_program_ids() {
        assert_eq!(ProgramId::from("4914").as_numeric(), Some(4914));
        assert_eq!(ProgramId::from(" 12 ").as_numeric(), Some(12));
        assert_eq!(ProgramId::from("p3-dokumentar").as_numeric(), None);
    }

    #[test]
    fn blank_audio_url_is_not_audio() {
        let episode = Episode {
            id: EpisodeId::new("1"),
            program_id: ProgramId::from(2),
            title: "Ep".into(),
            description: None,
            audio_url: Some("  ".into()),
            published_at: Utc::now(),
            duration_seconds: None,
        };
        assert!(!episode.has_audio());
    }

    #[test]
    fn summary_serializes_flat() {
        let json = serde_json::to_value(RefreshSummary {
            cached: 3,
            synced: 5,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"cached": 3, "synced": 5}));
    }
}
