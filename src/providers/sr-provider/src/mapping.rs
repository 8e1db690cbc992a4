use crate::models::SrEpisode;
use airwaves_core::{Episode, EpisodeId, ProgramId};
use chrono::{DateTime, TimeZone, Utc};

/// Parse the `/Date(1700000000000)/` timestamps the API emits.
pub fn parse_sr_date(raw: &str) -> Option<DateTime<Utc>> {
    let inner = raw.trim().strip_prefix("/Date(")?.strip_suffix(")/")?;
    // Some payloads carry an offset suffix like `+0100`; the millis are UTC regardless.
    let millis_end = inner
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '+' || *c == '-')
        .map(|(i, _)| i)
        .unwrap_or(inner.len());
    let millis: i64 = inner[..millis_end].parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Map an API episode; `fallback_program` is used when the payload omits its program.
pub fn map_episode(episode: SrEpisode, fallback_program: Option<i64>) -> Option<Episode> {
    let program = episode
        .program
        .as_ref()
        .map(|p| p.id)
        .or(fallback_program)?;
    let published_at = episode
        .publishdateutc
        .as_deref()
        .and_then(parse_sr_date)?;

    let (audio_url, duration_seconds) = if let Some(file) = episode.downloadpodfile {
        (Some(file.url), file.duration)
    } else if let Some(file) = episode.listenpodfile {
        (Some(file.url), file.duration)
    } else if let Some(file) = episode
        .broadcast
        .and_then(|b| b.broadcastfiles.into_iter().next())
    {
        (Some(file.url), file.duration)
    } else {
        (None, None)
    };

    Some(Episode {
        id: EpisodeId::new(episode.id.to_string()),
        program_id: ProgramId::from(program),
        title: episode.title,
        description: episode.description.filter(|d| !d.trim().is_empty()),
        audio_url,
        published_at,
        duration_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Broadcast, BroadcastFile, PodFile};

    fn bare(id: i64) -> SrEpisode {
        SrEpisode {
            id,
            title: "Avsnitt".into(),
            description: Some(" ".into()),
            program: None,
            publishdateutc: Some("/Date(1760000000000)/".into()),
            listenpodfile: None,
            downloadpodfile: None,
            broadcast: None,
        }
    }

    #[test]
    fn parses_date_forms() {
        let expected = Utc.timestamp_millis_opt(1_760_000_000_000).unwrap();
        assert_eq!(parse_sr_date("/Date(1760000000000)/"), Some(expected));
        assert_eq!(parse_sr_date("/Date(1760000000000+0200)/"), Some(expected));
        assert_eq!(parse_sr_date("2026-01-01"), None);
        assert_eq!(parse_sr_date("/Date(abc)/"), None);
    }

    #[test]
    fn prefers_download_file_then_listen_then_broadcast() {
        let mut episode = bare(1);
        episode.broadcast = Some(Broadcast {
            broadcastfiles: vec![BroadcastFile {
                url: "https://cdn/broadcast.m4a".into(),
                duration: Some(3600),
            }],
        });
        episode.listenpodfile = Some(PodFile {
            url: "https://cdn/listen.mp3".into(),
            duration: Some(1700),
        });
        let mapped = map_episode(episode, Some(9)).unwrap();
        assert_eq!(mapped.audio_url.as_deref(), Some("https://cdn/listen.mp3"));
        assert_eq!(mapped.duration_seconds, Some(1700));
        assert_eq!(mapped.program_id, ProgramId::from(9));
        assert_eq!(mapped.description, None);
    }

    #[test]
    fn broadcast_file_is_last_resort() {
        let mut episode = bare(2);
        episode.broadcast = Some(Broadcast {
            broadcastfiles: vec![BroadcastFile {
                url: "https://cdn/broadcast.m4a".into(),
                duration: None,
            }],
        });
        let mapped = map_episode(episode, Some(9)).unwrap();
        assert_eq!(
            mapped.audio_url.as_deref(),
            Some("https://cdn/broadcast.m4a")
        );
    }

    #[test]
    fn episode_without_program_or_date_is_dropped() {
        assert!(map_episode(bare(3), None).is_none());
        let mut undated = bare(4);
        undated.publishdateutc = None;
        assert!(map_episode(undated, Some(1)).is_none());
    }
}
