use airwaves_core::{EpisodeId, Origin, OriginError, ProgramId};
use chrono::{TimeZone, Utc};
use serde_json::json;
use sr_provider::{SrConfig, SrOrigin};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn origin(server: &MockServer) -> SrOrigin {
    SrOrigin::new(SrConfig {
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn listing(program: i64, ids: &[i64]) -> serde_json::Value {
    let episodes: Vec<_> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "title": format!("Episode {id}"),
                "description": "Om vetenskap",
                "program": {"id": program, "name": "Vetenskapsradion"},
                "publishdateutc": "/Date(1760000000000)/",
                "downloadpodfile": {"url": format!("https://cdn.example/{id}.mp3"), "duration": 1500}
            })
        })
        .collect();
    json!({"copyright": "Sveriges Radio", "episodes": episodes})
}

#[tokio::test]
async fn fetches_and_maps_program_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/episodes/index"))
        .and(query_param("programid", "4914"))
        .and(query_param("fromdate", "2026-10-05"))
        .and(query_param("todate", "2026-10-19"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(4914, &[1, 2])))
        .expect(1)
        .mount(&server)
        .await;

    let from = Utc.with_ymd_and_hms(2026, 10, 5, 8, 0, 0).unwrap();
    let to = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
    let episodes = origin(&server)
        .fetch_episodes(&[4914], from, to)
        .await
        .unwrap();

    assert_eq!(episodes.len(), 2);
    assert_eq!(episodes[0].id, EpisodeId::new("1"));
    assert_eq!(episodes[0].program_id, ProgramId::from(4914));
    assert_eq!(
        episodes[0].audio_url.as_deref(),
        Some("https://cdn.example/1.mp3")
    );
    assert_eq!(episodes[0].duration_seconds, Some(1500));
}

#[tokio::test]
async fn one_failing_program_does_not_sink_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/episodes/index"))
        .and(query_param("programid", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(1, &[10])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/episodes/index"))
        .and(query_param("programid", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let now = Utc::now();
    let episodes = origin(&server)
        .fetch_episodes(&[1, 2], now - chrono::Duration::days(14), now)
        .await
        .unwrap();
    assert_eq!(episodes.len(), 1);
}

#[tokio::test]
async fn all_programs_failing_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let now = Utc::now();
    let err = origin(&server)
        .fetch_episodes(&[1], now - chrono::Duration::days(1), now)
        .await
        .unwrap_err();
    assert!(matches!(err, OriginError::Status { status: 503, .. }));
}

#[tokio::test]
async fn single_episode_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/episodes/get"))
        .and(query_param("id", "55"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "episode": {
                "id": 55,
                "title": "Enstaka",
                "program": {"id": 7},
                "publishdateutc": "/Date(1760000000000)/",
                "listenpodfile": {"url": "https://cdn.example/55.mp3"}
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/episodes/get"))
        .and(query_param("id", "56"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let origin = origin(&server);
    let found = origin
        .fetch_episode(&EpisodeId::new("55"))
        .await
        .unwrap()
        .expect("episode 55");
    assert_eq!(found.program_id, ProgramId::from(7));
    assert_eq!(
        found.audio_url.as_deref(),
        Some("https://cdn.example/55.mp3")
    );

    assert!(origin
        .fetch_episode(&EpisodeId::new("56"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = origin(&server)
        .fetch_episode(&EpisodeId::new("1"))
        .await
        .unwrap_err();
    assert!(matches!(err, OriginError::Decode { .. }));
}
