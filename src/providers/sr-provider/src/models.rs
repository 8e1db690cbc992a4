use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct EpisodeListResponse {
    #[serde(default)]
    pub episodes: Vec<SrEpisode>,
}

#[derive(Debug, Deserialize)]
pub struct EpisodeResponse {
    pub episode: SrEpisode,
}

#[derive(Debug, Deserialize)]
pub struct SrEpisode {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub program: Option<ProgramRef>,
    /// `/Date(<millis>)/`
    #[serde(default)]
    pub publishdateutc: Option<String>,
    #[serde(default)]
    pub listenpodfile: Option<PodFile>,
    #[serde(default)]
    pub downloadpodfile: Option<PodFile>,
    #[serde(default)]
    pub broadcast: Option<Broadcast>,
}

#[derive(Debug, Deserialize)]
pub struct ProgramRef {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PodFile {
    pub url: String,
    /// Seconds.
    #[serde(default)]
    pub duration: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct Broadcast {
    #[serde(default)]
    pub broadcastfiles: Vec<BroadcastFile>,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastFile {
    pub url: String,
    #[serde(default)]
    pub duration: Option<u32>,
}
