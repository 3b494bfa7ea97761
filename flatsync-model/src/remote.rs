//! Raw data trees exposed by file servers.
//!
//! URL-ish fields are server-relative paths; metadata and blurhash fields are
//! references that need a secondary fetch to resolve.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::media::VideoInfo;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteServerData {
    #[serde(default)]
    pub movies: BTreeMap<String, RemoteMovie>,
    #[serde(default)]
    pub tv: BTreeMap<String, RemoteShow>,
}

impl RemoteServerData {
    pub fn is_empty(&self) -> bool {
        self.movies.is_empty() && self.tv.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCaption {
    pub url: String,
    #[serde(default)]
    pub srclang: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMovieUrls {
    #[serde(default)]
    pub mp4: Option<String>,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub backdrop: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub poster_blurhash: Option<String>,
    #[serde(default)]
    pub backdrop_blurhash: Option<String>,
    #[serde(default)]
    pub chapters: Option<String>,
    #[serde(default)]
    pub subtitles: BTreeMap<String, RemoteCaption>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMovie {
    #[serde(default)]
    pub urls: RemoteMovieUrls,
    #[serde(default)]
    pub video_info: Option<VideoInfo>,
}

impl RemoteMovie {
    pub fn has_video(&self) -> bool {
        self.urls.mp4.as_deref().is_some_and(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteShow {
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub backdrop: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub poster_blurhash: Option<String>,
    #[serde(default)]
    pub backdrop_blurhash: Option<String>,
    /// Keyed by display name, e.g. `"Season 1"`.
    #[serde(default)]
    pub seasons: BTreeMap<String, RemoteSeason>,
}

impl RemoteShow {
    pub fn has_playable_episode(&self) -> bool {
        self.seasons.values().any(RemoteSeason::has_playable_episode)
    }

    pub fn season(&self, season_number: u32) -> Option<&RemoteSeason> {
        self.seasons
            .values()
            .find(|season| season.season_number == season_number)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSeason {
    pub season_number: u32,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub season_poster: Option<String>,
    #[serde(default)]
    pub season_poster_blurhash: Option<String>,
    /// Keyed by episode code, e.g. `"S01E05"`.
    #[serde(default)]
    pub episodes: BTreeMap<String, RemoteEpisode>,
}

impl RemoteSeason {
    pub fn has_playable_episode(&self) -> bool {
        self.episodes.values().any(RemoteEpisode::has_video)
    }

    pub fn episode(&self, episode_number: u32) -> Option<&RemoteEpisode> {
        self.episodes
            .values()
            .find(|episode| episode.episode_number == episode_number)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEpisode {
    pub episode_number: u32,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub thumbnail_blurhash: Option<String>,
    #[serde(default)]
    pub chapters: Option<String>,
    #[serde(default)]
    pub subtitles: BTreeMap<String, RemoteCaption>,
    #[serde(default)]
    pub video_info: Option<VideoInfo>,
}

impl RemoteEpisode {
    pub fn has_video(&self) -> bool {
        self.video_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

/// Server-declared content hashes; covers metadata payloads only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashManifest {
    #[serde(default)]
    pub movies: BTreeMap<String, String>,
    #[serde(default)]
    pub tv: BTreeMap<String, ShowHashes>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowHashes {
    pub hash: String,
    #[serde(default)]
    pub seasons: BTreeMap<u32, SeasonHashes>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonHashes {
    pub hash: String,
    #[serde(default)]
    pub episodes: BTreeMap<u32, String>,
}
