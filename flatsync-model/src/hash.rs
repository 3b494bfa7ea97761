use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media_type::MediaType;
use crate::server::ServerId;

/// Level-addressed key of a stored content hash. `None` components describe
/// coarser levels: `(Tv, None, ..)` is the whole TV tree, `(Tv, Some(title),
/// None, None)` a show, `(Tv, Some(title), Some(n), None)` one season.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct HashKey {
    pub media_type: MediaType,
    pub title: Option<String>,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
}

impl HashKey {
    pub fn media(media_type: MediaType) -> Self {
        Self {
            media_type,
            title: None,
            season_number: None,
            episode_number: None,
        }
    }

    pub fn movie(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::media(MediaType::Movie)
        }
    }

    pub fn show(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::media(MediaType::Tv)
        }
    }

    pub fn season(title: impl Into<String>, season_number: u32) -> Self {
        Self {
            season_number: Some(season_number),
            ..Self::show(title)
        }
    }

    pub fn episode(
        title: impl Into<String>,
        season_number: u32,
        episode_number: u32,
    ) -> Self {
        Self {
            episode_number: Some(episode_number),
            ..Self::season(title, season_number)
        }
    }
}

/// One stored hash row; never merged across servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentHash {
    pub key: HashKey,
    pub server_id: ServerId,
    pub hash: String,
    pub updated_at: DateTime<Utc>,
}
