//! Typed field paths used as arbitration keys.
//!
//! The string form (`"seasons.Season 3.episodes.S03E02.urls.chapters"`) is what
//! field-availability producers exchange; it is rendered and parsed only here
//! so a producer and a synchronizer can never disagree on the format.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ModelError;

/// Field groups a synchronizer can write.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Metadata,
    VideoUrl,
    Poster,
    Backdrop,
    Logo,
    PosterBlurhash,
    BackdropBlurhash,
    Thumbnail,
    ThumbnailBlurhash,
    Captions,
    Chapters,
    VideoInfo,
}

impl FieldKind {
    pub const ALL: [FieldKind; 12] = [
        FieldKind::Metadata,
        FieldKind::VideoUrl,
        FieldKind::Poster,
        FieldKind::Backdrop,
        FieldKind::Logo,
        FieldKind::PosterBlurhash,
        FieldKind::BackdropBlurhash,
        FieldKind::Thumbnail,
        FieldKind::ThumbnailBlurhash,
        FieldKind::Captions,
        FieldKind::Chapters,
        FieldKind::VideoInfo,
    ];

    /// Leaf segment of the path string.
    pub fn leaf(&self) -> &'static str {
        match self {
            FieldKind::Metadata => "metadata",
            FieldKind::VideoUrl => "urls.mp4",
            FieldKind::Poster => "urls.poster",
            FieldKind::Backdrop => "urls.backdrop",
            FieldKind::Logo => "urls.logo",
            FieldKind::PosterBlurhash => "urls.posterBlurhash",
            FieldKind::BackdropBlurhash => "urls.backdropBlurhash",
            FieldKind::Thumbnail => "urls.thumbnail",
            FieldKind::ThumbnailBlurhash => "urls.thumbnailBlurhash",
            FieldKind::Captions => "urls.subtitles",
            FieldKind::Chapters => "urls.chapters",
            FieldKind::VideoInfo => "videoInfo",
        }
    }

    fn from_leaf(leaf: &str) -> Option<FieldKind> {
        FieldKind::ALL.into_iter().find(|kind| kind.leaf() == leaf)
    }

    /// Hash manifests cover metadata payloads only.
    pub fn is_metadata(&self) -> bool {
        matches!(self, FieldKind::Metadata)
    }
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.leaf())
    }
}

/// Where inside a title a field lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldScope {
    /// The movie or show document itself.
    Title,
    Season { season: u32 },
    Episode { season: u32, episode: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath {
    pub scope: FieldScope,
    pub kind: FieldKind,
}

impl FieldPath {
    pub fn title(kind: FieldKind) -> Self {
        Self {
            scope: FieldScope::Title,
            kind,
        }
    }

    pub fn season(season: u32, kind: FieldKind) -> Self {
        Self {
            scope: FieldScope::Season { season },
            kind,
        }
    }

    pub fn episode(season: u32, episode: u32, kind: FieldKind) -> Self {
        Self {
            scope: FieldScope::Episode { season, episode },
            kind,
        }
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.scope {
            FieldScope::Title => write!(f, "{}", self.kind.leaf()),
            FieldScope::Season { season } => {
                write!(f, "seasons.Season {season}.{}", self.kind.leaf())
            }
            FieldScope::Episode { season, episode } => write!(
                f,
                "seasons.Season {season}.episodes.S{season:02}E{episode:02}.{}",
                self.kind.leaf()
            ),
        }
    }
}

impl FromStr for FieldPath {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::InvalidFieldPath(raw.to_string());

        let Some(rest) = raw.strip_prefix("seasons.Season ") else {
            let kind = FieldKind::from_leaf(raw).ok_or_else(invalid)?;
            return Ok(FieldPath::title(kind));
        };

        let (season, rest) = rest.split_once('.').ok_or_else(invalid)?;
        let season: u32 = season.parse().map_err(|_| invalid())?;

        let Some(rest) = rest.strip_prefix("episodes.") else {
            let kind = FieldKind::from_leaf(rest).ok_or_else(invalid)?;
            return Ok(FieldPath::season(season, kind));
        };

        let (code, leaf) = rest.split_once('.').ok_or_else(invalid)?;
        let (code_season, episode) = parse_episode_code(code).ok_or_else(invalid)?;
        if code_season != season {
            return Err(invalid());
        }
        let kind = FieldKind::from_leaf(leaf).ok_or_else(invalid)?;
        Ok(FieldPath::episode(season, episode, kind))
    }
}

/// Parses `S03E02` into `(3, 2)`.
pub fn parse_episode_code(code: &str) -> Option<(u32, u32)> {
    let rest = code.strip_prefix('S').or_else(|| code.strip_prefix('s'))?;
    let split = rest.find(['E', 'e'])?;
    let season = rest[..split].parse().ok()?;
    let episode = rest[split + 1..].parse().ok()?;
    Some((season, episode))
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
