//! Flat catalog documents: one collection per entity type.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::field::FieldKind;
use crate::ids::{EpisodeID, MovieID, SeasonID, ShowID};
use crate::server::{ServerId, normalize_video_id};
use crate::sourced::Sourced;
use crate::titles::CatalogTitle;

/// Free-form descriptive payload fetched from a file server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(pub Value);

impl Metadata {
    pub fn new(value: Value) -> Self {
        Metadata(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.get_str("last_updated")
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Copy of this payload with `key` removed from the top-level object.
    pub fn without_key(&self, key: &str) -> Metadata {
        let mut value = self.0.clone();
        if let Value::Object(map) = &mut value {
            map.remove(key);
        }
        Metadata(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caption {
    pub label: String,
    pub url: String,
    pub srclang: Option<String>,
}

/// Video quality descriptors reported by the file server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,
    /// Length in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_quality: Option<Value>,
}

impl VideoInfo {
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_none()
            && self.duration.is_none()
            && self.hdr.is_none()
            && self.media_quality.is_none()
    }
}

/// Partial update produced by a field synchronizer.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Metadata(Sourced<Metadata>),
    VideoUrl(Sourced<String>),
    Poster(Sourced<String>),
    Backdrop(Sourced<String>),
    Logo(Sourced<String>),
    PosterBlurhash(Sourced<String>),
    BackdropBlurhash(Sourced<String>),
    Thumbnail(Sourced<String>),
    ThumbnailBlurhash(Sourced<String>),
    Captions(Sourced<Vec<Caption>>),
    Chapters(Sourced<String>),
    VideoInfo(Sourced<VideoInfo>),
}

impl FieldUpdate {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldUpdate::Metadata(_) => FieldKind::Metadata,
            FieldUpdate::VideoUrl(_) => FieldKind::VideoUrl,
            FieldUpdate::Poster(_) => FieldKind::Poster,
            FieldUpdate::Backdrop(_) => FieldKind::Backdrop,
            FieldUpdate::Logo(_) => FieldKind::Logo,
            FieldUpdate::PosterBlurhash(_) => FieldKind::PosterBlurhash,
            FieldUpdate::BackdropBlurhash(_) => FieldKind::BackdropBlurhash,
            FieldUpdate::Thumbnail(_) => FieldKind::Thumbnail,
            FieldUpdate::ThumbnailBlurhash(_) => FieldKind::ThumbnailBlurhash,
            FieldUpdate::Captions(_) => FieldKind::Captions,
            FieldUpdate::Chapters(_) => FieldKind::Chapters,
            FieldUpdate::VideoInfo(_) => FieldKind::VideoInfo,
        }
    }

    pub fn source(&self) -> &ServerId {
        match self {
            FieldUpdate::Metadata(v) => &v.source,
            FieldUpdate::VideoUrl(v)
            | FieldUpdate::Poster(v)
            | FieldUpdate::Backdrop(v)
            | FieldUpdate::Logo(v)
            | FieldUpdate::PosterBlurhash(v)
            | FieldUpdate::BackdropBlurhash(v)
            | FieldUpdate::Thumbnail(v)
            | FieldUpdate::ThumbnailBlurhash(v)
            | FieldUpdate::Chapters(v) => &v.source,
            FieldUpdate::Captions(v) => &v.source,
            FieldUpdate::VideoInfo(v) => &v.source,
        }
    }
}

/// Field-level view shared by every catalog document.
pub trait CatalogEntity {
    fn locked_fields(&self) -> &BTreeSet<FieldKind>;

    /// Server that supplied the current value of `kind`, if any.
    fn field_source(&self, kind: FieldKind) -> Option<&ServerId>;

    /// Applies `update`; returns false when the entity has no such field.
    fn apply(&mut self, update: &FieldUpdate) -> bool;

    fn has_metadata(&self) -> bool;

    fn is_locked(&self, kind: FieldKind) -> bool {
        self.locked_fields().contains(&kind)
    }
}

fn source_of<T>(field: &Option<Sourced<T>>) -> Option<&ServerId> {
    field.as_ref().map(|sourced| &sourced.source)
}

fn has_metadata(field: &Option<Sourced<Metadata>>) -> bool {
    field.as_ref().is_some_and(|m| !m.value.is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: MovieID,
    pub title: String,
    pub original_title: CatalogTitle,
    pub metadata: Option<Sourced<Metadata>>,
    pub video: Option<Sourced<String>>,
    pub normalized_video_id: Option<String>,
    pub poster: Option<Sourced<String>>,
    pub backdrop: Option<Sourced<String>>,
    pub logo: Option<Sourced<String>>,
    pub poster_blurhash: Option<Sourced<String>>,
    pub backdrop_blurhash: Option<Sourced<String>>,
    pub captions: Option<Sourced<Vec<Caption>>>,
    pub chapters: Option<Sourced<String>>,
    pub video_info: Option<Sourced<VideoInfo>>,
    #[serde(default)]
    pub locked_fields: BTreeSet<FieldKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Movie {
    pub fn new(title: CatalogTitle) -> Self {
        let now = Utc::now();
        Self {
            id: MovieID::new(),
            title: title.as_str().to_string(),
            original_title: title,
            metadata: None,
            video: None,
            normalized_video_id: None,
            poster: None,
            backdrop: None,
            logo: None,
            poster_blurhash: None,
            backdrop_blurhash: None,
            captions: None,
            chapters: None,
            video_info: None,
            locked_fields: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl CatalogEntity for Movie {
    fn locked_fields(&self) -> &BTreeSet<FieldKind> {
        &self.locked_fields
    }

    fn field_source(&self, kind: FieldKind) -> Option<&ServerId> {
        match kind {
            FieldKind::Metadata => source_of(&self.metadata),
            FieldKind::VideoUrl => source_of(&self.video),
            FieldKind::Poster => source_of(&self.poster),
            FieldKind::Backdrop => source_of(&self.backdrop),
            FieldKind::Logo => source_of(&self.logo),
            FieldKind::PosterBlurhash => source_of(&self.poster_blurhash),
            FieldKind::BackdropBlurhash => source_of(&self.backdrop_blurhash),
            FieldKind::Captions => source_of(&self.captions),
            FieldKind::Chapters => source_of(&self.chapters),
            FieldKind::VideoInfo => source_of(&self.video_info),
            FieldKind::Thumbnail | FieldKind::ThumbnailBlurhash => None,
        }
    }

    fn apply(&mut self, update: &FieldUpdate) -> bool {
        match update {
            FieldUpdate::Metadata(v) => {
                if let Some(title) = v.value.get_str("title") {
                    self.title = title.to_string();
                }
                self.metadata = Some(v.clone());
            }
            FieldUpdate::VideoUrl(v) => {
                self.normalized_video_id = Some(normalize_video_id(&v.value));
                self.video = Some(v.clone());
            }
            FieldUpdate::Poster(v) => self.poster = Some(v.clone()),
            FieldUpdate::Backdrop(v) => self.backdrop = Some(v.clone()),
            FieldUpdate::Logo(v) => self.logo = Some(v.clone()),
            FieldUpdate::PosterBlurhash(v) => {
                self.poster_blurhash = Some(v.clone())
            }
            FieldUpdate::BackdropBlurhash(v) => {
                self.backdrop_blurhash = Some(v.clone())
            }
            FieldUpdate::Captions(v) => self.captions = Some(v.clone()),
            FieldUpdate::Chapters(v) => self.chapters = Some(v.clone()),
            FieldUpdate::VideoInfo(v) => self.video_info = Some(v.clone()),
            FieldUpdate::Thumbnail(_) | FieldUpdate::ThumbnailBlurhash(_) => {
                return false;
            }
        }
        self.updated_at = Utc::now();
        true
    }

    fn has_metadata(&self) -> bool {
        has_metadata(&self.metadata)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TvShow {
    pub id: ShowID,
    pub title: String,
    pub original_title: CatalogTitle,
    pub metadata: Option<Sourced<Metadata>>,
    pub poster: Option<Sourced<String>>,
    pub backdrop: Option<Sourced<String>>,
    pub logo: Option<Sourced<String>>,
    pub poster_blurhash: Option<Sourced<String>>,
    pub backdrop_blurhash: Option<Sourced<String>>,
    pub number_of_seasons: Option<u32>,
    pub status: Option<String>,
    pub first_air_date: Option<NaiveDate>,
    pub last_air_date: Option<NaiveDate>,
    #[serde(default)]
    pub locked_fields: BTreeSet<FieldKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TvShow {
    pub fn new(title: CatalogTitle) -> Self {
        let now = Utc::now();
        Self {
            id: ShowID::new(),
            title: title.as_str().to_string(),
            original_title: title,
            metadata: None,
            poster: None,
            backdrop: None,
            logo: None,
            poster_blurhash: None,
            backdrop_blurhash: None,
            number_of_seasons: None,
            status: None,
            first_air_date: None,
            last_air_date: None,
            locked_fields: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn derive_from_metadata(&mut self, metadata: &Metadata) {
        let value = metadata.as_value();
        if let Some(name) = metadata.get_str("name") {
            self.title = name.to_string();
        }
        self.number_of_seasons = value
            .get("number_of_seasons")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok());
        self.status = metadata.get_str("status").map(str::to_string);
        let date = |key: &str| {
            metadata
                .get_str(key)
                .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        };
        self.first_air_date = date("first_air_date");
        self.last_air_date = date("last_air_date");
    }
}

impl CatalogEntity for TvShow {
    fn locked_fields(&self) -> &BTreeSet<FieldKind> {
        &self.locked_fields
    }

    fn field_source(&self, kind: FieldKind) -> Option<&ServerId> {
        match kind {
            FieldKind::Metadata => source_of(&self.metadata),
            FieldKind::Poster => source_of(&self.poster),
            FieldKind::Backdrop => source_of(&self.backdrop),
            FieldKind::Logo => source_of(&self.logo),
            FieldKind::PosterBlurhash => source_of(&self.poster_blurhash),
            FieldKind::BackdropBlurhash => source_of(&self.backdrop_blurhash),
            _ => None,
        }
    }

    fn apply(&mut self, update: &FieldUpdate) -> bool {
        match update {
            FieldUpdate::Metadata(v) => {
                self.derive_from_metadata(&v.value);
                self.metadata = Some(v.clone());
            }
            FieldUpdate::Poster(v) => self.poster = Some(v.clone()),
            FieldUpdate::Backdrop(v) => self.backdrop = Some(v.clone()),
            FieldUpdate::Logo(v) => self.logo = Some(v.clone()),
            FieldUpdate::PosterBlurhash(v) => {
                self.poster_blurhash = Some(v.clone())
            }
            FieldUpdate::BackdropBlurhash(v) => {
                self.backdrop_blurhash = Some(v.clone())
            }
            _ => return false,
        }
        self.updated_at = Utc::now();
        true
    }

    fn has_metadata(&self) -> bool {
        has_metadata(&self.metadata)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub id: SeasonID,
    pub show_id: ShowID,
    pub show_title: CatalogTitle,
    pub season_number: u32,
    pub metadata: Option<Sourced<Metadata>>,
    pub poster: Option<Sourced<String>>,
    pub poster_blurhash: Option<Sourced<String>>,
    #[serde(default)]
    pub locked_fields: BTreeSet<FieldKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Season {
    pub fn new(show: &TvShow, season_number: u32) -> Self {
        let now = Utc::now();
        Self {
            id: SeasonID::new(),
            show_id: show.id,
            show_title: show.original_title.clone(),
            season_number,
            metadata: None,
            poster: None,
            poster_blurhash: None,
            locked_fields: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl CatalogEntity for Season {
    fn locked_fields(&self) -> &BTreeSet<FieldKind> {
        &self.locked_fields
    }

    fn field_source(&self, kind: FieldKind) -> Option<&ServerId> {
        match kind {
            FieldKind::Metadata => source_of(&self.metadata),
            FieldKind::Poster => source_of(&self.poster),
            FieldKind::PosterBlurhash => source_of(&self.poster_blurhash),
            _ => None,
        }
    }

    fn apply(&mut self, update: &FieldUpdate) -> bool {
        match update {
            FieldUpdate::Metadata(v) => {
                let trimmed = v.value.without_key("episodes");
                self.metadata = Some(Sourced::new(trimmed, v.source.clone()));
            }
            FieldUpdate::Poster(v) => self.poster = Some(v.clone()),
            FieldUpdate::PosterBlurhash(v) => {
                self.poster_blurhash = Some(v.clone())
            }
            _ => return false,
        }
        self.updated_at = Utc::now();
        true
    }

    fn has_metadata(&self) -> bool {
        has_metadata(&self.metadata)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: EpisodeID,
    pub show_id: ShowID,
    pub season_id: SeasonID,
    pub show_title: CatalogTitle,
    pub season_number: u32,
    pub episode_number: u32,
    pub metadata: Option<Sourced<Metadata>>,
    pub video: Option<Sourced<String>>,
    pub normalized_video_id: Option<String>,
    pub thumbnail: Option<Sourced<String>>,
    pub thumbnail_blurhash: Option<Sourced<String>>,
    pub captions: Option<Sourced<Vec<Caption>>>,
    pub chapters: Option<Sourced<String>>,
    pub video_info: Option<Sourced<VideoInfo>>,
    #[serde(default)]
    pub locked_fields: BTreeSet<FieldKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Episode {
    pub fn new(season: &Season, episode_number: u32) -> Self {
        let now = Utc::now();
        Self {
            id: EpisodeID::new(),
            show_id: season.show_id,
            season_id: season.id,
            show_title: season.show_title.clone(),
            season_number: season.season_number,
            episode_number,
            metadata: None,
            video: None,
            normalized_video_id: None,
            thumbnail: None,
            thumbnail_blurhash: None,
            captions: None,
            chapters: None,
            video_info: None,
            locked_fields: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_video(&self) -> bool {
        self.video.as_ref().is_some_and(|v| !v.value.is_empty())
    }
}

impl CatalogEntity for Episode {
    fn locked_fields(&self) -> &BTreeSet<FieldKind> {
        &self.locked_fields
    }

    fn field_source(&self, kind: FieldKind) -> Option<&ServerId> {
        match kind {
            FieldKind::Metadata => source_of(&self.metadata),
            FieldKind::VideoUrl => source_of(&self.video),
            FieldKind::Thumbnail => source_of(&self.thumbnail),
            FieldKind::ThumbnailBlurhash => source_of(&self.thumbnail_blurhash),
            FieldKind::Captions => source_of(&self.captions),
            FieldKind::Chapters => source_of(&self.chapters),
            FieldKind::VideoInfo => source_of(&self.video_info),
            _ => None,
        }
    }

    fn apply(&mut self, update: &FieldUpdate) -> bool {
        match update {
            FieldUpdate::Metadata(v) => self.metadata = Some(v.clone()),
            FieldUpdate::VideoUrl(v) => {
                self.normalized_video_id = Some(normalize_video_id(&v.value));
                self.video = Some(v.clone());
            }
            FieldUpdate::Thumbnail(v) => self.thumbnail = Some(v.clone()),
            FieldUpdate::ThumbnailBlurhash(v) => {
                self.thumbnail_blurhash = Some(v.clone())
            }
            FieldUpdate::Captions(v) => self.captions = Some(v.clone()),
            FieldUpdate::Chapters(v) => self.chapters = Some(v.clone()),
            FieldUpdate::VideoInfo(v) => self.video_info = Some(v.clone()),
            _ => return false,
        }
        self.updated_at = Utc::now();
        true
    }

    fn has_metadata(&self) -> bool {
        has_metadata(&self.metadata)
    }
}
