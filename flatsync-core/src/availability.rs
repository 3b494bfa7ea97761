//! Field-level priority arbitration.
//!
//! A server may write a field when it is the top-ranked supplier for that
//! field, or when no higher-ranked server has put a value in the catalog yet.

use flatsync_model::{
    FieldAvailability, FieldKind, FieldPath, MediaType, RemoteMovie,
    RemoteServerData, RemoteShow, ServerConfig, ServerId,
};
use serde::Serialize;

/// Outcome of a write-permission check for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Arbitration {
    /// The server is the top-ranked supplier (or nothing is ranked).
    Authoritative,
    /// Allowed because no higher-ranked server's value is in the catalog.
    GapFill,
    Denied,
}

impl Arbitration {
    pub fn allows_write(self) -> bool {
        !matches!(self, Arbitration::Denied)
    }

    pub fn is_authoritative(self) -> bool {
        matches!(self, Arbitration::Authoritative)
    }
}

/// Read-only view over a [`FieldAvailability`] snapshot.
#[derive(Debug, Clone, Copy)]
pub struct FieldAvailabilityIndex<'a> {
    availability: &'a FieldAvailability,
}

impl<'a> FieldAvailabilityIndex<'a> {
    pub fn new(availability: &'a FieldAvailability) -> Self {
        Self { availability }
    }

    pub fn ranking(
        &self,
        media_type: MediaType,
        title: &str,
        path: &FieldPath,
    ) -> Option<&'a [ServerId]> {
        self.availability.ranking(media_type, title, path)
    }

    /// True when `server` heads the ranking, or the ranking is empty/missing.
    pub fn is_highest_priority(
        &self,
        media_type: MediaType,
        title: &str,
        path: &FieldPath,
        server: &ServerId,
    ) -> bool {
        match self.ranking(media_type, title, path) {
            None | Some([]) => true,
            Some([first, ..]) => first == server,
        }
    }

    /// Decides whether `server` may write `path` given the server currently
    /// credited with the stored value.
    pub fn arbitrate(
        &self,
        media_type: MediaType,
        title: &str,
        path: &FieldPath,
        server: &ServerId,
        current_source: Option<&ServerId>,
    ) -> Arbitration {
        let ranking = match self.ranking(media_type, title, path) {
            None | Some([]) => return Arbitration::Authoritative,
            Some(ranking) => ranking,
        };
        if ranking[0] == *server {
            return Arbitration::Authoritative;
        }

        let rank = |id: &ServerId| {
            ranking.iter().position(|s| s == id).unwrap_or(usize::MAX)
        };
        match current_source {
            None => Arbitration::GapFill,
            Some(source) if rank(source) >= rank(server) => {
                Arbitration::GapFill
            }
            Some(_) => Arbitration::Denied,
        }
    }
}

/// Builds a [`FieldAvailability`] from the servers' own data trees, ranking
/// suppliers by ascending priority number (ties broken by server id).
#[derive(Debug, Default)]
pub struct FieldAvailabilityBuilder {
    entries: Vec<(MediaType, String, FieldPath, u32, ServerId)>,
}

impl FieldAvailabilityBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_server(
        mut self,
        server: &ServerConfig,
        data: &RemoteServerData,
    ) -> Self {
        for (title, movie) in &data.movies {
            for kind in movie_fields(movie) {
                self.push(MediaType::Movie, title, FieldPath::title(kind), server);
            }
        }
        for (title, show) in &data.tv {
            for path in show_fields(show) {
                self.push(MediaType::Tv, title, path, server);
            }
        }
        self
    }

    fn push(
        &mut self,
        media_type: MediaType,
        title: &str,
        path: FieldPath,
        server: &ServerConfig,
    ) {
        self.entries.push((
            media_type,
            title.to_string(),
            path,
            server.priority,
            server.id.clone(),
        ));
    }

    pub fn build(mut self) -> FieldAvailability {
        self.entries.sort_by(|a, b| {
            (a.3, a.4.as_str()).cmp(&(b.3, b.4.as_str()))
        });
        let mut availability = FieldAvailability::new();
        for (media_type, title, path, _, server) in self.entries {
            let mut ranking = availability
                .ranking(media_type, &title, &path)
                .map(<[ServerId]>::to_vec)
                .unwrap_or_default();
            if !ranking.contains(&server) {
                ranking.push(server);
            }
            availability.set_ranking(media_type, title, path, ranking);
        }
        availability
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

pub(crate) fn movie_fields(movie: &RemoteMovie) -> Vec<FieldKind> {
    let urls = &movie.urls;
    let mut kinds = Vec::new();
    let pairs = [
        (FieldKind::VideoUrl, &urls.mp4),
        (FieldKind::Metadata, &urls.metadata),
        (FieldKind::Poster, &urls.poster),
        (FieldKind::Backdrop, &urls.backdrop),
        (FieldKind::Logo, &urls.logo),
        (FieldKind::PosterBlurhash, &urls.poster_blurhash),
        (FieldKind::BackdropBlurhash, &urls.backdrop_blurhash),
        (FieldKind::Chapters, &urls.chapters),
    ];
    for (kind, value) in pairs {
        if present(value) {
            kinds.push(kind);
        }
    }
    if !urls.subtitles.is_empty() {
        kinds.push(FieldKind::Captions);
    }
    if movie.video_info.is_some() {
        kinds.push(FieldKind::VideoInfo);
    }
    kinds
}

pub(crate) fn show_fields(show: &RemoteShow) -> Vec<FieldPath> {
    let mut paths = Vec::new();
    let pairs = [
        (FieldKind::Metadata, &show.metadata),
        (FieldKind::Poster, &show.poster),
        (FieldKind::Backdrop, &show.backdrop),
        (FieldKind::Logo, &show.logo),
        (FieldKind::PosterBlurhash, &show.poster_blurhash),
        (FieldKind::BackdropBlurhash, &show.backdrop_blurhash),
    ];
    for (kind, value) in pairs {
        if present(value) {
            paths.push(FieldPath::title(kind));
        }
    }

    for season in show.seasons.values() {
        let n = season.season_number;
        // Season metadata can be carved out of the show payload.
        if present(&season.metadata) || present(&show.metadata) {
            paths.push(FieldPath::season(n, FieldKind::Metadata));
        }
        if present(&season.season_poster) {
            paths.push(FieldPath::season(n, FieldKind::Poster));
        }
        if present(&season.season_poster_blurhash) {
            paths.push(FieldPath::season(n, FieldKind::PosterBlurhash));
        }

        for episode in season.episodes.values() {
            let e = episode.episode_number;
            let pairs = [
                (FieldKind::VideoUrl, &episode.video_url),
                (FieldKind::Metadata, &episode.metadata),
                (FieldKind::Thumbnail, &episode.thumbnail),
                (FieldKind::ThumbnailBlurhash, &episode.thumbnail_blurhash),
                (FieldKind::Chapters, &episode.chapters),
            ];
            for (kind, value) in pairs {
                if present(value) {
                    paths.push(FieldPath::episode(n, e, kind));
                }
            }
            if !episode.subtitles.is_empty() {
                paths.push(FieldPath::episode(n, e, FieldKind::Captions));
            }
            if episode.video_info.is_some() {
                paths.push(FieldPath::episode(n, e, FieldKind::VideoInfo));
            }
        }
    }
    paths
}
