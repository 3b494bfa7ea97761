//! Removal of catalog entities that no server offers any more.
//!
//! An entity is kept as long as at least one server still has it with a
//! playable video. When servers that have it are all missing from the
//! entity's availability ranking, it is kept and a warning logged; the
//! reaper prefers a stale entry over deleting something a server still
//! serves.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use flatsync_model::{
    CatalogTitle, Episode, EpisodeID, FieldAvailability, FieldKind, FieldPath,
    MediaType, Movie, MovieID, RemoteMovie, RemoteServerData, RemoteShow,
    Season, SeasonID, ServerId, ShowID, TvShow,
};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::availability::FieldAvailabilityIndex;
use crate::catalog::{CatalogRepository, CatalogSnapshot};
use crate::database::ports::cache_invalidation::{CacheInvalidator, CacheKeys};
use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedCounts {
    pub movies: u64,
    pub tv_shows: u64,
    pub tv_seasons: u64,
    pub tv_episodes: u64,
}

impl RemovedCounts {
    pub fn total(&self) -> u64 {
        self.movies + self.tv_shows + self.tv_seasons + self.tv_episodes
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReapReport {
    pub removed: RemovedCounts,
    /// Entities kept although no ranked server supplies them.
    pub retained_unranked: usize,
    pub errors: Vec<String>,
}

/// A server's tree keyed by the same normalized title the catalog stores,
/// keeping the raw key for availability lookups.
struct TitleIndex<'a, T>(BTreeMap<CatalogTitle, (&'a str, &'a T)>);

impl<'a, T> TitleIndex<'a, T> {
    fn new(map: &'a BTreeMap<String, T>) -> Self {
        let mut titles = BTreeMap::new();
        for (raw, value) in map {
            let Ok(title) = CatalogTitle::new(raw) else {
                continue;
            };
            // An exact key wins over a padded duplicate.
            let exact = raw.as_str() == title.as_str();
            titles
                .entry(title)
                .and_modify(|slot: &mut (&'a str, &'a T)| {
                    if exact {
                        *slot = (raw.as_str(), value);
                    }
                })
                .or_insert((raw.as_str(), value));
        }
        Self(titles)
    }

    fn get(&self, title: &CatalogTitle) -> Option<(&'a str, &'a T)> {
        self.0.get(title).copied()
    }
}

struct ServerTitles<'a> {
    server: &'a ServerId,
    movies: TitleIndex<'a, RemoteMovie>,
    tv: TitleIndex<'a, RemoteShow>,
}

impl<'a> ServerTitles<'a> {
    fn new(server: &'a ServerId, data: &'a RemoteServerData) -> Self {
        Self {
            server,
            movies: TitleIndex::new(&data.movies),
            tv: TitleIndex::new(&data.tv),
        }
    }
}

fn ranked_supplier(ranking: Option<&[ServerId]>, found: &[&ServerId]) -> bool {
    match ranking {
        None | Some([]) => true,
        Some(ranking) => found.iter().any(|server| ranking.contains(server)),
    }
}

#[derive(Default)]
struct Doomed {
    movies: Vec<(MovieID, String)>,
    shows: HashSet<ShowID>,
    show_titles: Vec<String>,
    seasons: HashSet<SeasonID>,
    season_keys: Vec<(String, u32)>,
    episodes: HashSet<EpisodeID>,
    episode_keys: Vec<(String, u32, u32)>,
}

#[derive(Clone)]
pub struct AvailabilityReaper {
    repository: CatalogRepository,
    invalidator: Arc<dyn CacheInvalidator>,
}

impl fmt::Debug for AvailabilityReaper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvailabilityReaper").finish()
    }
}

impl AvailabilityReaper {
    pub fn new(
        repository: CatalogRepository,
        invalidator: Arc<dyn CacheInvalidator>,
    ) -> Self {
        Self {
            repository,
            invalidator,
        }
    }

    /// Deletes entities no server offers, cascading show -> seasons ->
    /// episodes. Refuses to run without any server data.
    #[instrument(skip_all, fields(servers = servers.len()))]
    pub async fn reap_unavailable(
        &self,
        servers: &[(ServerId, RemoteServerData)],
        availability: &FieldAvailability,
    ) -> Result<ReapReport> {
        if servers.is_empty() {
            return Err(SyncError::InvalidData(
                "refusing to reap without any server data".to_string(),
            ));
        }

        let snapshot =
            CatalogSnapshot::build(&**self.repository.store()).await?;
        let servers: Vec<ServerTitles<'_>> = servers
            .iter()
            .map(|(server, data)| ServerTitles::new(server, data))
            .collect();
        let servers = servers.as_slice();
        let index = FieldAvailabilityIndex::new(availability);
        let mut report = ReapReport::default();
        let mut doomed = Doomed::default();

        self.mark_movies(&snapshot, servers, index, &mut doomed, &mut report);
        self.mark_shows(&snapshot, servers, index, &mut doomed, &mut report);
        self.mark_seasons(&snapshot, servers, &mut doomed);
        self.mark_episodes(&snapshot, servers, &mut doomed);

        self.delete(&doomed, &mut report).await;
        self.invalidate(&doomed).await;

        info!(
            target: "sync::reaper",
            movies = report.removed.movies,
            shows = report.removed.tv_shows,
            seasons = report.removed.tv_seasons,
            episodes = report.removed.tv_episodes,
            retained_unranked = report.retained_unranked,
            "availability reap finished"
        );
        Ok(report)
    }

    fn mark_movies(
        &self,
        snapshot: &CatalogSnapshot,
        servers: &[ServerTitles<'_>],
        index: FieldAvailabilityIndex<'_>,
        doomed: &mut Doomed,
        report: &mut ReapReport,
    ) {
        for movie in snapshot.all::<Movie>() {
            let title = movie.original_title.as_str();
            let mut found = Vec::new();
            let mut key = title;
            for titles in servers {
                if let Some((raw, remote)) = titles.movies.get(&movie.original_title)
                    && remote.has_video()
                {
                    found.push(titles.server);
                    key = raw;
                }
            }

            if found.is_empty() {
                doomed.movies.push((movie.id, title.to_string()));
                continue;
            }
            let ranking = index.ranking(
                MediaType::Movie,
                key,
                &FieldPath::title(FieldKind::VideoUrl),
            );
            if !ranked_supplier(ranking, &found) {
                warn!(
                    movie = title,
                    ?found,
                    "movie found only on unranked servers; keeping"
                );
                report.retained_unranked += 1;
            }
        }
    }

    fn mark_shows(
        &self,
        snapshot: &CatalogSnapshot,
        servers: &[ServerTitles<'_>],
        index: FieldAvailabilityIndex<'_>,
        doomed: &mut Doomed,
        report: &mut ReapReport,
    ) {
        for show in snapshot.all::<TvShow>() {
            let title = show.original_title.as_str();
            let found: Vec<(&ServerId, &str, &RemoteShow)> = servers
                .iter()
                .filter_map(|titles| {
                    titles
                        .tv
                        .get(&show.original_title)
                        .filter(|(_, remote)| remote.has_playable_episode())
                        .map(|(raw, remote)| (titles.server, raw, remote))
                })
                .collect();

            if found.is_empty() {
                doomed.shows.insert(show.id);
                doomed.show_titles.push(title.to_string());
                continue;
            }

            let suppliers: Vec<&ServerId> =
                found.iter().map(|(server, _, _)| *server).collect();
            let mut rankings: Vec<&[ServerId]> = Vec::new();
            for (_, raw, remote) in &found {
                for season in remote.seasons.values() {
                    for episode in season.episodes.values() {
                        if !episode.has_video() {
                            continue;
                        }
                        let path = FieldPath::episode(
                            season.season_number,
                            episode.episode_number,
                            FieldKind::VideoUrl,
                        );
                        rankings.extend(index.ranking(MediaType::Tv, raw, &path));
                    }
                }
            }
            let ranked = rankings.is_empty()
                || rankings
                    .iter()
                    .any(|ranking| ranked_supplier(Some(*ranking), &suppliers));
            if !ranked {
                warn!(
                    show = title,
                    found = ?suppliers,
                    "show found only on unranked servers; keeping"
                );
                report.retained_unranked += 1;
            }
        }
    }

    fn mark_seasons(
        &self,
        snapshot: &CatalogSnapshot,
        servers: &[ServerTitles<'_>],
        doomed: &mut Doomed,
    ) {
        for season in snapshot.all::<Season>() {
            if doomed.shows.contains(&season.show_id) {
                doomed.seasons.insert(season.id);
                continue;
            }
            let title = season.show_title.as_str();
            let available = servers.iter().any(|titles| {
                titles
                    .tv
                    .get(&season.show_title)
                    .and_then(|(_, show)| show.season(season.season_number))
                    .is_some_and(|remote| remote.has_playable_episode())
            });
            if !available {
                doomed.seasons.insert(season.id);
                doomed
                    .season_keys
                    .push((title.to_string(), season.season_number));
            }
        }
    }

    fn mark_episodes(
        &self,
        snapshot: &CatalogSnapshot,
        servers: &[ServerTitles<'_>],
        doomed: &mut Doomed,
    ) {
        for episode in snapshot.all::<Episode>() {
            if doomed.shows.contains(&episode.show_id)
                || doomed.seasons.contains(&episode.season_id)
            {
                doomed.episodes.insert(episode.id);
                continue;
            }
            let title = episode.show_title.as_str();
            let available = servers.iter().any(|titles| {
                titles
                    .tv
                    .get(&episode.show_title)
                    .and_then(|(_, show)| show.season(episode.season_number))
                    .and_then(|season| season.episode(episode.episode_number))
                    .is_some_and(|remote| remote.has_video())
            });
            if !available {
                doomed.episodes.insert(episode.id);
                doomed.episode_keys.push((
                    title.to_string(),
                    episode.season_number,
                    episode.episode_number,
                ));
            }
        }
    }

    async fn delete(&self, doomed: &Doomed, report: &mut ReapReport) {
        // Children first; a failed level keeps its parents in place so no
        // child is left pointing at a deleted row.
        let episodes: Vec<EpisodeID> = doomed.episodes.iter().copied().collect();
        let episodes_gone = match self.repository.delete::<Episode>(&episodes).await {
            Ok(n) => {
                report.removed.tv_episodes = n;
                true
            }
            Err(err) => {
                report.errors.push(format!("episodes: {err}"));
                false
            }
        };

        let seasons_gone = if episodes_gone {
            let seasons: Vec<SeasonID> = doomed.seasons.iter().copied().collect();
            match self.repository.delete::<Season>(&seasons).await {
                Ok(n) => {
                    report.removed.tv_seasons = n;
                    true
                }
                Err(err) => {
                    report.errors.push(format!("seasons: {err}"));
                    false
                }
            }
        } else {
            false
        };

        if seasons_gone {
            let shows: Vec<ShowID> = doomed.shows.iter().copied().collect();
            match self.repository.delete::<TvShow>(&shows).await {
                Ok(n) => report.removed.tv_shows = n,
                Err(err) => report.errors.push(format!("tv shows: {err}")),
            }
        } else if !doomed.seasons.is_empty() || !doomed.shows.is_empty() {
            warn!(
                target: "sync::reaper",
                seasons = doomed.seasons.len(),
                shows = doomed.shows.len(),
                "child delete failed; keeping parent seasons and shows"
            );
        }

        let movies: Vec<MovieID> = doomed.movies.iter().map(|(id, _)| *id).collect();
        match self.repository.delete::<Movie>(&movies).await {
            Ok(n) => report.removed.movies = n,
            Err(err) => report.errors.push(format!("movies: {err}")),
        }

        for error in &report.errors {
            warn!(error = %error, "reaper delete failed");
        }
    }

    async fn invalidate(&self, doomed: &Doomed) {
        let mut patterns: Vec<String> = Vec::new();
        patterns.extend(doomed.movies.iter().map(|(_, title)| CacheKeys::movie(title)));
        patterns.extend(doomed.show_titles.iter().map(|title| CacheKeys::show(title)));
        patterns.extend(
            doomed
                .season_keys
                .iter()
                .map(|(title, n)| CacheKeys::season(title, *n)),
        );
        patterns.extend(
            doomed
                .episode_keys
                .iter()
                .map(|(title, s, e)| CacheKeys::episode(title, *s, *e)),
        );
        if patterns.is_empty() {
            return;
        }
        patterns.push(CacheKeys::listings());

        if let Err(err) = self.invalidator.invalidate(&patterns).await {
            warn!(error = %err, "cache invalidation failed after reap");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unranked_only_when_ranking_excludes_every_supplier() {
        let a = ServerId::new("a");
        let b = ServerId::new("b");
        assert!(ranked_supplier(None, &[&a]));
        assert!(ranked_supplier(Some(&[][..]), &[&a]));
        assert!(ranked_supplier(Some(&[b.clone(), a.clone()][..]), &[&a]));
        assert!(!ranked_supplier(Some(&[b][..]), &[&a]));
    }

    fn title(raw: &str) -> CatalogTitle {
        CatalogTitle::new(raw).unwrap()
    }

    #[test]
    fn remote_keys_are_normalized_like_catalog_titles() {
        let mut map = BTreeMap::new();
        map.insert(" Alpha ".to_string(), 1);
        map.insert("\tGamma\n".to_string(), 3);
        map.insert("   ".to_string(), 0);
        let index = TitleIndex::new(&map);

        assert_eq!(index.get(&title("Alpha")), Some((" Alpha ", &1)));
        assert_eq!(index.get(&title("Gamma")), Some(("\tGamma\n", &3)));
        assert_eq!(index.get(&title("Beta")), None);
        assert_eq!(index.0.len(), 2);
    }

    #[test]
    fn exact_remote_key_wins_over_padded_twin() {
        let mut map = BTreeMap::new();
        map.insert("Alpha ".to_string(), 1);
        map.insert("Alpha".to_string(), 2);
        map.insert(" Alpha".to_string(), 3);
        let index = TitleIndex::new(&map);
        assert_eq!(index.get(&title("Alpha")), Some(("Alpha", &2)));
    }
}
