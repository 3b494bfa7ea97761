mod support;

use std::sync::Arc;

use async_trait::async_trait;
use flatsync_core::catalog::{CatalogRepository, CatalogSnapshot};
use flatsync_core::database::{
    CacheInvalidator, CatalogStore, DocumentCollection, InMemoryCatalogStore,
};
use flatsync_core::{
    AvailabilityReaper, FieldAvailabilityBuilder, RemovedCounts, Result,
    SyncError,
};
use flatsync_model::{
    Episode, EpisodeID, FieldAvailability, FieldKind, FieldPath, MediaType,
    Movie, RemoteServerData, Season, ServerConfig, ServerId, TvShow,
};
use uuid::Uuid;

use support::{
    FakeRemoteClient, FakeServer, Harness, RecordingInvalidator, data, movie,
    movie_metadata, server, show, show_documents,
};

fn catalog_server() -> FakeServer {
    let fake = FakeServer::new(data(
        vec![("Alpha", movie("Alpha")), ("Beta", movie("Beta"))],
        vec![
            ("Show Y", show("Show Y", &[(1, 2), (2, 2)])),
            ("Show Z", show("Show Z", &[(1, 1)])),
        ],
    ))
    .document("/movies/alpha/metadata.json", movie_metadata("Alpha"))
    .document("/movies/beta/metadata.json", movie_metadata("Beta"));
    let fake = show_documents(fake, "Show Y", &[(1, 2), (2, 2)]);
    show_documents(fake, "Show Z", &[(1, 1)])
}

async fn seeded() -> (Harness, ServerConfig, FieldAvailability) {
    let h = Harness::new(FakeRemoteClient::new().with_server("server1", catalog_server()));
    let s1 = server("server1", 1);
    let data = h.client.data("server1");
    let availability = FieldAvailabilityBuilder::new().add_server(&s1, &data).build();
    h.engine
        .sync_all(&data, &s1, &availability)
        .await
        .expect("seed pass");
    (h, s1, availability)
}

fn reaper(h: &Harness) -> (AvailabilityReaper, Arc<RecordingInvalidator>) {
    let invalidator = Arc::new(RecordingInvalidator::default());
    let reaper = AvailabilityReaper::new(
        h.engine.repository().clone(),
        Arc::clone(&invalidator) as Arc<dyn CacheInvalidator>,
    );
    (reaper, invalidator)
}

#[tokio::test]
async fn reaping_a_show_removes_exactly_its_seasons_and_episodes() {
    let (h, s1, availability) = seeded().await;
    let mut remaining = h.client.data("server1");
    remaining.tv.remove("Show Y");

    let (reaper, invalidator) = reaper(&h);
    let report = reaper
        .reap_unavailable(&[(s1.id.clone(), remaining)], &availability)
        .await
        .unwrap();

    assert_eq!(
        report.removed,
        RemovedCounts {
            movies: 0,
            tv_shows: 1,
            tv_seasons: 2,
            tv_episodes: 4,
        }
    );
    assert!(report.errors.is_empty());

    let catalog = CatalogSnapshot::build(&*h.store).await.unwrap();
    let shows = catalog.all::<TvShow>();
    assert_eq!(shows.len(), 1);
    assert_eq!(shows[0].original_title.as_str(), "Show Z");
    assert_eq!(catalog.all::<Season>().len(), 1);
    assert_eq!(catalog.all::<Episode>().len(), 1);
    assert_eq!(catalog.all::<Movie>().len(), 2);

    let patterns = invalidator.patterns.lock().clone();
    assert!(patterns.contains(&"catalog:show:Show Y*".to_string()));
    assert!(patterns.contains(&"catalog:list:*".to_string()));
}

#[tokio::test]
async fn episodes_without_video_anywhere_are_removed_alone() {
    let (h, s1, availability) = seeded().await;
    let mut remaining = h.client.data("server1");
    let season = remaining
        .tv
        .get_mut("Show Y")
        .and_then(|show| show.seasons.get_mut("Season 2"))
        .unwrap();
    if let Some(episode) = season.episodes.get_mut("S02E02") {
        episode.video_url = None;
    }

    let (reaper, _) = reaper(&h);
    let report = reaper
        .reap_unavailable(&[(s1.id.clone(), remaining)], &availability)
        .await
        .unwrap();

    assert_eq!(report.removed.tv_episodes, 1);
    assert_eq!(report.removed.tv_seasons, 0);
    assert_eq!(report.removed.tv_shows, 0);
    assert_eq!(h.store.episodes.len().await, 4);
}

#[tokio::test]
async fn movie_supplied_by_any_server_is_retained() {
    let (h, s1, _) = seeded().await;
    let server1 = h.client.data("server1");
    let mut only_alpha = RemoteServerData::default();
    only_alpha
        .movies
        .insert("Alpha".to_string(), movie("Alpha"));

    let mut without_alpha = server1.clone();
    without_alpha.movies.remove("Alpha");

    let (reaper, _) = reaper(&h);
    let report = reaper
        .reap_unavailable(
            &[
                (s1.id.clone(), without_alpha),
                (ServerId::new("server2"), only_alpha),
            ],
            &FieldAvailability::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.removed.total(), 0);
    assert_eq!(report.retained_unranked, 0);
    assert_eq!(h.store.movies.len().await, 2);
}

#[tokio::test]
async fn supplier_missing_from_ranking_keeps_movie_with_warning() {
    let (h, s1, _) = seeded().await;
    let mut availability = FieldAvailability::new();
    availability.set_ranking(
        MediaType::Movie,
        "Beta",
        FieldPath::title(FieldKind::VideoUrl),
        vec![ServerId::new("server9")],
    );

    let (reaper, _) = reaper(&h);
    let report = reaper
        .reap_unavailable(&[(s1.id.clone(), h.client.data("server1"))], &availability)
        .await
        .unwrap();

    assert_eq!(report.removed.total(), 0);
    assert_eq!(report.retained_unranked, 1);
}

#[tokio::test]
async fn refuses_to_run_without_server_data() {
    let (h, _, availability) = seeded().await;
    let (reaper, invalidator) = reaper(&h);

    let err = reaper.reap_unavailable(&[], &availability).await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidData(_)));
    assert_eq!(h.store.movies.len().await, 2);
    assert!(invalidator.patterns.lock().is_empty());
}

/// Episode collection that refuses every delete.
struct UndeletableEpisodes(Arc<InMemoryCatalogStore>);

#[async_trait]
impl DocumentCollection<Episode> for UndeletableEpisodes {
    async fn find_by_id(&self, id: EpisodeID) -> Result<Option<Episode>> {
        self.0.episodes().find_by_id(id).await
    }

    async fn find_by_identity(&self, identity_key: &str) -> Result<Option<Episode>> {
        self.0.episodes().find_by_identity(identity_key).await
    }

    async fn find_by_natural_key(&self, natural_key: &str) -> Result<Option<Episode>> {
        self.0.episodes().find_by_natural_key(natural_key).await
    }

    async fn find_by_ancestor(&self, ancestor: Uuid) -> Result<Vec<Episode>> {
        self.0.episodes().find_by_ancestor(ancestor).await
    }

    async fn find_all(&self) -> Result<Vec<Episode>> {
        self.0.episodes().find_all().await
    }

    async fn insert(&self, doc: &Episode) -> Result<()> {
        self.0.episodes().insert(doc).await
    }

    async fn replace(&self, doc: &Episode) -> Result<()> {
        self.0.episodes().replace(doc).await
    }

    async fn delete_many(&self, _ids: &[EpisodeID]) -> Result<u64> {
        Err(SyncError::Storage("episodes are read-only".to_string()))
    }
}

struct EpisodeDeletesFail {
    inner: Arc<InMemoryCatalogStore>,
    episodes: UndeletableEpisodes,
}

impl CatalogStore for EpisodeDeletesFail {
    fn movies(&self) -> &dyn DocumentCollection<Movie> {
        self.inner.movies()
    }

    fn shows(&self) -> &dyn DocumentCollection<TvShow> {
        self.inner.shows()
    }

    fn seasons(&self) -> &dyn DocumentCollection<Season> {
        self.inner.seasons()
    }

    fn episodes(&self) -> &dyn DocumentCollection<Episode> {
        &self.episodes
    }
}

#[tokio::test]
async fn failed_episode_delete_keeps_parent_season_and_show() {
    let (h, s1, availability) = seeded().await;
    let mut remaining = h.client.data("server1");
    remaining.tv.remove("Show Y");
    remaining.movies.remove("Beta");

    let store = EpisodeDeletesFail {
        inner: Arc::clone(&h.store),
        episodes: UndeletableEpisodes(Arc::clone(&h.store)),
    };
    let reaper = AvailabilityReaper::new(
        CatalogRepository::new(Arc::new(store) as Arc<dyn CatalogStore>),
        Arc::new(RecordingInvalidator::default()) as Arc<dyn CacheInvalidator>,
    );
    let report = reaper
        .reap_unavailable(&[(s1.id.clone(), remaining)], &availability)
        .await
        .unwrap();

    assert_eq!(
        report.removed,
        RemovedCounts {
            movies: 1,
            tv_shows: 0,
            tv_seasons: 0,
            tv_episodes: 0,
        }
    );
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("episodes:"));

    let catalog = CatalogSnapshot::build(&*h.store).await.unwrap();
    assert_eq!(catalog.all::<TvShow>().len(), 2);
    assert_eq!(catalog.all::<Season>().len(), 3);
    assert_eq!(catalog.all::<Episode>().len(), 5);
    assert_eq!(catalog.all::<Movie>().len(), 1);
}

#[tokio::test]
async fn padded_remote_keys_still_count_as_supplied() {
    let (h, s1, availability) = seeded().await;
    let mut padded = h.client.data("server1");
    let alpha = padded.movies.remove("Alpha").expect("alpha");
    padded.movies.insert("  Alpha\t".to_string(), alpha);
    let show_z = padded.tv.remove("Show Z").expect("show z");
    padded.tv.insert(" Show Z ".to_string(), show_z);

    let (reaper, invalidator) = reaper(&h);
    let report = reaper
        .reap_unavailable(&[(s1.id.clone(), padded)], &availability)
        .await
        .unwrap();

    assert_eq!(report.removed, RemovedCounts::default());
    assert!(invalidator.patterns.lock().is_empty());
    assert_eq!(h.store.movies.len().await, 2);
    assert_eq!(h.store.shows.len().await, 2);
    assert_eq!(h.store.episodes.len().await, 5);
}
