mod support;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use flatsync_core::catalog::CatalogSnapshot;
use flatsync_core::database::{CatalogStore, ContentHashStore, DocumentCollection};
use flatsync_core::remote::RemoteServerClient;
use flatsync_core::sync::StrategyKind;
use flatsync_core::{FieldAvailabilityBuilder, SyncEngine, SyncSettings};
use flatsync_model::{
    CatalogTitle, Episode, FieldAvailability, FieldKind, HashKey, HashManifest,
    Movie, Season, SeasonHashes, ServerConfig, ServerId, ShowHashes, Sourced,
    TvShow,
};
use serde_json::json;

use support::{
    FakeRemoteClient, FakeServer, Harness, data, movie, movie_metadata, server,
    show, show_documents,
};

fn availability_for(client: &FakeRemoteClient, servers: &[&ServerConfig]) -> FieldAvailability {
    servers
        .iter()
        .fold(FieldAvailabilityBuilder::new(), |builder, server| {
            builder.add_server(server, &client.data(server.id.as_str()))
        })
        .build()
}

async fn run(
    h: &Harness,
    server: &ServerConfig,
    availability: &FieldAvailability,
) -> flatsync_core::SyncReport {
    let data = h.client.data(server.id.as_str());
    h.engine
        .sync_all(&data, server, availability)
        .await
        .expect("sync pass")
}

async fn snapshot(h: &Harness) -> CatalogSnapshot {
    CatalogSnapshot::build(&*h.store).await.expect("snapshot")
}

fn single_server() -> FakeServer {
    let layout = [(1, 2), (2, 1)];
    let fake = FakeServer::new(data(
        vec![("Alpha", movie("Alpha"))],
        vec![("Show Y", show("Show Y", &layout))],
    ))
    .document("/movies/alpha/metadata.json", movie_metadata("Alpha"));
    show_documents(fake, "Show Y", &layout)
}

#[tokio::test]
async fn second_identical_pass_writes_nothing() {
    let h = Harness::new(FakeRemoteClient::new().with_server("server1", single_server()));
    let s1 = server("server1", 1);
    let availability = availability_for(&h.client, &[&s1]);

    let first = run(&h, &s1, &availability).await;
    assert_eq!(first.error_count(), 0, "{:?}", first);
    assert_eq!(first.movies.created.len(), 1);
    assert_eq!(first.tv_shows.created.len(), 1);
    assert_eq!(first.seasons.created.len(), 2);
    assert_eq!(first.episodes.created.len(), 3);
    assert_eq!(first.performance.strategy, StrategyKind::Traditional);

    let writes = h.store.write_count();
    let second = run(&h, &s1, &availability).await;

    assert_eq!(h.store.write_count(), writes);
    assert_eq!(second.changed_count(), 0);
    assert_eq!(second.error_count(), 0);
    assert_eq!(second.episodes.unchanged, 3);
}

#[tokio::test]
async fn season_metadata_comes_from_show_payload_without_episodes() {
    let h = Harness::new(FakeRemoteClient::new().with_server("server1", single_server()));
    let s1 = server("server1", 1);
    let availability = availability_for(&h.client, &[&s1]);
    run(&h, &s1, &availability).await;

    let seasons = snapshot(&h).await.all::<Season>();
    let season = seasons
        .iter()
        .find(|season| season.season_number == 2)
        .expect("season 2");
    let metadata = season.metadata.as_ref().expect("season metadata");
    assert_eq!(metadata.value.get_str("name"), Some("Season 2"));
    assert!(metadata.value.as_value().get("episodes").is_none());
    assert_eq!(metadata.source, ServerId::new("server1"));
}

#[tokio::test]
async fn higher_ranked_server_keeps_its_value_in_either_order() {
    for order in [["server2", "server1"], ["server1", "server2"]] {
        let beta = || {
            FakeServer::new(data(vec![("Beta", movie("Beta"))], vec![]))
                .document("/movies/beta/metadata.json", movie_metadata("Beta"))
        };
        let client = FakeRemoteClient::new()
            .with_server("server1", beta())
            .with_server("server2", beta());
        let h = Harness::new(client);
        // Lower number ranks first: server2 outranks server1.
        let s1 = server("server1", 2);
        let s2 = server("server2", 1);
        let availability = availability_for(&h.client, &[&s1, &s2]);

        for id in order {
            let config = if id == "server1" { &s1 } else { &s2 };
            run(&h, config, &availability).await;
        }

        let movies = snapshot(&h).await.all::<Movie>();
        assert_eq!(movies.len(), 1);
        let poster = movies[0].poster.as_ref().expect("poster");
        assert_eq!(poster.source, ServerId::new("server2"), "order {order:?}");
        assert_eq!(poster.value, "http://server2.local/movies/beta/poster.jpg");
    }
}

#[tokio::test]
async fn season_only_on_lower_ranked_server_is_created() {
    let high = show_documents(
        FakeServer::new(data(vec![], vec![("Show Y", show("Show Y", &[(1, 1), (2, 1)]))])),
        "Show Y",
        &[(1, 1), (2, 1)],
    );
    let low = show_documents(
        FakeServer::new(data(
            vec![],
            vec![("Show Y", show("Show Y", &[(1, 1), (2, 1), (3, 2)]))],
        )),
        "Show Y",
        &[(1, 1), (2, 1), (3, 2)],
    );
    let h = Harness::new(
        FakeRemoteClient::new()
            .with_server("server1", high)
            .with_server("server2", low),
    );
    let s1 = server("server1", 1);
    let s2 = server("server2", 2);
    let availability = availability_for(&h.client, &[&s1, &s2]);

    run(&h, &s1, &availability).await;
    let report = run(&h, &s2, &availability).await;
    assert_eq!(report.seasons.created.len(), 1);
    assert_eq!(report.episodes.created.len(), 2);

    let catalog = snapshot(&h).await;
    let seasons = catalog.all::<Season>();
    assert_eq!(seasons.len(), 3);
    let third = seasons
        .iter()
        .find(|season| season.season_number == 3)
        .expect("season 3");
    assert_eq!(
        third.poster.as_ref().map(|poster| &poster.source),
        Some(&ServerId::new("server2"))
    );
    let first = seasons
        .iter()
        .find(|season| season.season_number == 1)
        .expect("season 1");
    assert_eq!(
        first.poster.as_ref().map(|poster| &poster.source),
        Some(&ServerId::new("server1"))
    );
    assert_eq!(catalog.all::<TvShow>().len(), 1);
}

#[tokio::test]
async fn movie_on_second_server_without_ranking_is_created_there() {
    let client = FakeRemoteClient::new()
        .with_server("server1", FakeServer::new(data(vec![], vec![])))
        .with_server(
            "server2",
            FakeServer::new(data(vec![("Alpha", movie("Alpha"))], vec![]))
                .document("/movies/alpha/metadata.json", movie_metadata("Alpha")),
        );
    let h = Harness::new(client);
    let availability = FieldAvailability::new();

    run(&h, &server("server1", 1), &availability).await;
    let report = run(&h, &server("server2", 2), &availability).await;
    assert_eq!(report.movies.created.len(), 1);

    let movies = snapshot(&h).await.all::<Movie>();
    assert_eq!(movies.len(), 1);
    let alpha = &movies[0];
    assert_eq!(alpha.original_title.as_str(), "Alpha");
    assert_eq!(
        alpha.video.as_ref().map(|video| &video.source),
        Some(&ServerId::new("server2"))
    );
    assert_eq!(
        alpha.metadata.as_ref().and_then(|m| m.value.get_str("title")),
        Some("Alpha")
    );
}

#[tokio::test]
async fn thumbnail_blurhash_from_top_server_wins_in_either_order() {
    let with_blurhash = |hash: &str| {
        let mut tree = show("Show Y", &[(1, 1)]);
        if let Some(episode) = tree
            .seasons
            .get_mut("Season 1")
            .and_then(|season| season.episodes.get_mut("S01E01"))
        {
            episode.thumbnail_blurhash = Some("/tv/show-y/s1/e1.jpg".to_string());
        }
        show_documents(FakeServer::new(data(vec![], vec![("Show Y", tree)])), "Show Y", &[(1, 1)])
            .blurhash("/tv/show-y/s1/e1.jpg", hash)
    };

    for order in [["server2", "server1"], ["server1", "server2"]] {
        let h = Harness::new(
            FakeRemoteClient::new()
                .with_server("server1", with_blurhash("LEHV6nWB2yk8"))
                .with_server("server2", with_blurhash("L00000fQfQfQ")),
        );
        let s1 = server("server1", 1);
        let s2 = server("server2", 2);
        let availability = availability_for(&h.client, &[&s1, &s2]);
        for id in order {
            let config = if id == "server1" { &s1 } else { &s2 };
            run(&h, config, &availability).await;
        }

        let episodes = snapshot(&h).await.all::<Episode>();
        assert_eq!(episodes.len(), 1);
        let blurhash = episodes[0]
            .thumbnail_blurhash
            .as_ref()
            .expect("thumbnail blurhash");
        assert_eq!(blurhash.value, "LEHV6nWB2yk8", "order {order:?}");
        assert_eq!(blurhash.source, ServerId::new("server1"));
    }
}

#[tokio::test]
async fn locked_poster_survives_while_other_fields_update() {
    let h = Harness::new(FakeRemoteClient::new().with_server(
        "server1",
        FakeServer::new(data(vec![("Gamma", movie("Gamma"))], vec![]))
            .document("/movies/gamma/metadata.json", movie_metadata("Gamma")),
    ));
    let mut stored = Movie::new(CatalogTitle::new("Gamma").unwrap());
    stored.poster = Some(Sourced::new(
        "https://art.example/gamma.jpg".to_string(),
        ServerId::new("curator"),
    ));
    stored.locked_fields.insert(FieldKind::Poster);
    h.store.movies().insert(&stored).await.unwrap();

    let s1 = server("server1", 1);
    let availability = availability_for(&h.client, &[&s1]);
    let report = run(&h, &s1, &availability).await;
    assert_eq!(report.movies.updated.len(), 1);
    assert!(!report.movies.updated[0].fields.contains(&FieldKind::Poster));

    let gamma = h
        .store
        .movies()
        .find_by_id(stored.id)
        .await
        .unwrap()
        .expect("gamma");
    assert_eq!(gamma.poster, stored.poster);
    assert_eq!(
        gamma.video.as_ref().map(|video| video.value.as_str()),
        Some("http://server1.local/movies/gamma/video.mp4")
    );
    assert!(gamma.metadata.is_some());
}

fn hashed_server() -> FakeServer {
    let mut manifest = HashManifest::default();
    manifest.movies.insert("Alpha".to_string(), "alpha-v1".to_string());
    manifest.tv.insert(
        "Show Y".to_string(),
        ShowHashes {
            hash: "show-v1".to_string(),
            seasons: BTreeMap::from([(
                1,
                SeasonHashes {
                    hash: "season-v1".to_string(),
                    episodes: BTreeMap::from([(1, "episode-v1".to_string())]),
                },
            )]),
        },
    );
    let fake = FakeServer::new(data(
        vec![("Alpha", movie("Alpha"))],
        vec![("Show Y", show("Show Y", &[(1, 1)]))],
    ))
    .document("/movies/alpha/metadata.json", movie_metadata("Alpha"))
    .manifest(manifest);
    show_documents(fake, "Show Y", &[(1, 1)])
}

#[tokio::test]
async fn matching_hash_on_complete_catalog_skips_metadata_fetches() {
    let h = Harness::new(FakeRemoteClient::new().with_server("server1", hashed_server()));
    let s1 = server("server1", 1);
    let availability = availability_for(&h.client, &[&s1]);

    let first = run(&h, &s1, &availability).await;
    assert_eq!(first.performance.strategy, StrategyKind::HashBased);
    assert_eq!(first.performance.hashes_stored, 4);
    assert_eq!(
        h.hashes
            .get(&HashKey::movie("Alpha"), &s1.id)
            .await
            .unwrap()
            .as_deref(),
        Some("alpha-v1")
    );

    let second = run(&h, &s1, &availability).await;
    assert_eq!(h.client.fetch_count("server1", "/movies/alpha/metadata.json"), 1);
    assert_eq!(h.client.fetch_count("server1", "/tv/show-y/metadata.json"), 1);
    assert_eq!(h.client.fetch_count("server1", "/tv/show-y/s1/e1.json"), 1);
    assert_eq!(second.movies.hash_skips, 1);
    assert_eq!(second.tv_shows.hash_skips, 1);
    assert_eq!(second.seasons.hash_skips, 1);
    assert_eq!(second.episodes.hash_skips, 1);
    assert_eq!(second.performance.hashes_stored, 0);
    assert_eq!(second.performance.fetches.metadata_fetches, 0);
}

#[tokio::test]
async fn matching_hash_on_incomplete_catalog_fetches_anyway() {
    let h = Harness::new(FakeRemoteClient::new().with_server("server1", hashed_server()));
    let s1 = server("server1", 1);
    let availability = availability_for(&h.client, &[&s1]);
    run(&h, &s1, &availability).await;

    let mut alpha = snapshot(&h)
        .await
        .all::<Movie>()
        .pop()
        .expect("alpha");
    alpha.metadata = None;
    h.store.movies().replace(&alpha).await.unwrap();

    let second = run(&h, &s1, &availability).await;
    assert_eq!(h.client.fetch_count("server1", "/movies/alpha/metadata.json"), 2);
    assert_eq!(second.movies.hash_skips, 0);
    assert_eq!(second.movies.updated.len(), 1);
    assert_eq!(second.movies.updated[0].fields, vec![FieldKind::Metadata]);
}

#[tokio::test]
async fn stale_remote_metadata_does_not_replace_newer_copy() {
    let h = Harness::new(FakeRemoteClient::new().with_server(
        "server1",
        FakeServer::new(data(vec![("Alpha", movie("Alpha"))], vec![])).document(
            "/movies/alpha/metadata.json",
            json!({ "title": "Alpha", "last_updated": "2025-03-01T00:00:00Z" }),
        ),
    ));
    let s1 = server("server1", 1);
    let availability = availability_for(&h.client, &[&s1]);
    run(&h, &s1, &availability).await;

    h.client.update("server1", |fake| {
        fake.documents.insert(
            "/movies/alpha/metadata.json".to_string(),
            json!({ "title": "Alpha (old)", "last_updated": "2024-01-01T00:00:00Z" }),
        );
    });
    let report = run(&h, &s1, &availability).await;
    assert_eq!(report.changed_count(), 0);

    let alpha = snapshot(&h).await.all::<Movie>().pop().expect("alpha");
    assert_eq!(
        alpha.metadata.as_ref().and_then(|m| m.value.get_str("title")),
        Some("Alpha")
    );
}

#[tokio::test]
async fn failed_fetch_is_reported_and_pass_continues() {
    let h = Harness::new(FakeRemoteClient::new().with_server(
        "server1",
        // No metadata documents registered: every metadata fetch 404s.
        FakeServer::new(data(
            vec![("Alpha", movie("Alpha")), ("Beta", movie("Beta"))],
            vec![],
        )),
    ));
    let s1 = server("server1", 1);
    let availability = availability_for(&h.client, &[&s1]);
    let report = run(&h, &s1, &availability).await;

    assert_eq!(report.movies.created.len(), 2);
    assert_eq!(report.movies.errors.len(), 2);
    assert!(
        report
            .movies
            .errors
            .iter()
            .all(|failure| failure.field == Some(FieldKind::Metadata))
    );
    let movies = snapshot(&h).await.all::<Movie>();
    assert!(movies.iter().all(|movie| movie.video.is_some()));
}

#[tokio::test]
async fn entities_without_playable_video_are_skipped() {
    let mut silent = movie("Silent");
    silent.urls.mp4 = None;
    let mut empty_show = show("Empty", &[(1, 1)]);
    for season in empty_show.seasons.values_mut() {
        for episode in season.episodes.values_mut() {
            episode.video_url = None;
        }
    }
    let h = Harness::new(FakeRemoteClient::new().with_server(
        "server1",
        FakeServer::new(data(vec![("Silent", silent)], vec![("Empty", empty_show)])),
    ));
    let s1 = server("server1", 1);
    let report = run(&h, &s1, &FieldAvailability::new()).await;

    assert_eq!(report.movies.skipped, 1);
    assert_eq!(report.tv_shows.skipped, 1);
    assert_eq!(report.performance.catalog.movies, 0);
    assert!(h.store.movies.is_empty().await);
    assert!(h.store.shows.is_empty().await);
}

#[tokio::test]
async fn invalid_server_config_fails_the_pass() {
    let h = Harness::new(FakeRemoteClient::new());
    let broken = ServerConfig::new(
        "server1",
        1,
        "not a url",
        std::time::Duration::from_secs(5),
    );
    let result = h
        .engine
        .sync_all(&data(vec![], vec![]), &broken, &FieldAvailability::new())
        .await;
    assert!(matches!(result, Err(flatsync_core::SyncError::InvalidConfig(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_engines_converge_on_one_document_per_key() {
    let layout = [(1, 3)];
    let fake = show_documents(
        FakeServer::new(data(
            vec![("Alpha", movie("Alpha"))],
            vec![("Show Y", show("Show Y", &layout))],
        ))
        .document("/movies/alpha/metadata.json", movie_metadata("Alpha")),
        "Show Y",
        &layout,
    );
    let h = Harness::new(FakeRemoteClient::new().with_server("server1", fake));
    let other = SyncEngine::new(
        Arc::clone(&h.store) as Arc<dyn CatalogStore>,
        Arc::clone(&h.hashes) as Arc<dyn ContentHashStore>,
        Arc::clone(&h.client) as Arc<dyn RemoteServerClient>,
        SyncSettings::default(),
    );
    let s1 = server("server1", 1);
    let availability = availability_for(&h.client, &[&s1]);
    let data = h.client.data("server1");

    let (a, b) = tokio::join!(
        h.engine.sync_all(&data, &s1, &availability),
        other.sync_all(&data, &s1, &availability),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(h.store.movies.len().await, 1);
    assert_eq!(h.store.shows.len().await, 1);
    assert_eq!(h.store.seasons.len().await, 1);
    assert_eq!(h.store.episodes.len().await, 3);

    let catalog = snapshot(&h).await;
    let show = catalog.all::<TvShow>().pop().expect("show");
    let seasons: Vec<Season> = catalog.children_of(show.id.to_uuid());
    assert_eq!(seasons.len(), 1);
    let episodes: Vec<Episode> = catalog.children_of(seasons[0].id.to_uuid());
    assert_eq!(episodes.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn overlapping_passes_keep_each_others_fields() {
    let mut from_first = movie("Alpha");
    from_first.urls.metadata = None;
    let mut from_second = movie("Alpha");
    from_second.urls.metadata = None;
    from_second.urls.poster = None;
    from_second.urls.backdrop = Some("/movies/alpha/backdrop.jpg".to_string());

    // Both passes build their snapshot, then stall on the probe, so
    // neither has seen the other's write when it starts deciding.
    let client = FakeRemoteClient::new()
        .with_server(
            "server1",
            FakeServer::new(data(vec![("Alpha", from_first)], vec![])),
        )
        .with_server(
            "server2",
            FakeServer::new(data(vec![("Alpha", from_second)], vec![])),
        )
        .with_probe_delay(Duration::from_millis(200));
    let h = Harness::new(client);
    h.store
        .movies
        .insert(&Movie::new(CatalogTitle::new("Alpha").unwrap()))
        .await
        .unwrap();

    let s1 = server("server1", 1);
    let s2 = server("server2", 2);
    let availability = availability_for(&h.client, &[&s1, &s2]);
    let first = h.client.data("server1");
    let second = h.client.data("server2");

    let (a, b) = tokio::join!(
        h.engine.sync_all(&first, &s1, &availability),
        h.engine.sync_all(&second, &s2, &availability),
    );
    a.unwrap();
    b.unwrap();

    let movies = snapshot(&h).await.all::<Movie>();
    assert_eq!(movies.len(), 1);
    let alpha = &movies[0];
    let video = alpha.video.as_ref().expect("video");
    assert_eq!(video.source, ServerId::new("server1"));
    let poster = alpha.poster.as_ref().expect("poster");
    assert_eq!(poster.source, ServerId::new("server1"));
    let backdrop = alpha.backdrop.as_ref().expect("backdrop from server2");
    assert_eq!(backdrop.source, ServerId::new("server2"));
    assert_eq!(backdrop.value, "http://server2.local/movies/alpha/backdrop.jpg");
}

#[tokio::test(start_paused = true)]
async fn hanging_probe_falls_back_to_traditional_sync() {
    let fake = single_server().manifest(HashManifest::default());
    let h = Harness::new(
        FakeRemoteClient::new()
            .with_server("server1", fake)
            .with_probe_delay(Duration::from_secs(3600)),
    );
    let s1 = server("server1", 1);
    let availability = availability_for(&h.client, &[&s1]);
    let report = run(&h, &s1, &availability).await;

    assert_eq!(report.performance.strategy, StrategyKind::Traditional);
    assert_eq!(h.client.fetch_count("server1", flatsync_core::remote::HASHES_PATH), 0);
    assert_eq!(report.movies.created.len(), 1);
    assert_eq!(report.error_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_fetches_time_out_on_their_entity_only() {
    let mut beta = movie("Beta");
    beta.urls.poster_blurhash = Some("/movies/beta/poster.jpg".to_string());
    let fake = FakeServer::new(data(
        vec![("Alpha", movie("Alpha")), ("Beta", beta), ("Gamma", movie("Gamma"))],
        vec![],
    ))
    .document("/movies/alpha/metadata.json", movie_metadata("Alpha"))
    .document("/movies/beta/metadata.json", movie_metadata("Beta"))
    .document("/movies/gamma/metadata.json", movie_metadata("Gamma"))
    .blurhash("/movies/beta/poster.jpg", "LEHV6nWB2yk8");
    // Both delays exceed the 5s server timeout.
    let h = Harness::new(
        FakeRemoteClient::new()
            .with_server("server1", fake)
            .with_fetch_delay("/movies/alpha/metadata.json", Duration::from_secs(60))
            .with_fetch_delay("/movies/beta/poster.jpg", Duration::from_secs(60)),
    );
    let s1 = server("server1", 1);
    let availability = availability_for(&h.client, &[&s1]);
    let report = run(&h, &s1, &availability).await;

    assert_eq!(report.movies.created.len(), 3);
    let failures: Vec<(&str, Option<FieldKind>)> = report
        .movies
        .errors
        .iter()
        .map(|failure| (failure.title.as_str(), failure.field))
        .collect();
    assert_eq!(failures.len(), 2, "{failures:?}");
    assert!(failures.contains(&("Alpha", Some(FieldKind::Metadata))));
    assert!(failures.contains(&("Beta", Some(FieldKind::PosterBlurhash))));
    assert!(
        report
            .movies
            .errors
            .iter()
            .all(|failure| failure.error.contains("timed out"))
    );

    let catalog = snapshot(&h).await;
    let by_title = |title: &str| {
        catalog
            .all::<Movie>()
            .into_iter()
            .find(|movie| movie.original_title.as_str() == title)
            .expect("movie")
    };
    let alpha = by_title("Alpha");
    assert!(alpha.metadata.is_none());
    assert!(alpha.video.is_some());
    let beta = by_title("Beta");
    assert!(beta.metadata.is_some());
    assert!(beta.poster_blurhash.is_none());
    assert!(by_title("Gamma").metadata.is_some());
}

#[tokio::test]
async fn pass_leaves_no_creation_locks_behind() {
    let h = Harness::new(FakeRemoteClient::new().with_server("server1", single_server()));
    let s1 = server("server1", 1);
    let availability = availability_for(&h.client, &[&s1]);
    let report = run(&h, &s1, &availability).await;

    assert_eq!(report.performance.catalog.episodes, 3);
    assert_eq!(h.engine.repository().lock_count(), 0);
}
