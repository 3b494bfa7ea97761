//! Shared fakes and fixtures for core integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flatsync_core::database::{
    CacheInvalidator, CatalogStore, ContentHashStore, InMemoryCatalogStore,
    InMemoryContentHashStore,
};
use flatsync_core::remote::{
    BlurhashKind, CATALOG_PATH, HASHES_PATH, RemoteServerClient,
};
use flatsync_core::{Result, SyncEngine, SyncError, SyncSettings};
use flatsync_model::{
    HashManifest, MediaType, RemoteEpisode, RemoteMovie, RemoteMovieUrls,
    RemoteSeason, RemoteServerData, RemoteShow, ServerConfig, ServerId,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// What one fake file server exposes.
#[derive(Debug, Clone, Default)]
pub struct FakeServer {
    pub data: RemoteServerData,
    pub documents: HashMap<String, Value>,
    pub blurhashes: HashMap<String, String>,
    pub manifest: Option<HashManifest>,
    pub offline: bool,
}

impl FakeServer {
    pub fn new(data: RemoteServerData) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn document(mut self, path: &str, body: Value) -> Self {
        self.documents.insert(path.to_string(), body);
        self
    }

    pub fn blurhash(mut self, reference: &str, hash: &str) -> Self {
        self.blurhashes
            .insert(reference.to_string(), hash.to_string());
        self
    }

    pub fn manifest(mut self, manifest: HashManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }
}

/// In-process stand-in for the file servers, counting every fetch.
#[derive(Debug, Default)]
pub struct FakeRemoteClient {
    servers: Mutex<HashMap<ServerId, FakeServer>>,
    fetches: Mutex<HashMap<(ServerId, String), usize>>,
    blurhash_fetches: Mutex<HashMap<ServerId, usize>>,
    probe_delay: Option<Duration>,
    fetch_delays: HashMap<String, Duration>,
}

impl FakeRemoteClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(self, id: &str, server: FakeServer) -> Self {
        self.servers.lock().insert(ServerId::new(id), server);
        self
    }

    /// Every probe sleeps this long before answering.
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = Some(delay);
        self
    }

    /// Fetches of `path` (a document path or blurhash reference) sleep
    /// this long before answering.
    pub fn with_fetch_delay(mut self, path: &str, delay: Duration) -> Self {
        self.fetch_delays.insert(path.to_string(), delay);
        self
    }

    pub fn update(&self, id: &str, f: impl FnOnce(&mut FakeServer)) {
        let mut servers = self.servers.lock();
        f(servers.entry(ServerId::new(id)).or_default());
    }

    pub fn data(&self, id: &str) -> RemoteServerData {
        self.servers
            .lock()
            .get(&ServerId::new(id))
            .map(|server| server.data.clone())
            .unwrap_or_default()
    }

    pub fn fetch_count(&self, id: &str, path: &str) -> usize {
        self.fetches
            .lock()
            .get(&(ServerId::new(id), path.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn blurhash_count(&self, id: &str) -> usize {
        self.blurhash_fetches
            .lock()
            .get(&ServerId::new(id))
            .copied()
            .unwrap_or(0)
    }

    pub fn reset_counts(&self) {
        self.fetches.lock().clear();
        self.blurhash_fetches.lock().clear();
    }

    async fn delay(&self, path: &str) {
        if let Some(delay) = self.fetch_delays.get(path) {
            tokio::time::sleep(*delay).await;
        }
    }

    fn server(&self, id: &ServerId) -> Result<FakeServer> {
        match self.servers.lock().get(id) {
            Some(server) if !server.offline => Ok(server.clone()),
            _ => Err(SyncError::remote(id, "connection refused")),
        }
    }
}

#[async_trait]
impl RemoteServerClient for FakeRemoteClient {
    async fn probe(&self, server: &ServerConfig, path: &str) -> bool {
        if let Some(delay) = self.probe_delay {
            tokio::time::sleep(delay).await;
        }
        self.server(&server.id)
            .is_ok_and(|fake| path == HASHES_PATH && fake.manifest.is_some())
    }

    async fn fetch_json(
        &self,
        server: &ServerConfig,
        path: &str,
    ) -> Result<Value> {
        *self
            .fetches
            .lock()
            .entry((server.id.clone(), path.to_string()))
            .or_default() += 1;
        self.delay(path).await;
        let fake = self.server(&server.id)?;
        match path {
            CATALOG_PATH => Ok(serde_json::to_value(&fake.data)?),
            HASHES_PATH => match fake.manifest {
                Some(manifest) => Ok(serde_json::to_value(manifest)?),
                None => Err(SyncError::remote(&server.id, "404 Not Found")),
            },
            _ => fake.documents.get(path).cloned().ok_or_else(|| {
                SyncError::remote(&server.id, format!("404 Not Found: {path}"))
            }),
        }
    }

    async fn fetch_blurhash(
        &self,
        server: &ServerConfig,
        reference: &str,
        _kind: BlurhashKind,
        _media_type: MediaType,
        _title: &str,
    ) -> Result<String> {
        *self
            .blurhash_fetches
            .lock()
            .entry(server.id.clone())
            .or_default() += 1;
        self.delay(reference).await;
        let fake = self.server(&server.id)?;
        fake.blurhashes.get(reference).cloned().ok_or_else(|| {
            SyncError::remote(&server.id, format!("no blurhash for {reference}"))
        })
    }
}

/// Records every invalidation request.
#[derive(Debug, Default)]
pub struct RecordingInvalidator {
    pub patterns: Mutex<Vec<String>>,
}

#[async_trait]
impl CacheInvalidator for RecordingInvalidator {
    async fn invalidate(&self, patterns: &[String]) -> Result<()> {
        self.patterns.lock().extend_from_slice(patterns);
        Ok(())
    }
}

/// Stores, client and engine wired together over in-memory adapters.
pub struct Harness {
    pub store: Arc<InMemoryCatalogStore>,
    pub hashes: Arc<InMemoryContentHashStore>,
    pub client: Arc<FakeRemoteClient>,
    pub engine: SyncEngine,
}

impl Harness {
    pub fn new(client: FakeRemoteClient) -> Self {
        Self::with_settings(client, SyncSettings::default())
    }

    pub fn with_settings(client: FakeRemoteClient, settings: SyncSettings) -> Self {
        let store = Arc::new(InMemoryCatalogStore::new());
        let hashes = Arc::new(InMemoryContentHashStore::new());
        let client = Arc::new(client);
        let engine = SyncEngine::new(
            Arc::clone(&store) as Arc<dyn CatalogStore>,
            Arc::clone(&hashes) as Arc<dyn ContentHashStore>,
            Arc::clone(&client) as Arc<dyn RemoteServerClient>,
            settings,
        );
        Self {
            store,
            hashes,
            client,
            engine,
        }
    }
}

pub fn server(id: &str, priority: u32) -> ServerConfig {
    ServerConfig::new(
        id,
        priority,
        format!("http://{id}.local"),
        Duration::from_secs(5),
    )
}

fn slug(title: &str) -> String {
    title.to_lowercase().replace(' ', "-")
}

pub fn movie(title: &str) -> RemoteMovie {
    let slug = slug(title);
    RemoteMovie {
        urls: RemoteMovieUrls {
            mp4: Some(format!("/movies/{slug}/video.mp4")),
            metadata: Some(format!("/movies/{slug}/metadata.json")),
            poster: Some(format!("/movies/{slug}/poster.jpg")),
            ..RemoteMovieUrls::default()
        },
        video_info: None,
    }
}

pub fn movie_metadata(title: &str) -> Value {
    json!({ "title": title, "overview": format!("About {title}") })
}

pub fn episode(show: &str, season: u32, number: u32) -> RemoteEpisode {
    let slug = slug(show);
    RemoteEpisode {
        episode_number: number,
        video_url: Some(format!("/tv/{slug}/s{season}/e{number}.mp4")),
        metadata: Some(format!("/tv/{slug}/s{season}/e{number}.json")),
        thumbnail: Some(format!("/tv/{slug}/s{season}/e{number}.jpg")),
        ..RemoteEpisode::default()
    }
}

/// Show with the given `(season, episodes)` layout; every episode playable.
pub fn show(title: &str, layout: &[(u32, u32)]) -> RemoteShow {
    let slug = slug(title);
    let seasons = layout
        .iter()
        .map(|&(season, episodes)| {
            let episodes: BTreeMap<String, RemoteEpisode> = (1..=episodes)
                .map(|e| (format!("S{season:02}E{e:02}"), episode(title, season, e)))
                .collect();
            (
                format!("Season {season}"),
                RemoteSeason {
                    season_number: season,
                    season_poster: Some(format!("/tv/{slug}/s{season}/poster.jpg")),
                    episodes,
                    ..RemoteSeason::default()
                },
            )
        })
        .collect();
    RemoteShow {
        metadata: Some(format!("/tv/{slug}/metadata.json")),
        poster: Some(format!("/tv/{slug}/poster.jpg")),
        seasons,
        ..RemoteShow::default()
    }
}

/// Metadata documents for a show built by [`show`], including its seasons
/// array and one document per episode.
pub fn show_documents(
    mut server: FakeServer,
    title: &str,
    layout: &[(u32, u32)],
) -> FakeServer {
    let slug = slug(title);
    let seasons: Vec<Value> = layout
        .iter()
        .map(|&(season, episodes)| {
            json!({
                "season_number": season,
                "name": format!("Season {season}"),
                "episodes": (1..=episodes).collect::<Vec<u32>>(),
            })
        })
        .collect();
    server = server.document(
        &format!("/tv/{slug}/metadata.json"),
        json!({ "name": title, "status": "Ended", "seasons": seasons }),
    );
    for &(season, episodes) in layout {
        for e in 1..=episodes {
            server = server.document(
                &format!("/tv/{slug}/s{season}/e{e}.json"),
                json!({ "name": format!("Episode {e}"), "episode_number": e }),
            );
        }
    }
    server
}

pub fn data(
    movies: Vec<(&str, RemoteMovie)>,
    shows: Vec<(&str, RemoteShow)>,
) -> RemoteServerData {
    RemoteServerData {
        movies: movies
            .into_iter()
            .map(|(title, movie)| (title.to_string(), movie))
            .collect(),
        tv: shows
            .into_iter()
            .map(|(title, show)| (title.to_string(), show))
            .collect(),
    }
}
