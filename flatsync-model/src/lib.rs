//! Core data model definitions shared across flatsync crates.
#![allow(missing_docs)]

pub mod availability;
pub mod error;
pub mod field;
pub mod hash;
pub mod ids;
pub mod media;
pub mod media_type;
pub mod remote;
pub mod server;
pub mod sourced;
pub mod titles;

// Intentionally curated re-exports for downstream consumers.
pub use availability::{FieldAvailability, TitleRankings};
pub use error::{ModelError, Result as ModelResult};
pub use field::{FieldKind, FieldPath, FieldScope, parse_episode_code};
pub use hash::{ContentHash, HashKey};
pub use ids::{EpisodeID, MovieID, SeasonID, ShowID};
pub use media::{
    Caption, CatalogEntity, Episode, FieldUpdate, Metadata, Movie, Season,
    TvShow, VideoInfo,
};
pub use media_type::MediaType;
pub use remote::{
    HashManifest, RemoteCaption, RemoteEpisode, RemoteMovie, RemoteMovieUrls,
    RemoteSeason, RemoteServerData, RemoteShow, SeasonHashes, ShowHashes,
};
pub use server::{ServerConfig, ServerId, normalize_video_id};
pub use sourced::Sourced;
pub use titles::CatalogTitle;
