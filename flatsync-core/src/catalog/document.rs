//! Identity and natural-key shapes of the four catalog collections.

use std::fmt::{Debug, Display};
use std::hash::Hash;

use flatsync_model::{
    CatalogEntity, CatalogTitle, Episode, Movie, Season, SeasonID, ShowID,
    TvShow,
};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::database::ports::catalog::{CatalogStore, DocumentCollection};

const KEY_SEPARATOR: char = '\u{1f}';

/// A document stored in one flat collection.
///
/// `identity_key` is the unique compound key enforced by the store (the fast,
/// id-based path); `natural_key` is the title-based fallback used to find a
/// record whose parent ids went stale.
pub trait CatalogDocument:
    CatalogEntity
    + Clone
    + PartialEq
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    type Id: Copy + Eq + Hash + Debug + Display + Into<Uuid> + Send + Sync + 'static;

    const COLLECTION: &'static str;

    fn id(&self) -> Self::Id;

    fn identity_key(&self) -> String;

    fn natural_key(&self) -> String;

    /// Parent and grandparent ids, used for cascade lookups.
    fn ancestor_ids(&self) -> Vec<Uuid>;

    /// Copies parent ids from `candidate`; returns true when anything changed.
    fn repair_ids_from(&mut self, candidate: &Self) -> bool;

    /// Takes over the stored document's own id and creation time.
    fn adopt_identity(&mut self, existing: &Self);

    fn collection(store: &dyn CatalogStore) -> &dyn DocumentCollection<Self>;
}

pub fn movie_key(title: &CatalogTitle) -> String {
    format!("movie{KEY_SEPARATOR}{title}")
}

pub fn show_key(title: &CatalogTitle) -> String {
    format!("show{KEY_SEPARATOR}{title}")
}

pub fn season_identity(show_id: ShowID, season_number: u32) -> String {
    format!("{show_id}{KEY_SEPARATOR}{season_number}")
}

pub fn season_natural(show_title: &CatalogTitle, season_number: u32) -> String {
    format!("{show_title}{KEY_SEPARATOR}{season_number}")
}

pub fn episode_identity(
    show_id: ShowID,
    season_id: SeasonID,
    episode_number: u32,
) -> String {
    format!("{show_id}{KEY_SEPARATOR}{season_id}{KEY_SEPARATOR}{episode_number}")
}

pub fn episode_natural(
    show_title: &CatalogTitle,
    season_number: u32,
    episode_number: u32,
) -> String {
    format!(
        "{show_title}{KEY_SEPARATOR}{season_number}{KEY_SEPARATOR}{episode_number}"
    )
}

impl CatalogDocument for Movie {
    type Id = flatsync_model::MovieID;

    const COLLECTION: &'static str = "movies";

    fn id(&self) -> Self::Id {
        self.id
    }

    fn identity_key(&self) -> String {
        movie_key(&self.original_title)
    }

    fn natural_key(&self) -> String {
        movie_key(&self.original_title)
    }

    fn ancestor_ids(&self) -> Vec<Uuid> {
        Vec::new()
    }

    fn repair_ids_from(&mut self, _candidate: &Self) -> bool {
        false
    }

    fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
        self.created_at = existing.created_at;
    }

    fn collection(store: &dyn CatalogStore) -> &dyn DocumentCollection<Self> {
        store.movies()
    }
}

impl CatalogDocument for TvShow {
    type Id = ShowID;

    const COLLECTION: &'static str = "tv_shows";

    fn id(&self) -> Self::Id {
        self.id
    }

    fn identity_key(&self) -> String {
        show_key(&self.original_title)
    }

    fn natural_key(&self) -> String {
        show_key(&self.original_title)
    }

    fn ancestor_ids(&self) -> Vec<Uuid> {
        Vec::new()
    }

    fn repair_ids_from(&mut self, _candidate: &Self) -> bool {
        false
    }

    fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
        self.created_at = existing.created_at;
    }

    fn collection(store: &dyn CatalogStore) -> &dyn DocumentCollection<Self> {
        store.shows()
    }
}

impl CatalogDocument for Season {
    type Id = SeasonID;

    const COLLECTION: &'static str = "seasons";

    fn id(&self) -> Self::Id {
        self.id
    }

    fn identity_key(&self) -> String {
        season_identity(self.show_id, self.season_number)
    }

    fn natural_key(&self) -> String {
        season_natural(&self.show_title, self.season_number)
    }

    fn ancestor_ids(&self) -> Vec<Uuid> {
        vec![self.show_id.to_uuid()]
    }

    fn repair_ids_from(&mut self, candidate: &Self) -> bool {
        if self.show_id == candidate.show_id {
            return false;
        }
        self.show_id = candidate.show_id;
        true
    }

    fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
        self.created_at = existing.created_at;
    }

    fn collection(store: &dyn CatalogStore) -> &dyn DocumentCollection<Self> {
        store.seasons()
    }
}

impl CatalogDocument for Episode {
    type Id = flatsync_model::EpisodeID;

    const COLLECTION: &'static str = "episodes";

    fn id(&self) -> Self::Id {
        self.id
    }

    fn identity_key(&self) -> String {
        episode_identity(self.show_id, self.season_id, self.episode_number)
    }

    fn natural_key(&self) -> String {
        episode_natural(
            &self.show_title,
            self.season_number,
            self.episode_number,
        )
    }

    fn ancestor_ids(&self) -> Vec<Uuid> {
        vec![self.season_id.to_uuid(), self.show_id.to_uuid()]
    }

    fn repair_ids_from(&mut self, candidate: &Self) -> bool {
        if self.show_id == candidate.show_id
            && self.season_id == candidate.season_id
        {
            return false;
        }
        self.show_id = candidate.show_id;
        self.season_id = candidate.season_id;
        true
    }

    fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
        self.created_at = existing.created_at;
    }

    fn collection(store: &dyn CatalogStore) -> &dyn DocumentCollection<Self> {
        store.episodes()
    }
}
