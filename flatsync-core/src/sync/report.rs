use std::time::Duration;

use flatsync_model::{FieldKind, ServerId};
use serde::Serialize;

use super::decision::EntityRef;
use crate::catalog::CatalogCounts;
use crate::remote::FetchCounters;

/// Failure of one entity (or one field of it) during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldKind>,
    pub error: String,
}

impl SyncFailure {
    pub fn new(entity: &EntityRef, error: impl ToString) -> Self {
        Self {
            title: entity.title().to_string(),
            season_number: entity.season_number(),
            episode_number: entity.episode_number(),
            field: None,
            error: error.to_string(),
        }
    }

    pub fn for_field(
        entity: &EntityRef,
        field: FieldKind,
        error: impl ToString,
    ) -> Self {
        Self {
            field: Some(field),
            ..Self::new(entity, error)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Created,
    Updated,
    Unchanged,
    /// Nothing to do for this entity on this server.
    Skipped,
    Failed,
}

/// Result of syncing one entity.
#[derive(Debug, Clone)]
pub struct EntityOutcome {
    pub entity: EntityRef,
    pub state: EntityState,
    pub fields: Vec<FieldKind>,
    pub failures: Vec<SyncFailure>,
    pub metadata_skipped_by_hash: bool,
}

impl EntityOutcome {
    pub fn new(entity: EntityRef, state: EntityState) -> Self {
        Self {
            entity,
            state,
            fields: Vec::new(),
            failures: Vec::new(),
            metadata_skipped_by_hash: false,
        }
    }

    pub fn skipped(entity: EntityRef) -> Self {
        Self::new(entity, EntityState::Skipped)
    }

    pub fn failed(entity: EntityRef, error: impl ToString) -> Self {
        let failure = SyncFailure::new(&entity, error);
        Self {
            failures: vec![failure],
            ..Self::new(entity, EntityState::Failed)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedEntity {
    pub entity: EntityRef,
    pub fields: Vec<FieldKind>,
}

/// Per-entity-type results of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySyncResults {
    pub created: Vec<EntityRef>,
    pub updated: Vec<UpdatedEntity>,
    pub unchanged: usize,
    pub skipped: usize,
    pub hash_skips: usize,
    pub errors: Vec<SyncFailure>,
}

impl EntitySyncResults {
    pub fn record(&mut self, outcome: EntityOutcome) {
        if outcome.metadata_skipped_by_hash {
            self.hash_skips += 1;
        }
        match outcome.state {
            EntityState::Created => self.created.push(outcome.entity),
            EntityState::Updated => self.updated.push(UpdatedEntity {
                entity: outcome.entity,
                fields: outcome.fields,
            }),
            EntityState::Unchanged => self.unchanged += 1,
            EntityState::Skipped => self.skipped += 1,
            EntityState::Failed => {}
        }
        self.errors.extend(outcome.failures);
    }

    pub fn from_outcomes(outcomes: impl IntoIterator<Item = EntityOutcome>) -> Self {
        let mut results = Self::default();
        for outcome in outcomes {
            results.record(outcome);
        }
        results
    }

    pub fn merge(&mut self, other: EntitySyncResults) {
        self.created.extend(other.created);
        self.updated.extend(other.updated);
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.hash_skips += other.hash_skips;
        self.errors.extend(other.errors);
    }

    /// Created or updated entity count.
    pub fn changed(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategyKind {
    HashBased,
    Traditional,
}

/// Timing and fetch statistics of one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
    pub strategy: StrategyKind,
    pub total_ms: u64,
    pub snapshot_ms: u64,
    pub movies_and_shows_ms: u64,
    pub seasons_ms: u64,
    pub episodes_ms: u64,
    pub fetches: FetchCounters,
    pub hashes_stored: usize,
    pub catalog: CatalogCounts,
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Everything one `sync_all` call did for one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub server_id: ServerId,
    pub movies: EntitySyncResults,
    pub tv_shows: EntitySyncResults,
    pub seasons: EntitySyncResults,
    pub episodes: EntitySyncResults,
    pub performance: PerformanceStats,
}

impl SyncReport {
    pub fn error_count(&self) -> usize {
        self.movies.errors.len()
            + self.tv_shows.errors.len()
            + self.seasons.errors.len()
            + self.episodes.errors.len()
    }

    pub fn changed_count(&self) -> usize {
        self.movies.changed()
            + self.tv_shows.changed()
            + self.seasons.changed()
            + self.episodes.changed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_counts_update_and_error() {
        let entity = EntityRef::episode("Show Y", 1, 5);
        let mut outcome = EntityOutcome::new(entity.clone(), EntityState::Updated);
        outcome.fields = vec![FieldKind::VideoUrl];
        outcome
            .failures
            .push(SyncFailure::for_field(&entity, FieldKind::ThumbnailBlurhash, "timeout"));

        let results = EntitySyncResults::from_outcomes([
            outcome,
            EntityOutcome::new(EntityRef::episode("Show Y", 1, 6), EntityState::Unchanged),
        ]);

        assert_eq!(results.updated.len(), 1);
        assert_eq!(results.unchanged, 1);
        assert_eq!(results.errors.len(), 1);
        assert_eq!(results.errors[0].episode_number, Some(5));
    }

    #[test]
    fn failure_serializes_with_entity_coordinates() {
        let failure = SyncFailure::new(&EntityRef::season("Show Y", 2), "boom");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["title"], "Show Y");
        assert_eq!(json["seasonNumber"], 2);
        assert!(json.get("episodeNumber").is_none());
    }
}
