//! Per-entity sync decisions: what changed and under which authority.

use std::fmt;

use flatsync_model::{CatalogEntity, FieldKind, FieldUpdate};
use serde::Serialize;

use crate::availability::Arbitration;

/// Natural address of a catalog entity, used in reports and logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EntityRef {
    Movie {
        title: String,
    },
    Show {
        title: String,
    },
    #[serde(rename_all = "camelCase")]
    Season {
        show_title: String,
        season_number: u32,
    },
    #[serde(rename_all = "camelCase")]
    Episode {
        show_title: String,
        season_number: u32,
        episode_number: u32,
    },
}

impl EntityRef {
    pub fn movie(title: impl Into<String>) -> Self {
        EntityRef::Movie {
            title: title.into(),
        }
    }

    pub fn show(title: impl Into<String>) -> Self {
        EntityRef::Show {
            title: title.into(),
        }
    }

    pub fn season(show_title: impl Into<String>, season_number: u32) -> Self {
        EntityRef::Season {
            show_title: show_title.into(),
            season_number,
        }
    }

    pub fn episode(
        show_title: impl Into<String>,
        season_number: u32,
        episode_number: u32,
    ) -> Self {
        EntityRef::Episode {
            show_title: show_title.into(),
            season_number,
            episode_number,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            EntityRef::Movie { title } | EntityRef::Show { title } => title,
            EntityRef::Season { show_title, .. }
            | EntityRef::Episode { show_title, .. } => show_title,
        }
    }

    pub fn season_number(&self) -> Option<u32> {
        match self {
            EntityRef::Season { season_number, .. }
            | EntityRef::Episode { season_number, .. } => Some(*season_number),
            _ => None,
        }
    }

    pub fn episode_number(&self) -> Option<u32> {
        match self {
            EntityRef::Episode { episode_number, .. } => Some(*episode_number),
            _ => None,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Movie { title } => write!(f, "movie '{title}'"),
            EntityRef::Show { title } => write!(f, "show '{title}'"),
            EntityRef::Season {
                show_title,
                season_number,
            } => write!(f, "'{show_title}' season {season_number}"),
            EntityRef::Episode {
                show_title,
                season_number,
                episode_number,
            } => write!(
                f,
                "'{show_title}' S{season_number:02}E{episode_number:02}"
            ),
        }
    }
}

/// One accepted field write.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub update: FieldUpdate,
    pub authority: Arbitration,
}

/// Everything the field synchronizers decided for one entity.
#[derive(Debug, Clone)]
pub struct SyncDecision {
    pub entity: EntityRef,
    pub changes: Vec<FieldChange>,
    /// Synchronizers that failed, as `(field, message)`.
    pub errors: Vec<(FieldKind, String)>,
}

impl SyncDecision {
    pub fn new(entity: EntityRef) -> Self {
        Self {
            entity,
            changes: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn push(&mut self, change: Option<FieldChange>) {
        if let Some(change) = change {
            self.changes.push(change);
        }
    }

    pub fn push_result(
        &mut self,
        kind: FieldKind,
        result: crate::Result<Option<FieldChange>>,
    ) {
        match result {
            Ok(change) => self.push(change),
            Err(err) => self.errors.push((kind, err.to_string())),
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changed_fields(&self) -> Vec<FieldKind> {
        self.changes.iter().map(|c| c.update.kind()).collect()
    }

    /// A content hash may be recorded only when this server was the
    /// top-ranked supplier of at least one field it changed.
    pub fn authorized_to_stamp_hash(&self) -> bool {
        self.changes.iter().any(|c| c.authority.is_authoritative())
    }

    /// Applies every change to `entity`; returns true if any took effect.
    pub fn apply_to<E: CatalogEntity>(&self, entity: &mut E) -> bool {
        let mut applied = false;
        for change in &self.changes {
            applied |= entity.apply(&change.update);
        }
        applied
    }
}
