//! Field synchronizers.
//!
//! Every synchronizer runs the same gate before doing any work: the remote
//! must supply the field, the field must not be locked, and the arbitration
//! check must allow this server to write it. Only then is the candidate
//! resolved (URL join, metadata fetch, blurhash lookup) and compared with
//! the stored value; an equal value from the same server yields no change.

use std::collections::BTreeMap;

use flatsync_model::{
    Caption, CatalogEntity, FieldPath, FieldScope, FieldUpdate, MediaType,
    Metadata, RemoteCaption, ServerId, Sourced, VideoInfo,
};
use serde_json::Value;
use tracing::trace;

use super::decision::FieldChange;
use crate::availability::{Arbitration, FieldAvailabilityIndex};
use crate::error::Result;
use crate::remote::{BlurhashKind, PassFetcher};

/// Where an entity's metadata payload comes from.
#[derive(Debug, Clone, Copy)]
pub enum MetadataRef<'a> {
    /// A document of its own.
    Document(&'a str),
    /// An entry of the show payload's `seasons` array.
    ShowSeason { show_path: &'a str, season_number: u32 },
}

/// Per-title context shared by the synchronizers of one entity.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub fetcher: &'a PassFetcher,
    pub availability: FieldAvailabilityIndex<'a>,
    pub media_type: MediaType,
    /// Title as keyed in the server data and availability map.
    pub title: &'a str,
}

impl<'a> FieldContext<'a> {
    pub fn server(&self) -> &'a ServerId {
        &self.fetcher.server().id
    }

    /// Lock filter and arbitration; `None` means the field is off limits.
    pub fn gate<E: CatalogEntity>(
        &self,
        entity: &E,
        path: &FieldPath,
    ) -> Option<Arbitration> {
        if entity.is_locked(path.kind) {
            trace!(title = self.title, %path, "field locked");
            return None;
        }
        let arbitration = self.availability.arbitrate(
            self.media_type,
            self.title,
            path,
            self.server(),
            entity.field_source(path.kind),
        );
        if !arbitration.allows_write() {
            trace!(title = self.title, %path, server = %self.server(), "write denied");
            return None;
        }
        Some(arbitration)
    }

    fn change<T: PartialEq>(
        &self,
        current: Option<&Sourced<T>>,
        candidate: T,
        authority: Arbitration,
        wrap: fn(Sourced<T>) -> FieldUpdate,
    ) -> Option<FieldChange> {
        if current.is_some_and(|c| c.matches(&candidate, self.server())) {
            return None;
        }
        Some(FieldChange {
            update: wrap(Sourced::new(candidate, self.server().clone())),
            authority,
        })
    }
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.filter(|value| !value.trim().is_empty())
}

/// Server-relative URL fields: video, poster, backdrop, logo, thumbnail,
/// chapters.
pub fn sync_url<E: CatalogEntity>(
    ctx: &FieldContext<'_>,
    entity: &E,
    path: FieldPath,
    current: Option<&Sourced<String>>,
    raw: Option<&str>,
    wrap: fn(Sourced<String>) -> FieldUpdate,
) -> Option<FieldChange> {
    let raw = non_empty(raw)?;
    let authority = ctx.gate(entity, &path)?;
    let candidate = ctx.fetcher.server().resolve_url(raw);
    ctx.change(current, candidate, authority, wrap)
}

pub async fn sync_blurhash<E: CatalogEntity>(
    ctx: &FieldContext<'_>,
    entity: &E,
    path: FieldPath,
    current: Option<&Sourced<String>>,
    reference: Option<&str>,
    kind: BlurhashKind,
    wrap: fn(Sourced<String>) -> FieldUpdate,
) -> Result<Option<FieldChange>> {
    let Some(reference) = non_empty(reference) else {
        return Ok(None);
    };
    let Some(authority) = ctx.gate(entity, &path) else {
        return Ok(None);
    };
    let blurhash = ctx
        .fetcher
        .blurhash(reference, kind, ctx.media_type, ctx.title)
        .await?;
    Ok(ctx.change(current, blurhash, authority, wrap))
}

pub async fn sync_metadata<E: CatalogEntity>(
    ctx: &FieldContext<'_>,
    entity: &E,
    path: FieldPath,
    current: Option<&Sourced<Metadata>>,
    source: Option<MetadataRef<'_>>,
) -> Result<Option<FieldChange>> {
    let Some(source) = source else {
        return Ok(None);
    };
    let Some(authority) = ctx.gate(entity, &path) else {
        return Ok(None);
    };

    let candidate = match source {
        MetadataRef::Document(reference) => match non_empty(Some(reference)) {
            Some(reference) => ctx.fetcher.metadata(reference).await?,
            None => return Ok(None),
        },
        MetadataRef::ShowSeason {
            show_path,
            season_number,
        } => {
            let show = ctx.fetcher.metadata(show_path).await?;
            match season_entry(&show, season_number) {
                Some(season) => season,
                None => return Ok(None),
            }
        }
    };
    if candidate.is_empty() {
        return Ok(None);
    }

    // Seasons store their payload without the per-episode list.
    let candidate = match path.scope {
        FieldScope::Season { .. } => candidate.without_key("episodes"),
        _ => candidate,
    };

    if let Some(current) = current
        && current.is_from(ctx.server())
        && is_older(&candidate, &current.value)
    {
        trace!(title = ctx.title, %path, "remote metadata older than stored");
        return Ok(None);
    }

    Ok(ctx.change(current, candidate, authority, FieldUpdate::Metadata))
}

fn is_older(candidate: &Metadata, stored: &Metadata) -> bool {
    match (candidate.last_updated(), stored.last_updated()) {
        (Some(candidate), Some(stored)) => candidate < stored,
        _ => false,
    }
}

/// Picks the `seasons[]` entry for `season_number` out of a show payload.
pub fn season_entry(show: &Metadata, season_number: u32) -> Option<Metadata> {
    show.as_value()
        .get("seasons")?
        .as_array()?
        .iter()
        .find(|season| {
            season.get("season_number").and_then(Value::as_u64)
                == Some(u64::from(season_number))
        })
        .cloned()
        .map(Metadata::new)
}

pub fn sync_captions<E: CatalogEntity>(
    ctx: &FieldContext<'_>,
    entity: &E,
    path: FieldPath,
    current: Option<&Sourced<Vec<Caption>>>,
    subtitles: &BTreeMap<String, RemoteCaption>,
) -> Option<FieldChange> {
    if subtitles.is_empty() {
        return None;
    }
    let authority = ctx.gate(entity, &path)?;
    let server = ctx.fetcher.server();
    let candidate: Vec<Caption> = subtitles
        .iter()
        .filter(|(_, caption)| !caption.url.is_empty())
        .map(|(label, caption)| Caption {
            label: label.clone(),
            url: server.resolve_url(&caption.url),
            srclang: caption.srclang.clone(),
        })
        .collect();
    if candidate.is_empty() {
        return None;
    }
    ctx.change(current, candidate, authority, FieldUpdate::Captions)
}

pub fn sync_video_info<E: CatalogEntity>(
    ctx: &FieldContext<'_>,
    entity: &E,
    path: FieldPath,
    current: Option<&Sourced<VideoInfo>>,
    info: Option<&VideoInfo>,
) -> Option<FieldChange> {
    let info = info.filter(|info| !info.is_empty())?;
    let authority = ctx.gate(entity, &path)?;
    ctx.change(current, info.clone(), authority, FieldUpdate::VideoInfo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn season_entry_matches_by_number() {
        let show = Metadata::new(json!({
            "name": "Show Y",
            "seasons": [
                { "season_number": 1, "name": "Season 1" },
                { "season_number": 2, "name": "Season 2", "episodes": [] }
            ]
        }));
        let season = season_entry(&show, 2).unwrap();
        assert_eq!(season.get_str("name"), Some("Season 2"));
        assert!(season_entry(&show, 3).is_none());
    }

    #[test]
    fn older_payload_is_detected() {
        let older = Metadata::new(json!({"last_updated": "2024-01-01T00:00:00Z"}));
        let newer = Metadata::new(json!({"last_updated": "2024-06-01T00:00:00Z"}));
        assert!(is_older(&older, &newer));
        assert!(!is_older(&newer, &older));
        assert!(!is_older(&Metadata::new(json!({})), &newer));
    }
}
