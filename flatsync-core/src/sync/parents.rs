//! Parent resolution for the season and episode phases.
//!
//! A child can reach the catalog before its parent did (the parent's own
//! phase failed or skipped it); the parent is then synthesized on the fly.

use flatsync_model::{CatalogTitle, Season, TvShow};
use tracing::info;

use super::pass::PassContext;
use crate::catalog::Resolved;
use crate::catalog::document::{season_identity, season_natural, show_key};
use crate::error::Result;

pub(crate) async fn resolve_show(
    pass: &PassContext<'_>,
    title: &CatalogTitle,
) -> Result<Resolved<TvShow>> {
    let key = show_key(title);
    if let Some(show) = pass.snapshot.by_natural_key::<TvShow>(&key) {
        return Ok(Resolved::Found(show));
    }

    let _guard = pass.entity_locks.lock(key.clone()).await;
    if let Some(show) = pass.snapshot.by_natural_key::<TvShow>(&key) {
        return Ok(Resolved::Found(show));
    }

    let resolved = pass
        .repository
        .create(TvShow::new(title.clone()))
        .await?
        .synthesized();
    if resolved.is_new() {
        info!(server = %pass.server.id, show = %title, "synthesized missing show");
    }
    pass.snapshot.upsert(resolved.get().clone());
    Ok(resolved)
}

pub(crate) async fn resolve_season(
    pass: &PassContext<'_>,
    show: &TvShow,
    season_number: u32,
) -> Result<Resolved<Season>> {
    let identity = season_identity(show.id, season_number);
    let natural = season_natural(&show.original_title, season_number);
    if let Some(season) = pass.snapshot.by_identity::<Season>(&identity) {
        return Ok(Resolved::Found(season));
    }

    let _guard = pass.entity_locks.lock(natural.clone()).await;
    if let Some(season) = pass.snapshot.by_identity::<Season>(&identity) {
        return Ok(Resolved::Found(season));
    }

    // Covers both a missing season and one whose show id went stale.
    let resolved = pass
        .repository
        .create(Season::new(show, season_number))
        .await?
        .synthesized();
    if resolved.is_new() {
        info!(
            server = %pass.server.id,
            show = %show.original_title,
            season = season_number,
            "synthesized missing season"
        );
    }
    pass.snapshot.upsert(resolved.get().clone());
    Ok(resolved)
}
