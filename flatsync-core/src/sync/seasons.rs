use flatsync_model::{
    CatalogEntity, CatalogTitle, Episode, FieldKind, FieldPath, FieldUpdate,
    HashKey, MediaType, RemoteSeason, RemoteShow, Season, TvShow,
};
use futures::StreamExt;
use futures::stream;
use tracing::warn;

use super::commit::commit;
use super::decision::{EntityRef, SyncDecision};
use super::fields::{FieldContext, MetadataRef, sync_blurhash, sync_metadata, sync_url};
use super::parents::resolve_show;
use super::pass::{MetadataGate, PassContext};
use super::report::{EntityOutcome, EntityState, EntitySyncResults, SyncFailure};
use crate::catalog::document::{season_identity, season_natural};
use crate::remote::BlurhashKind;

pub(crate) async fn sync_seasons(pass: &PassContext<'_>) -> EntitySyncResults {
    let per_show: Vec<Vec<EntityOutcome>> = stream::iter(pass.data.tv.iter())
        .map(|(title, remote)| sync_show_seasons(pass, title, remote))
        .buffer_unordered(pass.settings.show_concurrency)
        .collect()
        .await;
    EntitySyncResults::from_outcomes(per_show.into_iter().flatten())
}

async fn sync_show_seasons(
    pass: &PassContext<'_>,
    raw_title: &str,
    remote: &RemoteShow,
) -> Vec<EntityOutcome> {
    if !remote.has_playable_episode() {
        return Vec::new();
    }
    if !pass.settings.batch_delay.is_zero() {
        tokio::time::sleep(pass.settings.batch_delay).await;
    }

    let show = match CatalogTitle::new(raw_title) {
        Ok(title) => resolve_show(pass, &title).await,
        Err(err) => Err(err.into()),
    };
    let show = match show {
        Ok(resolved) => resolved.into_inner(),
        Err(err) => {
            warn!(server = %pass.server.id, show = raw_title, error = %err, "skipping seasons of show");
            return vec![EntityOutcome::failed(EntityRef::show(raw_title), err)];
        }
    };

    let show = &show;
    stream::iter(
        remote
            .seasons
            .values()
            .filter(|season| season.has_playable_episode()),
    )
    .map(|season| sync_season(pass, raw_title, show, remote, season))
    .buffer_unordered(pass.settings.season_concurrency)
    .collect()
    .await
}

async fn sync_season(
    pass: &PassContext<'_>,
    raw_title: &str,
    show: &TvShow,
    remote_show: &RemoteShow,
    remote: &RemoteSeason,
) -> EntityOutcome {
    let season_number = remote.season_number;
    let entity = EntityRef::season(raw_title, season_number);
    let identity = season_identity(show.id, season_number);
    let natural = season_natural(&show.original_title, season_number);
    let _guard = pass.entity_locks.lock(natural.clone()).await;

    let cached = pass.snapshot.resolve::<Season>(&identity, &natural);
    let existing = match pass.load_current(cached, &natural).await {
        Ok(current) => current,
        Err(err) => return EntityOutcome::failed(entity, err),
    };
    let existing = match existing {
        Some(season) if season.show_id == show.id => Some(season),
        // Stale parent id: let the repository repair it in place.
        Some(_) => match pass
            .repository
            .create(Season::new(show, season_number))
            .await
        {
            Ok(resolved) => {
                let season = resolved.into_inner();
                pass.snapshot.upsert(season.clone());
                Some(season)
            }
            Err(err) => return EntityOutcome::failed(entity, err),
        },
        None => None,
    };

    let hash_key = HashKey::season(show.original_title.as_str(), season_number);
    let declared = pass
        .strategy
        .manifest()
        .and_then(|manifest| manifest.tv.get(raw_title))
        .and_then(|hashes| hashes.seasons.get(&season_number))
        .map(|hashes| hashes.hash.as_str());
    let ctx = pass.field_context(MediaType::Tv, raw_title);

    match existing {
        Some(season) => {
            let gate = pass
                .metadata_gate(hash_key.clone(), declared, || {
                    season_is_complete(pass, &season, remote)
                })
                .await;
            let decision = season_decision(
                &ctx,
                &season,
                remote_show,
                remote,
                gate.skip_metadata,
                entity.clone(),
            )
            .await;
            commit(pass, entity, season, false, decision, &gate, hash_key).await
        }
        None => {
            let gate = pass.metadata_gate(hash_key.clone(), declared, || false).await;
            let mut candidate = Season::new(show, season_number);
            let decision = season_decision(
                &ctx,
                &candidate,
                remote_show,
                remote,
                false,
                entity.clone(),
            )
            .await;
            decision.apply_to(&mut candidate);
            create_season(pass, entity, candidate, decision, &gate, hash_key).await
        }
    }
}

/// Persists a season the snapshot did not know, in a single upsert.
async fn create_season(
    pass: &PassContext<'_>,
    entity: EntityRef,
    candidate: Season,
    decision: SyncDecision,
    gate: &MetadataGate,
    hash_key: HashKey,
) -> EntityOutcome {
    let mut outcome = EntityOutcome::new(entity.clone(), EntityState::Created);
    outcome.failures = decision
        .errors
        .iter()
        .map(|(kind, err)| SyncFailure::for_field(&entity, *kind, err))
        .collect();

    match pass.repository.upsert_resolving_id(candidate).await {
        Ok(resolved) => {
            if !resolved.is_new() {
                outcome.state = EntityState::Updated;
            }
            pass.snapshot.upsert(resolved.into_inner());
            pass.stamp(hash_key, gate, &decision);
            outcome.fields = decision.changed_fields();
        }
        Err(err) => {
            outcome.state = EntityState::Failed;
            outcome.failures.push(SyncFailure::new(&entity, err));
        }
    }
    outcome
}

/// Season metadata is present and every playable episode the server lists
/// is in the catalog with metadata.
fn season_is_complete(
    pass: &PassContext<'_>,
    season: &Season,
    remote: &RemoteSeason,
) -> bool {
    if !season.has_metadata() {
        return false;
    }
    let expected = remote
        .episodes
        .values()
        .filter(|episode| episode.has_video())
        .count();
    let episodes: Vec<Episode> = pass.snapshot.children_of(season.id.to_uuid());
    episodes.len() >= expected && episodes.iter().all(Episode::has_metadata)
}

async fn season_decision(
    ctx: &FieldContext<'_>,
    season: &Season,
    remote_show: &RemoteShow,
    remote: &RemoteSeason,
    skip_metadata: bool,
    entity: EntityRef,
) -> SyncDecision {
    let n = remote.season_number;
    let mut decision = SyncDecision::new(entity);

    decision.push(sync_url(
        ctx,
        season,
        FieldPath::season(n, FieldKind::Poster),
        season.poster.as_ref(),
        remote.season_poster.as_deref(),
        FieldUpdate::Poster,
    ));

    let source = match (remote.metadata.as_deref(), remote_show.metadata.as_deref()) {
        (Some(own), _) if !own.is_empty() => Some(MetadataRef::Document(own)),
        (_, Some(show_path)) => Some(MetadataRef::ShowSeason {
            show_path,
            season_number: n,
        }),
        _ => None,
    };
    let metadata = async {
        if skip_metadata {
            return Ok(None);
        }
        sync_metadata(
            ctx,
            season,
            FieldPath::season(n, FieldKind::Metadata),
            season.metadata.as_ref(),
            source,
        )
        .await
    };
    let poster_blurhash = sync_blurhash(
        ctx,
        season,
        FieldPath::season(n, FieldKind::PosterBlurhash),
        season.poster_blurhash.as_ref(),
        remote.season_poster_blurhash.as_deref(),
        BlurhashKind::SeasonPoster,
        FieldUpdate::PosterBlurhash,
    );
    let (metadata, poster_blurhash) = tokio::join!(metadata, poster_blurhash);

    decision.push_result(FieldKind::Metadata, metadata);
    decision.push_result(FieldKind::PosterBlurhash, poster_blurhash);
    decision
}
