use flatsync_model::{
    CatalogEntity, CatalogTitle, FieldKind, FieldPath, FieldUpdate, HashKey,
    MediaType, RemoteShow, Season, TvShow,
};
use futures::StreamExt;
use futures::stream;

use super::commit::commit;
use super::decision::{EntityRef, SyncDecision};
use super::fields::{FieldContext, MetadataRef, sync_blurhash, sync_metadata, sync_url};
use super::pass::PassContext;
use super::report::{EntityOutcome, EntitySyncResults};
use crate::catalog::document::show_key;
use crate::remote::BlurhashKind;

pub(crate) async fn sync_shows(pass: &PassContext<'_>) -> EntitySyncResults {
    let outcomes: Vec<EntityOutcome> = stream::iter(pass.data.tv.iter())
        .map(|(title, remote)| sync_show(pass, title, remote))
        .buffer_unordered(pass.settings.show_concurrency)
        .collect()
        .await;
    EntitySyncResults::from_outcomes(outcomes)
}

async fn sync_show(
    pass: &PassContext<'_>,
    raw_title: &str,
    remote: &RemoteShow,
) -> EntityOutcome {
    let entity = EntityRef::show(raw_title);
    let title = match CatalogTitle::new(raw_title) {
        Ok(title) => title,
        Err(err) => return EntityOutcome::failed(entity, err),
    };
    let key = show_key(&title);
    let _guard = pass.entity_locks.lock(key.clone()).await;

    let cached = pass.snapshot.by_natural_key::<TvShow>(&key);
    let current = match pass.load_current(cached, &key).await {
        Ok(current) => current,
        Err(err) => return EntityOutcome::failed(entity, err),
    };
    let (show, is_new) = match current {
        Some(show) => (show, false),
        None if !remote.has_playable_episode() => {
            return EntityOutcome::skipped(entity);
        }
        None => match pass.repository.create(TvShow::new(title.clone())).await {
            Ok(resolved) => {
                let is_new = resolved.is_new();
                let show = resolved.into_inner();
                pass.snapshot.upsert(show.clone());
                (show, is_new)
            }
            Err(err) => return EntityOutcome::failed(entity, err),
        },
    };

    let hash_key = HashKey::show(title.as_str());
    let declared = pass
        .strategy
        .manifest()
        .and_then(|manifest| manifest.tv.get(raw_title))
        .map(|hashes| hashes.hash.as_str());
    let gate = pass
        .metadata_gate(hash_key.clone(), declared, || {
            show_is_complete(pass, &show, remote)
        })
        .await;

    let ctx = pass.field_context(MediaType::Tv, raw_title);
    let decision =
        show_decision(&ctx, &show, remote, gate.skip_metadata, entity.clone())
            .await;
    commit(pass, entity, show, is_new, decision, &gate, hash_key).await
}

/// The show has metadata and every playable season the server lists is in
/// the catalog with metadata of its own.
fn show_is_complete(
    pass: &PassContext<'_>,
    show: &TvShow,
    remote: &RemoteShow,
) -> bool {
    if !show.has_metadata() {
        return false;
    }
    let expected = remote
        .seasons
        .values()
        .filter(|season| season.has_playable_episode())
        .count();
    let seasons: Vec<Season> = pass.snapshot.children_of(show.id.to_uuid());
    seasons.len() >= expected && seasons.iter().all(Season::has_metadata)
}

async fn show_decision(
    ctx: &FieldContext<'_>,
    show: &TvShow,
    remote: &RemoteShow,
    skip_metadata: bool,
    entity: EntityRef,
) -> SyncDecision {
    let mut decision = SyncDecision::new(entity);

    decision.push(sync_url(
        ctx,
        show,
        FieldPath::title(FieldKind::Poster),
        show.poster.as_ref(),
        remote.poster.as_deref(),
        FieldUpdate::Poster,
    ));
    decision.push(sync_url(
        ctx,
        show,
        FieldPath::title(FieldKind::Backdrop),
        show.backdrop.as_ref(),
        remote.backdrop.as_deref(),
        FieldUpdate::Backdrop,
    ));
    decision.push(sync_url(
        ctx,
        show,
        FieldPath::title(FieldKind::Logo),
        show.logo.as_ref(),
        remote.logo.as_deref(),
        FieldUpdate::Logo,
    ));

    let metadata = async {
        if skip_metadata {
            return Ok(None);
        }
        sync_metadata(
            ctx,
            show,
            FieldPath::title(FieldKind::Metadata),
            show.metadata.as_ref(),
            remote.metadata.as_deref().map(MetadataRef::Document),
        )
        .await
    };
    let poster_blurhash = sync_blurhash(
        ctx,
        show,
        FieldPath::title(FieldKind::PosterBlurhash),
        show.poster_blurhash.as_ref(),
        remote.poster_blurhash.as_deref(),
        BlurhashKind::Poster,
        FieldUpdate::PosterBlurhash,
    );
    let backdrop_blurhash = sync_blurhash(
        ctx,
        show,
        FieldPath::title(FieldKind::BackdropBlurhash),
        show.backdrop_blurhash.as_ref(),
        remote.backdrop_blurhash.as_deref(),
        BlurhashKind::Backdrop,
        FieldUpdate::BackdropBlurhash,
    );
    let (metadata, poster_blurhash, backdrop_blurhash) =
        tokio::join!(metadata, poster_blurhash, backdrop_blurhash);

    decision.push_result(FieldKind::Metadata, metadata);
    decision.push_result(FieldKind::PosterBlurhash, poster_blurhash);
    decision.push_result(FieldKind::BackdropBlurhash, backdrop_blurhash);
    decision
}
