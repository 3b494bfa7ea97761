use flatsync_model::{
    CatalogEntity, CatalogTitle, FieldKind, FieldPath, FieldUpdate, HashKey,
    MediaType, Movie, RemoteMovie,
};
use futures::StreamExt;
use futures::stream;

use super::commit::commit;
use super::decision::{EntityRef, SyncDecision};
use super::fields::{
    FieldContext, MetadataRef, sync_blurhash, sync_captions, sync_metadata,
    sync_url, sync_video_info,
};
use super::pass::PassContext;
use super::report::{EntityOutcome, EntitySyncResults};
use crate::catalog::document::movie_key;
use crate::remote::BlurhashKind;

pub(crate) async fn sync_movies(pass: &PassContext<'_>) -> EntitySyncResults {
    let outcomes: Vec<EntityOutcome> = stream::iter(pass.data.movies.iter())
        .map(|(title, remote)| sync_movie(pass, title, remote))
        .buffer_unordered(pass.settings.movie_concurrency)
        .collect()
        .await;
    EntitySyncResults::from_outcomes(outcomes)
}

async fn sync_movie(
    pass: &PassContext<'_>,
    raw_title: &str,
    remote: &RemoteMovie,
) -> EntityOutcome {
    let entity = EntityRef::movie(raw_title);
    let title = match CatalogTitle::new(raw_title) {
        Ok(title) => title,
        Err(err) => return EntityOutcome::failed(entity, err),
    };
    let key = movie_key(&title);
    let _guard = pass.entity_locks.lock(key.clone()).await;

    let cached = pass.snapshot.by_natural_key::<Movie>(&key);
    let current = match pass.load_current(cached, &key).await {
        Ok(current) => current,
        Err(err) => return EntityOutcome::failed(entity, err),
    };
    let (movie, is_new) = match current {
        Some(movie) => (movie, false),
        None if !remote.has_video() => return EntityOutcome::skipped(entity),
        None => match pass.repository.create(Movie::new(title.clone())).await {
            Ok(resolved) => {
                let is_new = resolved.is_new();
                let movie = resolved.into_inner();
                pass.snapshot.upsert(movie.clone());
                (movie, is_new)
            }
            Err(err) => return EntityOutcome::failed(entity, err),
        },
    };

    let hash_key = HashKey::movie(title.as_str());
    let declared = pass
        .strategy
        .manifest()
        .and_then(|manifest| manifest.movies.get(raw_title))
        .map(String::as_str);
    let gate = pass
        .metadata_gate(hash_key.clone(), declared, || movie.has_metadata())
        .await;

    let ctx = pass.field_context(MediaType::Movie, raw_title);
    let decision =
        movie_decision(&ctx, &movie, remote, gate.skip_metadata, entity.clone())
            .await;
    commit(pass, entity, movie, is_new, decision, &gate, hash_key).await
}

async fn movie_decision(
    ctx: &FieldContext<'_>,
    movie: &Movie,
    remote: &RemoteMovie,
    skip_metadata: bool,
    entity: EntityRef,
) -> SyncDecision {
    let urls = &remote.urls;
    let mut decision = SyncDecision::new(entity);

    decision.push(sync_url(
        ctx,
        movie,
        FieldPath::title(FieldKind::VideoUrl),
        movie.video.as_ref(),
        urls.mp4.as_deref(),
        FieldUpdate::VideoUrl,
    ));
    decision.push(sync_url(
        ctx,
        movie,
        FieldPath::title(FieldKind::Poster),
        movie.poster.as_ref(),
        urls.poster.as_deref(),
        FieldUpdate::Poster,
    ));
    decision.push(sync_url(
        ctx,
        movie,
        FieldPath::title(FieldKind::Backdrop),
        movie.backdrop.as_ref(),
        urls.backdrop.as_deref(),
        FieldUpdate::Backdrop,
    ));
    decision.push(sync_url(
        ctx,
        movie,
        FieldPath::title(FieldKind::Logo),
        movie.logo.as_ref(),
        urls.logo.as_deref(),
        FieldUpdate::Logo,
    ));
    decision.push(sync_url(
        ctx,
        movie,
        FieldPath::title(FieldKind::Chapters),
        movie.chapters.as_ref(),
        urls.chapters.as_deref(),
        FieldUpdate::Chapters,
    ));
    decision.push(sync_captions(
        ctx,
        movie,
        FieldPath::title(FieldKind::Captions),
        movie.captions.as_ref(),
        &urls.subtitles,
    ));
    decision.push(sync_video_info(
        ctx,
        movie,
        FieldPath::title(FieldKind::VideoInfo),
        movie.video_info.as_ref(),
        remote.video_info.as_ref(),
    ));

    let metadata = async {
        if skip_metadata {
            return Ok(None);
        }
        sync_metadata(
            ctx,
            movie,
            FieldPath::title(FieldKind::Metadata),
            movie.metadata.as_ref(),
            urls.metadata.as_deref().map(MetadataRef::Document),
        )
        .await
    };
    let poster_blurhash = sync_blurhash(
        ctx,
        movie,
        FieldPath::title(FieldKind::PosterBlurhash),
        movie.poster_blurhash.as_ref(),
        urls.poster_blurhash.as_deref(),
        BlurhashKind::Poster,
        FieldUpdate::PosterBlurhash,
    );
    let backdrop_blurhash = sync_blurhash(
        ctx,
        movie,
        FieldPath::title(FieldKind::BackdropBlurhash),
        movie.backdrop_blurhash.as_ref(),
        urls.backdrop_blurhash.as_deref(),
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
