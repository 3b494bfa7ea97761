use flatsync_model::{
    CatalogEntity, CatalogTitle, Episode, FieldKind, FieldPath, FieldUpdate,
    HashKey, MediaType, RemoteEpisode, RemoteShow, Season, TvShow,
};
use futures::StreamExt;
use futures::stream;
use tracing::warn;

use super::commit::commit;
use super::decision::{EntityRef, SyncDecision};
use super::fields::{
    FieldContext, MetadataRef, sync_blurhash, sync_captions, sync_metadata,
    sync_url, sync_video_info,
};
use super::parents::{resolve_season, resolve_show};
use super::pass::PassContext;
use super::report::{EntityOutcome, EntitySyncResults};
use crate::catalog::document::{episode_identity, episode_natural};
use crate::remote::BlurhashKind;

pub(crate) async fn sync_episodes(pass: &PassContext<'_>) -> EntitySyncResults {
    let per_show: Vec<Vec<EntityOutcome>> = stream::iter(pass.data.tv.iter())
        .map(|(title, remote)| sync_show_episodes(pass, title, remote))
        .buffer_unordered(pass.settings.show_concurrency)
        .collect()
        .await;
    EntitySyncResults::from_outcomes(per_show.into_iter().flatten())
}

async fn sync_show_episodes(
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
            warn!(server = %pass.server.id, show = raw_title, error = %err, "skipping episodes of show");
            return vec![EntityOutcome::failed(EntityRef::show(raw_title), err)];
        }
    };

    let mut outcomes = Vec::new();
    let mut jobs: Vec<(Season, &RemoteEpisode)> = Vec::new();
    for remote_season in remote.seasons.values() {
        if !remote_season.has_playable_episode() {
            continue;
        }
        let season_number = remote_season.season_number;
        let season = match resolve_season(pass, &show, season_number).await {
            Ok(resolved) => resolved.into_inner(),
            Err(err) => {
                outcomes.push(EntityOutcome::failed(
                    EntityRef::season(raw_title, season_number),
                    err,
                ));
                continue;
            }
        };
        for episode in remote_season.episodes.values() {
            if episode.has_video() {
                jobs.push((season.clone(), episode));
            }
        }
    }

    let show = &show;
    let results: Vec<EntityOutcome> = stream::iter(jobs)
        .map(|(season, episode)| async move {
            let entity = EntityRef::episode(
                raw_title,
                season.season_number,
                episode.episode_number,
            );
            // Shared across shows so the total stays bounded.
            let _permit = match pass.episode_permits.acquire().await {
                Ok(permit) => permit,
                Err(err) => return EntityOutcome::failed(entity, err),
            };
            sync_episode(pass, entity, raw_title, show, &season, episode).await
        })
        .buffer_unordered(pass.settings.episode_concurrency)
        .collect()
        .await;
    outcomes.extend(results);
    outcomes
}

async fn sync_episode(
    pass: &PassContext<'_>,
    entity: EntityRef,
    raw_title: &str,
    show: &TvShow,
    season: &Season,
    remote: &RemoteEpisode,
) -> EntityOutcome {
    let season_number = season.season_number;
    let episode_number = remote.episode_number;
    let identity = episode_identity(show.id, season.id, episode_number);
    let natural =
        episode_natural(&show.original_title, season_number, episode_number);
    let _guard = pass.entity_locks.lock(natural.clone()).await;

    let cached = pass.snapshot.resolve::<Episode>(&identity, &natural);
    let existing = match pass.load_current(cached, &natural).await {
        Ok(current) => current.filter(|episode| {
            episode.show_id == show.id && episode.season_id == season.id
        }),
        Err(err) => return EntityOutcome::failed(entity, err),
    };
    let (episode, is_new) = match existing {
        Some(episode) => (episode, false),
        // Missing, or stored under stale parent ids.
        None => match pass
            .repository
            .create(Episode::new(season, episode_number))
            .await
        {
            Ok(resolved) => {
                let is_new = resolved.is_new();
                let episode = resolved.into_inner();
                pass.snapshot.upsert(episode.clone());
                (episode, is_new)
            }
            Err(err) => return EntityOutcome::failed(entity, err),
        },
    };

    let hash_key = HashKey::episode(
        show.original_title.as_str(),
        season_number,
        episode_number,
    );
    let declared = pass
        .strategy
        .manifest()
        .and_then(|manifest| manifest.tv.get(raw_title))
        .and_then(|hashes| hashes.seasons.get(&season_number))
        .and_then(|hashes| hashes.episodes.get(&episode_number))
        .map(String::as_str);
    let gate = pass
        .metadata_gate(hash_key.clone(), declared, || episode.has_metadata())
        .await;

    let ctx = pass.field_context(MediaType::Tv, raw_title);
    let decision = episode_decision(
        &ctx,
        &episode,
        season_number,
        remote,
        gate.skip_metadata,
        entity.clone(),
    )
    .await;
    commit(pass, entity, episode, is_new, decision, &gate, hash_key).await
}

async fn episode_decision(
    ctx: &FieldContext<'_>,
    episode: &Episode,
    season_number: u32,
    remote: &RemoteEpisode,
    skip_metadata: bool,
    entity: EntityRef,
) -> SyncDecision {
    let e = remote.episode_number;
    let path = |kind| FieldPath::episode(season_number, e, kind);
    let mut decision = SyncDecision::new(entity);

    decision.push(sync_url(
        ctx,
        episode,
        path(FieldKind::VideoUrl),
        episode.video.as_ref(),
        remote.video_url.as_deref(),
        FieldUpdate::VideoUrl,
    ));
    decision.push(sync_url(
        ctx,
        episode,
        path(FieldKind::Thumbnail),
        episode.thumbnail.as_ref(),
        remote.thumbnail.as_deref(),
        FieldUpdate::Thumbnail,
    ));
    decision.push(sync_url(
        ctx,
        episode,
        path(FieldKind::Chapters),
        episode.chapters.as_ref(),
        remote.chapters.as_deref(),
        FieldUpdate::Chapters,
    ));
    decision.push(sync_captions(
        ctx,
        episode,
        path(FieldKind::Captions),
        episode.captions.as_ref(),
        &remote.subtitles,
    ));
    decision.push(sync_video_info(
        ctx,
        episode,
        path(FieldKind::VideoInfo),
        episode.video_info.as_ref(),
        remote.video_info.as_ref(),
    ));

    let metadata = async {
        if skip_metadata {
            return Ok(None);
        }
        sync_metadata(
            ctx,
            episode,
            path(FieldKind::Metadata),
            episode.metadata.as_ref(),
            remote.metadata.as_deref().map(MetadataRef::Document),
        )
        .await
    };
    let thumbnail_blurhash = sync_blurhash(
        ctx,
        episode,
        path(FieldKind::ThumbnailBlurhash),
        episode.thumbnail_blurhash.as_ref(),
        remote.thumbnail_blurhash.as_deref(),
        BlurhashKind::Thumbnail,
        FieldUpdate::ThumbnailBlurhash,
    );
    let (metadata, thumbnail_blurhash) =
        tokio::join!(metadata, thumbnail_blurhash);

    decision.push_result(FieldKind::Metadata, metadata);
    decision.push_result(FieldKind::ThumbnailBlurhash, thumbnail_blurhash);
    decision
}
