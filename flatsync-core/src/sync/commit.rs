use flatsync_model::HashKey;
use tracing::{debug, warn};

use super::decision::{EntityRef, SyncDecision};
use super::pass::{MetadataGate, PassContext};
use super::report::{EntityOutcome, EntityState, SyncFailure};
use crate::catalog::Indexed;

/// Applies a decision to `doc`, writes it once if anything changed, and
/// queues the content hash when the write was authoritative.
pub(crate) async fn commit<D: Indexed>(
    pass: &PassContext<'_>,
    entity: EntityRef,
    mut doc: D,
    is_new: bool,
    decision: SyncDecision,
    gate: &MetadataGate,
    hash_key: HashKey,
) -> EntityOutcome {
    let mut outcome = EntityOutcome::new(
        entity.clone(),
        if is_new {
            EntityState::Created
        } else {
            EntityState::Unchanged
        },
    );
    outcome.metadata_skipped_by_hash = gate.skip_metadata;
    outcome.failures = decision
        .errors
        .iter()
        .map(|(kind, err)| SyncFailure::for_field(&entity, *kind, err))
        .collect();

    if !decision.apply_to(&mut doc) {
        return outcome;
    }

    if let Err(err) = pass.repository.update(&doc).await {
        warn!(server = %pass.server.id, %entity, error = %err, "catalog write failed");
        outcome.state = EntityState::Failed;
        outcome.failures.push(SyncFailure::new(&entity, err));
        return outcome;
    }

    debug!(
        server = %pass.server.id,
        %entity,
        fields = ?decision.changed_fields(),
        "entity updated"
    );
    pass.snapshot.upsert(doc);
    pass.stamp(hash_key, gate, &decision);
    if !is_new {
        outcome.state = EntityState::Updated;
    }
    outcome.fields = decision.changed_fields();
    outcome
}
