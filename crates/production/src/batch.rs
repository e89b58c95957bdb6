use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backstock_core::{BatchRunId, CompositionId, Entity, UserId};

/// Append-only record of one production run. `processed_batches` is what was
/// actually produced, which may be less than what was asked for; the record
/// is never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRun {
    pub id: BatchRunId,
    pub composition_id: CompositionId,
    pub actor: Option<UserId>,
    pub requested_batches: i64,
    pub processed_batches: i64,
    pub recorded_at: DateTime<Utc>,
}

impl BatchRun {
    pub fn new(
        composition_id: CompositionId,
        actor: Option<UserId>,
        requested_batches: i64,
        processed_batches: i64,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BatchRunId::new(),
            composition_id,
            actor,
            requested_batches,
            processed_batches,
            recorded_at,
        }
    }
}

impl Entity for BatchRun {
    type Id = BatchRunId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
