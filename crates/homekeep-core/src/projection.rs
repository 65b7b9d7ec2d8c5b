use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::CoreError;
use crate::models::{Occurrence, OccurrenceKey, Task};
use crate::recurrence::Recurrence;

/// Default bound on projection steps per template: ten years of weekly chores.
pub const DEFAULT_MAX_PROJECTION_STEPS: usize = 520;

/// OccurrenceProjector: synthesizes display-only future occurrences of recurring
/// templates past what has been materialized.
///
/// Projection is pure. Its output must never be written back to the store; a
/// virtual occurrence is materialized into a real instance before it is
/// completed or edited.
#[derive(Debug, Clone)]
pub struct OccurrenceProjector {
    max_steps: usize,
}

impl Default for OccurrenceProjector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PROJECTION_STEPS)
    }
}

impl OccurrenceProjector {
    pub fn new(max_steps: usize) -> Self {
        Self { max_steps }
    }

    /// Projects virtual occurrences for every recurring seed up to `horizon`
    /// (inclusive).
    ///
    /// # Behavior
    /// - One-off and completed seeds are ignored
    /// - Projection starts one step past the seed's `next_due_date`; the anchor
    ///   itself is expected to be backed by a real row
    /// - Occurrences whose key is in `existing_keys` are skipped
    /// - A seed that needs more than `max_steps` steps to pass the horizon is a
    ///   [`CoreError::ProjectionLimit`]; a step that does not advance time is a
    ///   [`CoreError::NoForwardProgress`]
    pub fn project_virtual_occurrences(
        &self,
        seeds: &[Task],
        horizon: DateTime<Utc>,
        existing_keys: &HashSet<OccurrenceKey>,
    ) -> Result<Vec<Occurrence>, CoreError> {
        let mut projected = Vec::new();
        for seed in seeds {
            projected.extend(self.project_seed(seed, DateTime::<Utc>::MIN_UTC, horizon, existing_keys)?);
        }

        debug!(
            seeds = seeds.len(),
            projected = projected.len(),
            "Projected virtual occurrences"
        );
        Ok(projected)
    }

    /// Projects one seed into `[start, horizon]`.
    ///
    /// Steps that land before `start` are walked but not counted against
    /// `max_steps`, so an anchor left far behind the window is not a runaway.
    pub fn project_seed(
        &self,
        seed: &Task,
        start: DateTime<Utc>,
        horizon: DateTime<Utc>,
        existing_keys: &HashSet<OccurrenceKey>,
    ) -> Result<Vec<Occurrence>, CoreError> {
        let mut projected = Vec::new();
        if seed.is_completed {
            return Ok(projected);
        }
        let Some(rule) = seed.recurrence() else {
            return Ok(projected);
        };

        let mut steps = 0usize;
        for step in Recurrence::after(rule, seed.next_due_date) {
            let due_date = step?;
            if due_date > horizon {
                break;
            }
            if due_date < start {
                continue;
            }

            steps += 1;
            if steps > self.max_steps {
                return Err(CoreError::ProjectionLimit {
                    task_id: seed.id.to_string(),
                    limit: self.max_steps,
                });
            }

            let occurrence = Occurrence::projected(seed, due_date);
            if existing_keys.contains(&occurrence.key()) {
                continue;
            }
            projected.push(occurrence);
        }
        Ok(projected)
    }
}
