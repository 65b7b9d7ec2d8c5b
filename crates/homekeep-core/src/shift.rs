use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::CoreError;
use crate::repository::Repository;

/// Result of moving part of a series in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftSummary {
    pub task_id: Uuid,
    pub from: DateTime<Utc>,
    pub delta: Duration,
    /// Number of instance rows that moved
    pub shifted: usize,
}

/// SeriesShifter: moves every instance of a task due at or after a cutoff by a
/// fixed delta.
///
/// Rows are updated one at a time by id. The order is chosen so no row is
/// ever moved onto a date still held by a sibling: latest first when moving
/// forward, earliest first when moving back. The store applies the whole plan
/// atomically.
pub struct SeriesShifter<R: Repository> {
    repo: Arc<R>,
}

impl<R: Repository> SeriesShifter<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn shift_future_instances(
        &self,
        task_id: Uuid,
        from_due: DateTime<Utc>,
        delta: Duration,
    ) -> Result<ShiftSummary, CoreError> {
        let mut summary = ShiftSummary {
            task_id,
            from: from_due,
            delta,
            shifted: 0,
        };
        if delta == Duration::zero() {
            return Ok(summary);
        }

        let instances = self.repo.find_instances_from(task_id, from_due).await?;
        let mut plan = instances
            .iter()
            .map(|instance| {
                instance
                    .due_date
                    .checked_add_signed(delta)
                    .map(|moved| (instance.id, moved))
                    .ok_or_else(|| CoreError::InvalidDate(format!("shifting instance {} by {} overflows", instance.id, delta)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        // `instances` is ascending by due date.
        if delta > Duration::zero() {
            plan.reverse();
        }

        self.repo.update_instance_due_dates(&plan).await?;
        summary.shifted = plan.len();

        info!(
            task_id = %task_id,
            shifted = summary.shifted,
            delta_secs = delta.num_seconds(),
            "Shifted future instances"
        );
        Ok(summary)
    }
}
