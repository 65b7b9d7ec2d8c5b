use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::models::{DateWindow, OccurrenceKey, TaskInstance};
use crate::repository::Repository;

/// Counts collected during a backfill pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    /// Templates whose anchor falls in the window
    pub templates_in_window: usize,
    /// Anchors that already had an instance row
    pub already_present: usize,
    /// Instance rows written by this pass
    pub inserted: usize,
}

/// InstanceReconciler: makes sure every template anchor inside a window is
/// backed by a persisted instance row.
///
/// Responsibilities:
/// 1. Find templates due in the window
/// 2. Compare their anchors against the instances already stored
/// 3. Insert the missing rows in one batch
///
/// Running it twice over the same window inserts nothing the second time.
pub struct InstanceReconciler<R: Repository> {
    repo: Arc<R>,
}

impl<R: Repository> InstanceReconciler<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Backfills missing anchor instances, surfacing any store error.
    pub async fn try_ensure_instances(
        &self,
        window: &DateWindow,
        include_completed: bool,
    ) -> Result<BackfillSummary, CoreError> {
        let templates = self
            .repo
            .find_templates_due_between(window.start, window.end, include_completed)
            .await?;

        let mut summary = BackfillSummary {
            templates_in_window: templates.len(),
            ..Default::default()
        };
        if templates.is_empty() {
            return Ok(summary);
        }

        let task_ids: Vec<_> = templates.iter().map(|t| t.id).collect();
        let existing: HashSet<OccurrenceKey> = self
            .repo
            .find_instances_for_tasks(&task_ids, window.start, window.end)
            .await?
            .iter()
            .map(TaskInstance::key)
            .collect();

        let missing: Vec<TaskInstance> = templates
            .iter()
            .filter(|t| !existing.contains(&t.anchor_key()))
            .map(TaskInstance::for_template)
            .collect();

        summary.already_present = templates.len() - missing.len();
        if !missing.is_empty() {
            self.repo.insert_instances(&missing).await?;
            summary.inserted = missing.len();
        }

        debug!(
            templates = summary.templates_in_window,
            present = summary.already_present,
            inserted = summary.inserted,
            "Backfilled task instances"
        );
        Ok(summary)
    }

    /// Best-effort backfill. Failures are logged and the caller carries on
    /// with whatever is already stored.
    pub async fn ensure_instances(&self, window: &DateWindow, include_completed: bool) -> Option<BackfillSummary> {
        match self.try_ensure_instances(window, include_completed).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(error = %e, "Instance backfill failed; continuing with stored instances");
                None
            }
        }
    }
}
