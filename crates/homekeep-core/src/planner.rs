//! The planner ties the store, backfill, projection and shifting together
//! behind one handle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::grouping::{dedupe_by_occurrence_key, group_by_key};
use crate::models::{
    is_virtual_occurrence_id, parse_virtual_occurrence_id, CompletionResult, DateWindow, NewTaskData, Occurrence,
    OccurrenceGroup, OccurrenceKey, OccurrenceRef, PlannerConfig, Task, TaskInstance, UpdateTaskData,
};
use crate::projection::OccurrenceProjector;
use crate::recurrence::Recurrence;
use crate::reconcile::{BackfillSummary, InstanceReconciler};
use crate::repository::{resolve_short_id, Repository};
use crate::shift::{SeriesShifter, ShiftSummary};

pub struct Planner<R: Repository> {
    repo: Arc<R>,
    config: PlannerConfig,
    reconciler: InstanceReconciler<R>,
    shifter: SeriesShifter<R>,
}

impl<R: Repository> Planner<R> {
    pub fn new(repo: Arc<R>, config: PlannerConfig) -> Self {
        Self {
            reconciler: InstanceReconciler::new(repo.clone()),
            shifter: SeriesShifter::new(repo.clone()),
            repo,
            config,
        }
    }

    pub fn repo(&self) -> &Arc<R> {
        &self.repo
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// `[now - grace_days, now + lookahead_days]`
    pub fn default_window(&self, now: DateTime<Utc>) -> Result<DateWindow, CoreError> {
        DateWindow::around(now, self.config.grace_days, self.config.lookahead_days)
    }

    /// Everything due in `window`: stored instances first, then projections of
    /// recurring templates that have no row yet. Sorted by due date.
    pub async fn upcoming(&self, window: &DateWindow) -> Result<Vec<Occurrence>, CoreError> {
        self.reconciler
            .ensure_instances(window, self.config.include_completed)
            .await;

        let instances = self.repo.find_instances_between(window.start, window.end).await?;
        let task_ids: Vec<Uuid> = instances
            .iter()
            .map(|i| i.task_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let tasks: HashMap<Uuid, Task> = self
            .repo
            .find_tasks_by_ids(&task_ids)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        let mut occurrences: Vec<Occurrence> = instances
            .iter()
            .filter_map(|instance| {
                tasks
                    .get(&instance.task_id)
                    .map(|task| Occurrence::from_instance(task, instance))
            })
            .collect();
        let existing: HashSet<OccurrenceKey> = occurrences.iter().map(Occurrence::key).collect();

        let seeds = self.repo.find_recurring_templates().await?;
        let projector = OccurrenceProjector::new(self.projection_limit(window));
        for seed in &seeds {
            match projector.project_seed(seed, window.start, window.end, &existing) {
                Ok(projected) => occurrences.extend(projected),
                Err(e) => warn!(task_id = %seed.id, error = %e, "Skipping projection for task"),
            }
        }

        let mut occurrences = dedupe_by_occurrence_key(occurrences);
        occurrences.sort_by_key(|o| o.due_date);

        debug!(
            stored = existing.len(),
            total = occurrences.len(),
            "Listed upcoming occurrences"
        );
        Ok(occurrences)
    }

    /// [`Planner::upcoming`] clustered by group key.
    pub async fn upcoming_groups(&self, window: &DateWindow) -> Result<Vec<OccurrenceGroup>, CoreError> {
        Ok(group_by_key(self.upcoming(window).await?))
    }

    /// Backfill that reports its errors instead of logging them.
    pub async fn backfill(&self, window: &DateWindow, include_completed: bool) -> Result<BackfillSummary, CoreError> {
        self.reconciler.try_ensure_instances(window, include_completed).await
    }

    pub async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError> {
        if data.title.trim().is_empty() {
            return Err(CoreError::InvalidInput("Task title cannot be empty".to_string()));
        }
        self.repo.add_task(data).await
    }

    pub async fn delete_task(&self, task_id: Uuid) -> Result<(), CoreError> {
        self.repo.delete_task(task_id).await
    }

    /// Persists the instance a virtual id stands for. Calling it again for the
    /// same id returns the stored row.
    pub async fn materialize_virtual(&self, virtual_id: &str) -> Result<TaskInstance, CoreError> {
        let (task_id, due_date) = parse_virtual_occurrence_id(virtual_id)?;
        let task = self.find_task(task_id).await?;
        if !task.is_recurring {
            return Err(CoreError::InvalidInput(format!(
                "Task {} does not recur; it has no virtual occurrences",
                task.id
            )));
        }

        let existing = self
            .repo
            .find_instances_for_tasks(&[task_id], due_date, due_date)
            .await?;
        if let Some(instance) = existing.into_iter().next() {
            return Ok(instance);
        }

        let instance = TaskInstance::pending(task_id, due_date);
        self.repo.insert_instances(std::slice::from_ref(&instance)).await?;
        info!(task_id = %task_id, instance_id = %instance.id, "Materialized virtual occurrence");
        Ok(instance)
    }

    /// Marks an occurrence done at `at`.
    ///
    /// Completing the occurrence on the template's anchor moves the template
    /// along: a recurring template advances to its next open date, a one-off
    /// template is marked complete.
    pub async fn complete_occurrence(
        &self,
        reference: &OccurrenceRef,
        at: DateTime<Utc>,
    ) -> Result<CompletionResult, CoreError> {
        let instance = match reference {
            OccurrenceRef::Instance(id) => self
                .repo
                .find_instance_by_id(*id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("Instance with id {} not found", id)))?,
            OccurrenceRef::Virtual(virtual_id) => self.materialize_virtual(virtual_id).await?,
        };
        if instance.is_completed {
            return Err(CoreError::InvalidInput(format!("Occurrence {} is already completed", instance.id)));
        }

        let task = self.find_task(instance.task_id).await?;
        let completed = self.repo.set_instance_completion(instance.id, Some(at)).await?;

        if task.next_due_date != completed.due_date {
            return Ok(CompletionResult::Single(completed));
        }

        match task.recurrence() {
            Some(_) => {
                let next_due_date = self.next_open_date(&task).await?;
                self.repo
                    .update_task(
                        task.id,
                        UpdateTaskData {
                            next_due_date: Some(next_due_date),
                            ..Default::default()
                        },
                    )
                    .await?;
                info!(task_id = %task.id, next = %next_due_date, "Series advanced");
                Ok(CompletionResult::Recurring {
                    completed,
                    next_due_date,
                })
            }
            None => {
                self.repo
                    .update_task(
                        task.id,
                        UpdateTaskData {
                            is_completed: Some(true),
                            completed_at: Some(Some(at)),
                            ..Default::default()
                        },
                    )
                    .await?;
                Ok(CompletionResult::Single(completed))
            }
        }
    }

    /// Moves a series so its anchor lands on `new_anchor`, carrying every
    /// instance from the current anchor onward by the same offset.
    ///
    /// The instance shift commits before the anchor update. If the anchor
    /// update fails, retrying shifts the instances a second time.
    pub async fn reschedule_series(
        &self,
        task_id: Uuid,
        new_anchor: DateTime<Utc>,
    ) -> Result<ShiftSummary, CoreError> {
        let task = self.find_task(task_id).await?;
        let delta = new_anchor - task.next_due_date;

        let summary = self
            .shifter
            .shift_future_instances(task.id, task.next_due_date, delta)
            .await?;
        self.repo
            .update_task(
                task.id,
                UpdateTaskData {
                    next_due_date: Some(new_anchor),
                    ..Default::default()
                },
            )
            .await?;
        Ok(summary)
    }

    /// Resolves a full id or unique prefix to a task template.
    pub async fn resolve_task(&self, short_id: &str) -> Result<Task, CoreError> {
        if let Ok(id) = Uuid::parse_str(short_id) {
            return self.find_task(id).await;
        }
        let matches = self.repo.find_tasks_by_short_id_prefix(short_id).await?;
        resolve_short_id(short_id, matches, |t| (t.id.to_string(), t.title.clone()))
    }

    /// Resolves user input to something completable: a `virtual-…` id is taken
    /// as is, anything else is an instance id or unique prefix.
    pub async fn resolve_occurrence(&self, input: &str) -> Result<OccurrenceRef, CoreError> {
        if is_virtual_occurrence_id(input) {
            parse_virtual_occurrence_id(input)?;
            return Ok(OccurrenceRef::Virtual(input.to_string()));
        }
        if let Ok(id) = Uuid::parse_str(input) {
            return Ok(OccurrenceRef::Instance(id));
        }
        let matches = self.repo.find_instances_by_short_id_prefix(input).await?;
        let instance = resolve_short_id(input, matches, |i| {
            (i.id.to_string(), crate::dates::to_iso_string(&i.due_date))
        })?;
        Ok(OccurrenceRef::Instance(instance.id))
    }

    /// The configured step cap, raised so a weekly series always fits in
    /// `window`.
    fn projection_limit(&self, window: &DateWindow) -> usize {
        let weeks = usize::try_from((window.end - window.start).num_weeks()).unwrap_or(0);
        self.config.max_projection_steps.max(weeks + 1)
    }

    async fn find_task(&self, id: Uuid) -> Result<Task, CoreError> {
        self.repo
            .find_task_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task with id {} not found", id)))
    }

    /// First date after the anchor that is not already completed. Occurrences
    /// finished ahead of time are stepped over.
    async fn next_open_date(&self, task: &Task) -> Result<DateTime<Utc>, CoreError> {
        let rule = task
            .recurrence()
            .ok_or_else(|| CoreError::InvalidInput(format!("Task {} does not recur", task.id)))?;

        let done: HashSet<DateTime<Utc>> = self
            .repo
            .find_instances_from(task.id, task.next_due_date)
            .await?
            .into_iter()
            .filter(|i| i.is_completed)
            .map(|i| i.due_date)
            .collect();

        for (steps, step) in Recurrence::after(rule, task.next_due_date).enumerate() {
            if steps >= self.config.max_projection_steps {
                break;
            }
            let due = step?;
            if !done.contains(&due) {
                return Ok(due);
            }
        }
        Err(CoreError::ProjectionLimit {
            task_id: task.id.to_string(),
            limit: self.config.max_projection_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{virtual_occurrence_id, RecurrenceType};
    use crate::repository::{MemoryRepository, TaskRepository};
    use chrono::{Duration, TimeZone};

    fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn march() -> DateWindow {
        DateWindow::new(ymd(2024, 3, 1), ymd(2024, 3, 31)).unwrap()
    }

    fn planner() -> Planner<MemoryRepository> {
        Planner::new(Arc::new(MemoryRepository::for_user("user-1")), PlannerConfig::default())
    }

    async fn weekly(planner: &Planner<MemoryRepository>, anchor: DateTime<Utc>) -> Task {
        planner
            .add_task(NewTaskData {
                title: "Water plants".to_string(),
                category: Some("garden".to_string()),
                recurrence_type: Some(RecurrenceType::Weekly),
                next_due_date: anchor,
                ..Default::default()
            })
            .await
            .unwrap()
    }

    fn summarize(occurrences: &[Occurrence]) -> Vec<(DateTime<Utc>, bool)> {
        occurrences.iter().map(|o| (o.due_date, o.is_virtual)).collect()
    }

    #[tokio::test]
    async fn test_upcoming_backfills_anchor_and_projects_rest() {
        let planner = planner();
        weekly(&planner, ymd(2024, 3, 1)).await;

        let upcoming = planner.upcoming(&march()).await.unwrap();

        assert_eq!(
            summarize(&upcoming),
            vec![
                (ymd(2024, 3, 1), false),
                (ymd(2024, 3, 8), true),
                (ymd(2024, 3, 15), true),
                (ymd(2024, 3, 22), true),
                (ymd(2024, 3, 29), true),
            ]
        );
        assert_eq!(planner.repo().all_instances().await.len(), 1);
    }

    #[tokio::test]
    async fn test_upcoming_lists_stale_series_next_to_others() {
        let planner = planner();
        weekly(&planner, ymd(2014, 1, 1)).await;
        planner
            .add_task(NewTaskData {
                title: "Fix faucet".to_string(),
                next_due_date: ymd(2024, 3, 5),
                ..Default::default()
            })
            .await
            .unwrap();

        let upcoming = planner.upcoming(&march()).await.unwrap();

        assert_eq!(
            summarize(&upcoming),
            vec![
                (ymd(2024, 3, 5), false),
                (ymd(2024, 3, 6), true),
                (ymd(2024, 3, 13), true),
                (ymd(2024, 3, 20), true),
                (ymd(2024, 3, 27), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_upcoming_accepts_long_horizon() {
        let planner = planner();
        weekly(&planner, ymd(2024, 3, 1)).await;
        let window = DateWindow::new(ymd(2024, 3, 1), ymd(2024, 3, 1) + Duration::days(3700)).unwrap();

        let upcoming = planner.upcoming(&window).await.unwrap();

        // 3700 days hold 528 full weeks plus the anchor.
        assert_eq!(upcoming.len(), 529);
        assert!(upcoming.iter().all(|o| window.contains(o.due_date)));
    }

    #[tokio::test]
    async fn test_upcoming_survives_failed_backfill() {
        let planner = planner();
        weekly(&planner, ymd(2024, 3, 1)).await;
        planner.repo().fail_writes(true);

        let upcoming = planner.upcoming(&march()).await.unwrap();
        // Without the anchor row only the projections remain.
        assert_eq!(upcoming.len(), 4);
        assert!(upcoming.iter().all(|o| o.is_virtual));
    }

    #[tokio::test]
    async fn test_completing_virtual_materializes_it() {
        let planner = planner();
        let task = weekly(&planner, ymd(2024, 3, 1)).await;
        let virtual_id = virtual_occurrence_id(task.id, ymd(2024, 3, 15));

        let result = planner
            .complete_occurrence(&OccurrenceRef::Virtual(virtual_id), ymd(2024, 3, 14))
            .await
            .unwrap();

        let CompletionResult::Single(instance) = result else {
            panic!("expected a single completion");
        };
        assert_eq!(instance.due_date, ymd(2024, 3, 15));
        assert!(instance.is_completed);

        let upcoming = planner.upcoming(&march()).await.unwrap();
        let mid_march: Vec<_> = upcoming.iter().filter(|o| o.due_date == ymd(2024, 3, 15)).collect();
        assert_eq!(mid_march.len(), 1);
        assert!(!mid_march[0].is_virtual);
        assert!(mid_march[0].is_completed);
    }

    #[tokio::test]
    async fn test_completing_anchor_advances_series() {
        let planner = planner();
        let task = weekly(&planner, ymd(2024, 3, 1)).await;
        planner.backfill(&march(), true).await.unwrap();
        let anchor = planner.repo().all_instances().await.remove(0);

        let result = planner
            .complete_occurrence(&OccurrenceRef::Instance(anchor.id), ymd(2024, 3, 1))
            .await
            .unwrap();

        assert!(matches!(
            result,
            CompletionResult::Recurring { next_due_date, .. } if next_due_date == ymd(2024, 3, 8)
        ));
        let task = planner.repo().find_task_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(task.next_due_date, ymd(2024, 3, 8));
    }

    #[tokio::test]
    async fn test_anchor_skips_occurrences_done_ahead() {
        let planner = planner();
        let task = weekly(&planner, ymd(2024, 3, 1)).await;
        planner
            .complete_occurrence(
                &OccurrenceRef::Virtual(virtual_occurrence_id(task.id, ymd(2024, 3, 8))),
                ymd(2024, 2, 28),
            )
            .await
            .unwrap();
        planner.backfill(&march(), true).await.unwrap();
        let anchor = planner
            .repo()
            .all_instances()
            .await
            .into_iter()
            .find(|i| i.due_date == ymd(2024, 3, 1))
            .unwrap();

        let result = planner
            .complete_occurrence(&OccurrenceRef::Instance(anchor.id), ymd(2024, 3, 1))
            .await
            .unwrap();
        assert!(matches!(
            result,
            CompletionResult::Recurring { next_due_date, .. } if next_due_date == ymd(2024, 3, 15)
        ));
    }

    #[tokio::test]
    async fn test_completing_one_off_closes_template() {
        let planner = planner();
        let task = planner
            .add_task(NewTaskData {
                title: "Fix faucet".to_string(),
                next_due_date: ymd(2024, 3, 5),
                ..Default::default()
            })
            .await
            .unwrap();
        planner.backfill(&march(), true).await.unwrap();
        let instance = planner.repo().all_instances().await.remove(0);

        planner
            .complete_occurrence(&OccurrenceRef::Instance(instance.id), ymd(2024, 3, 5))
            .await
            .unwrap();

        let task = planner.repo().find_task_by_id(task.id).await.unwrap().unwrap();
        assert!(task.is_completed);
        assert_eq!(task.completed_at, Some(ymd(2024, 3, 5)));

        let again = planner
            .complete_occurrence(&OccurrenceRef::Instance(instance.id), ymd(2024, 3, 6))
            .await;
        assert!(matches!(again, Err(CoreError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_materialize_virtual_is_idempotent() {
        let planner = planner();
        let task = weekly(&planner, ymd(2024, 3, 1)).await;
        let virtual_id = virtual_occurrence_id(task.id, ymd(2024, 3, 22));

        let first = planner.materialize_virtual(&virtual_id).await.unwrap();
        let second = planner.materialize_virtual(&virtual_id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(planner.repo().all_instances().await.len(), 1);
    }

    #[tokio::test]
    async fn test_materialize_rejects_unknown_task() {
        let planner = planner();
        let virtual_id = virtual_occurrence_id(Uuid::now_v7(), ymd(2024, 3, 22));
        assert!(matches!(
            planner.materialize_virtual(&virtual_id).await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reschedule_moves_anchor_and_instances() {
        let planner = planner();
        let task = weekly(&planner, ymd(2024, 3, 1)).await;
        planner.backfill(&march(), true).await.unwrap();
        planner
            .materialize_virtual(&virtual_occurrence_id(task.id, ymd(2024, 3, 8)))
            .await
            .unwrap();

        let summary = planner.reschedule_series(task.id, ymd(2024, 3, 3)).await.unwrap();

        assert_eq!(summary.shifted, 2);
        assert_eq!(summary.delta, Duration::days(2));
        let dates: Vec<_> = planner.repo().all_instances().await.iter().map(|i| i.due_date).collect();
        assert_eq!(dates, vec![ymd(2024, 3, 3), ymd(2024, 3, 10)]);
        let task = planner.repo().find_task_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(task.next_due_date, ymd(2024, 3, 3));
    }

    #[tokio::test]
    async fn test_upcoming_groups_cluster_by_title() {
        let planner = planner();
        weekly(&planner, ymd(2024, 3, 1)).await;
        planner
            .add_task(NewTaskData {
                title: "Fix faucet".to_string(),
                next_due_date: ymd(2024, 3, 2),
                ..Default::default()
            })
            .await
            .unwrap();

        let groups = planner.upcoming_groups(&march()).await.unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key.as_str(), "water plants|garden|weekly");
        assert_eq!(groups[0].items.len(), 5);
        assert_eq!(groups[1].key.as_str(), "fix faucet|general|one-off");
    }

    #[tokio::test]
    async fn test_resolve_ids() {
        let planner = planner();
        let task = weekly(&planner, ymd(2024, 3, 1)).await;
        planner.backfill(&march(), true).await.unwrap();
        let instance = planner.repo().all_instances().await.remove(0);

        let prefix = &task.id.to_string()[..8];
        assert_eq!(planner.resolve_task(prefix).await.unwrap().id, task.id);

        let full = instance.id.to_string();
        assert_eq!(
            planner.resolve_occurrence(&full).await.unwrap(),
            OccurrenceRef::Instance(instance.id)
        );

        let virtual_id = virtual_occurrence_id(task.id, ymd(2024, 3, 8));
        assert_eq!(
            planner.resolve_occurrence(&virtual_id).await.unwrap(),
            OccurrenceRef::Virtual(virtual_id.clone())
        );
        assert!(matches!(
            planner.resolve_task("zzzz").await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_default_window() {
        let planner = planner();
        let now = ymd(2024, 3, 10);
        let window = planner.default_window(now).unwrap();
        assert_eq!(window.start, ymd(2024, 3, 7));
        assert_eq!(window.end, ymd(2024, 4, 9));
    }

    #[test]
    fn test_default_window_out_of_range() {
        let planner = Planner::new(
            Arc::new(MemoryRepository::for_user("user-1")),
            PlannerConfig {
                lookahead_days: u32::MAX,
                ..PlannerConfig::default()
            },
        );
        assert!(matches!(
            planner.default_window(Utc::now()),
            Err(CoreError::InvalidInput(_))
        ));
    }
}
