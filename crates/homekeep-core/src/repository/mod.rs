use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{NewTaskData, Task, TaskInstance, UpdateTaskData, DEFAULT_CATEGORY};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

// Re-export domain modules
pub mod instances;
pub mod memory;
pub mod tasks;

pub use memory::MemoryRepository;

/// Domain-specific trait for task template operations.
///
/// Every operation is scoped to the current user; without one, template
/// operations fail with [`CoreError::NoCurrentUser`].
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn current_user_id(&self) -> Result<Option<String>, CoreError>;
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError>;
    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError>;
    async fn find_tasks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Task>, CoreError>;
    async fn find_tasks_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<Task>, CoreError>;
    /// Templates whose `next_due_date` lies in `[start, end]`, ordered by it.
    async fn find_templates_due_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        include_completed: bool,
    ) -> Result<Vec<Task>, CoreError>;
    /// Recurring templates that are still active.
    async fn find_recurring_templates(&self) -> Result<Vec<Task>, CoreError>;
    async fn update_task(&self, id: Uuid, data: UpdateTaskData) -> Result<Task, CoreError>;
    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Domain-specific trait for occurrence rows.
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    async fn find_instance_by_id(&self, id: Uuid) -> Result<Option<TaskInstance>, CoreError>;
    async fn find_instances_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<TaskInstance>, CoreError>;
    /// Instances of the given tasks with `due_date` in `[start, end]`.
    async fn find_instances_for_tasks(
        &self,
        task_ids: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TaskInstance>, CoreError>;
    /// All of the current user's instances with `due_date` in `[start, end]`.
    async fn find_instances_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TaskInstance>, CoreError>;
    /// Instances of `task_id` due at or after `from`, ascending by due date.
    async fn find_instances_from(&self, task_id: Uuid, from: DateTime<Utc>) -> Result<Vec<TaskInstance>, CoreError>;
    /// Inserts all rows in one write; either every row lands or none does.
    async fn insert_instances(&self, instances: &[TaskInstance]) -> Result<(), CoreError>;
    /// Applies `(instance_id, new_due_date)` updates one row at a time, in the
    /// given order, as a single atomic unit.
    async fn update_instance_due_dates(&self, updates: &[(Uuid, DateTime<Utc>)]) -> Result<(), CoreError>;
    /// `Some(at)` completes the instance at `at`, `None` reopens it.
    async fn set_instance_completion(
        &self,
        id: Uuid,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<TaskInstance, CoreError>;
}

/// Main repository trait that composes all domain traits
pub trait Repository: TaskRepository + InstanceRepository {
    // Individual domain operations are defined in their respective traits
}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
    user_id: Option<String>,
}

impl SqliteRepository {
    pub fn new(pool: DbPool, user_id: Option<String>) -> Self {
        Self { pool, user_id }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub(crate) fn require_user(&self) -> Result<&str, CoreError> {
        self.user_id.as_deref().ok_or(CoreError::NoCurrentUser)
    }
}

impl Repository for SqliteRepository {}

/// Validates creation input and builds the template row.
pub(crate) fn build_task(user_id: &str, data: NewTaskData) -> Result<Task, CoreError> {
    let title = data.title.trim();
    if title.is_empty() {
        return Err(CoreError::InvalidInput("Task title cannot be empty".to_string()));
    }
    if matches!(data.estimated_duration_minutes, Some(minutes) if minutes < 0) {
        return Err(CoreError::InvalidInput("Estimated duration cannot be negative".to_string()));
    }

    let category = data
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    let now = Utc::now();
    Ok(Task {
        id: Uuid::now_v7(),
        user_id: user_id.to_string(),
        title: title.to_string(),
        description: data.description,
        category,
        priority: data.priority.unwrap_or_default(),
        is_recurring: data.recurrence_type.is_some(),
        recurrence_type: data.recurrence_type,
        next_due_date: data.next_due_date,
        estimated_duration_minutes: data.estimated_duration_minutes,
        is_completed: false,
        completed_at: None,
        created_at: now,
        updated_at: now,
    })
}

/// Applies a partial update to a template.
pub(crate) fn apply_task_update(mut task: Task, data: UpdateTaskData) -> Result<Task, CoreError> {
    if let Some(title) = data.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(CoreError::InvalidInput("Task title cannot be empty".to_string()));
        }
        task.title = title.to_string();
    }
    if let Some(description) = data.description {
        task.description = description;
    }
    if let Some(category) = data.category {
        task.category = category;
    }
    if let Some(priority) = data.priority {
        task.priority = priority;
    }
    if let Some(recurrence) = data.recurrence_type {
        task.is_recurring = recurrence.is_some();
        task.recurrence_type = recurrence;
    }
    if let Some(next_due_date) = data.next_due_date {
        task.next_due_date = next_due_date;
    }
    if let Some(minutes) = data.estimated_duration_minutes {
        if matches!(minutes, Some(m) if m < 0) {
            return Err(CoreError::InvalidInput("Estimated duration cannot be negative".to_string()));
        }
        task.estimated_duration_minutes = minutes;
    }
    if let Some(is_completed) = data.is_completed {
        task.is_completed = is_completed;
    }
    if let Some(completed_at) = data.completed_at {
        task.completed_at = completed_at;
    }
    task.updated_at = Utc::now();
    Ok(task)
}

/// Returns the single match for a short id prefix, or the matching error.
pub fn resolve_short_id<T>(
    short_id: &str,
    mut matches: Vec<T>,
    describe: impl Fn(&T) -> (String, String),
) -> Result<T, CoreError> {
    match matches.len() {
        0 => Err(CoreError::NotFound(format!("No match for ID prefix '{}'", short_id))),
        1 => Ok(matches.remove(0)),
        _ => Err(CoreError::AmbiguousId(matches.iter().map(describe).collect())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecurrenceType, TaskPriority};

    #[test]
    fn test_build_task_defaults() {
        let task = build_task(
            "user-1",
            NewTaskData {
                title: "  Test smoke alarms ".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(task.title, "Test smoke alarms");
        assert_eq!(task.user_id, "user-1");
        assert_eq!(task.category, DEFAULT_CATEGORY);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(!task.is_recurring);
        assert!(!task.is_completed);
    }

    #[test]
    fn test_build_task_recurring() {
        let task = build_task(
            "user-1",
            NewTaskData {
                title: "Replace HVAC filter".to_string(),
                recurrence_type: Some(RecurrenceType::Quarterly),
                category: Some("hvac".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(task.is_recurring);
        assert_eq!(task.recurrence(), Some(RecurrenceType::Quarterly));
        assert_eq!(task.category, "hvac");
    }

    #[test]
    fn test_build_task_rejects_empty_title_and_negative_duration() {
        assert!(matches!(
            build_task("u", NewTaskData { title: "   ".to_string(), ..Default::default() }),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            build_task(
                "u",
                NewTaskData {
                    title: "Mow".to_string(),
                    estimated_duration_minutes: Some(-5),
                    ..Default::default()
                }
            ),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_apply_update_clears_recurrence() {
        let task = Task {
            is_recurring: true,
            recurrence_type: Some(RecurrenceType::Monthly),
            ..Default::default()
        };
        let updated = apply_task_update(
            task,
            UpdateTaskData {
                recurrence_type: Some(None),
                priority: Some(TaskPriority::Urgent),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(!updated.is_recurring);
        assert_eq!(updated.recurrence_type, None);
        assert_eq!(updated.priority, TaskPriority::Urgent);
    }

    #[test]
    fn test_resolve_short_id() {
        let describe = |s: &&str| (s.to_string(), s.to_string());
        assert_eq!(resolve_short_id("ab", vec!["abc"], describe).unwrap(), "abc");
        assert!(matches!(
            resolve_short_id("ab", Vec::<&str>::new(), describe),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            resolve_short_id("ab", vec!["abc", "abd"], describe),
            Err(CoreError::AmbiguousId(ids)) if ids.len() == 2
        ));
    }
}
