use crate::error::CoreError;
use crate::models::{NewTaskData, Task, UpdateTaskData};
use crate::repository::{apply_task_update, build_task, SqliteRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use tracing::info;
use uuid::Uuid;

#[async_trait]
impl super::TaskRepository for SqliteRepository {
    async fn current_user_id(&self) -> Result<Option<String>, CoreError> {
        Ok(self.user_id.clone())
    }

    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError> {
        let user_id = self.require_user()?;
        let task = build_task(user_id, data)?;

        sqlx::query(
            r#"INSERT INTO tasks (id, user_id, title, description, category, priority, is_recurring, recurrence_type,
                next_due_date, estimated_duration_minutes, is_completed, completed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#,
        )
        .bind(task.id)
        .bind(&task.user_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.category)
        .bind(task.priority)
        .bind(task.is_recurring)
        .bind(task.recurrence_type)
        .bind(task.next_due_date)
        .bind(task.estimated_duration_minutes)
        .bind(task.is_completed)
        .bind(task.completed_at)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(self.pool())
        .await?;

        info!(task_id = %task.id, recurring = task.is_recurring, "Task added");
        Ok(task)
    }

    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError> {
        let user_id = self.require_user()?;
        let task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(task)
    }

    async fn find_tasks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Task>, CoreError> {
        let user_id = self.require_user()?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM tasks WHERE user_id = ");
        qb.push_bind(user_id);
        qb.push(" AND id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let tasks = qb.build_query_as().fetch_all(self.pool()).await?;
        Ok(tasks)
    }

    async fn find_tasks_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<Task>, CoreError> {
        let user_id = self.require_user()?;
        // Ids are stored as blobs, so prefix matching happens on the textual form.
        let tasks: Vec<Task> = sqlx::query_as("SELECT * FROM tasks WHERE user_id = $1 ORDER BY created_at")
            .bind(user_id)
            .fetch_all(self.pool())
            .await?;

        let prefix = short_id.to_lowercase();
        Ok(tasks
            .into_iter()
            .filter(|t| t.id.to_string().starts_with(&prefix))
            .collect())
    }

    async fn find_templates_due_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        include_completed: bool,
    ) -> Result<Vec<Task>, CoreError> {
        let user_id = self.require_user()?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM tasks WHERE user_id = ");
        qb.push_bind(user_id);
        qb.push(" AND next_due_date BETWEEN ");
        qb.push_bind(start);
        qb.push(" AND ");
        qb.push_bind(end);
        if !include_completed {
            qb.push(" AND is_completed = 0");
        }
        qb.push(" ORDER BY next_due_date");

        let tasks = qb.build_query_as().fetch_all(self.pool()).await?;
        Ok(tasks)
    }

    async fn find_recurring_templates(&self) -> Result<Vec<Task>, CoreError> {
        let user_id = self.require_user()?;
        let tasks = sqlx::query_as(
            r#"SELECT * FROM tasks
            WHERE user_id = $1
            AND is_recurring = 1
            AND is_completed = 0
            ORDER BY next_due_date"#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(tasks)
    }

    async fn update_task(&self, id: Uuid, data: UpdateTaskData) -> Result<Task, CoreError> {
        let user_id = self.require_user()?;
        let mut tx = self.pool().begin().await?;

        let current: Task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task with id {} not found", id)))?;

        let task = apply_task_update(current, data)?;

        sqlx::query(
            r#"UPDATE tasks SET title = $1, description = $2, category = $3, priority = $4, is_recurring = $5,
                recurrence_type = $6, next_due_date = $7, estimated_duration_minutes = $8, is_completed = $9,
                completed_at = $10, updated_at = $11
            WHERE id = $12"#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.category)
        .bind(task.priority)
        .bind(task.is_recurring)
        .bind(task.recurrence_type)
        .bind(task.next_due_date)
        .bind(task.estimated_duration_minutes)
        .bind(task.is_completed)
        .bind(task.completed_at)
        .bind(task.updated_at)
        .bind(task.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(task)
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError> {
        let user_id = self.require_user()?;
        // Instances go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Task with id {} not found", id)));
        }

        info!(task_id = %id, "Task deleted");
        Ok(())
    }
}
