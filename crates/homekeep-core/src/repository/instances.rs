use crate::error::CoreError;
use crate::models::TaskInstance;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use tracing::info;
use uuid::Uuid;

// Six binds per row keeps each statement well under SQLite's variable limit.
const INSERT_CHUNK_ROWS: usize = 500;

/// Unique-constraint hits become `Store` errors so every backend reports a
/// duplicate occurrence the same way.
fn map_write_error(err: sqlx::Error) -> CoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            CoreError::Store(format!("duplicate occurrence: {}", db.message()))
        }
        _ => CoreError::Database(err),
    }
}

#[async_trait]
impl super::InstanceRepository for SqliteRepository {
    async fn find_instance_by_id(&self, id: Uuid) -> Result<Option<TaskInstance>, CoreError> {
        let user_id = self.require_user()?;
        let instance = sqlx::query_as(
            r#"SELECT i.* FROM task_instances i
            JOIN tasks t ON t.id = i.task_id
            WHERE i.id = $1 AND t.user_id = $2"#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(instance)
    }

    async fn find_instances_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<TaskInstance>, CoreError> {
        let user_id = self.require_user()?;
        let instances: Vec<TaskInstance> = sqlx::query_as(
            r#"SELECT i.* FROM task_instances i
            JOIN tasks t ON t.id = i.task_id
            WHERE t.user_id = $1
            ORDER BY i.due_date"#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        let prefix = short_id.to_lowercase();
        Ok(instances
            .into_iter()
            .filter(|i| i.id.to_string().starts_with(&prefix))
            .collect())
    }

    async fn find_instances_for_tasks(
        &self,
        task_ids: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TaskInstance>, CoreError> {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM task_instances WHERE due_date BETWEEN ");
        qb.push_bind(start);
        qb.push(" AND ");
        qb.push_bind(end);
        qb.push(" AND task_id IN (");
        let mut separated = qb.separated(", ");
        for id in task_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        qb.push(" ORDER BY due_date");

        let instances = qb.build_query_as().fetch_all(self.pool()).await?;
        Ok(instances)
    }

    async fn find_instances_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TaskInstance>, CoreError> {
        let user_id = self.require_user()?;
        let instances = sqlx::query_as(
            r#"SELECT i.* FROM task_instances i
            JOIN tasks t ON t.id = i.task_id
            WHERE t.user_id = $1
            AND i.due_date BETWEEN $2 AND $3
            ORDER BY i.due_date"#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        Ok(instances)
    }

    async fn find_instances_from(&self, task_id: Uuid, from: DateTime<Utc>) -> Result<Vec<TaskInstance>, CoreError> {
        let instances = sqlx::query_as(
            r#"SELECT * FROM task_instances
            WHERE task_id = $1
            AND due_date >= $2
            ORDER BY due_date ASC"#,
        )
        .bind(task_id)
        .bind(from)
        .fetch_all(self.pool())
        .await?;
        Ok(instances)
    }

    async fn insert_instances(&self, instances: &[TaskInstance]) -> Result<(), CoreError> {
        if instances.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool().begin().await?;
        for chunk in instances.chunks(INSERT_CHUNK_ROWS) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO task_instances (id, task_id, due_date, is_completed, completed_at, created_at) ",
            );
            qb.push_values(chunk, |mut row, instance| {
                row.push_bind(instance.id)
                    .push_bind(instance.task_id)
                    .push_bind(instance.due_date)
                    .push_bind(instance.is_completed)
                    .push_bind(instance.completed_at)
                    .push_bind(instance.created_at);
            });
            qb.build().execute(&mut *tx).await.map_err(map_write_error)?;
        }
        tx.commit().await?;

        info!(rows = instances.len(), "Inserted task instances");
        Ok(())
    }

    async fn update_instance_due_dates(&self, updates: &[(Uuid, DateTime<Utc>)]) -> Result<(), CoreError> {
        if updates.is_empty() {
            return Ok(());
        }

        // Dropping the transaction on an early return rolls every row back.
        let mut tx = self.pool().begin().await?;
        for (id, due_date) in updates {
            let result = sqlx::query("UPDATE task_instances SET due_date = $1 WHERE id = $2")
                .bind(*due_date)
                .bind(*id)
                .execute(&mut *tx)
                .await
                .map_err(map_write_error)?;

            if result.rows_affected() == 0 {
                return Err(CoreError::NotFound(format!("Instance with id {} not found", id)));
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn set_instance_completion(
        &self,
        id: Uuid,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<TaskInstance, CoreError> {
        let instance = sqlx::query_as(
            r#"UPDATE task_instances SET is_completed = $1, completed_at = $2
            WHERE id = $3
            RETURNING *"#,
        )
        .bind(completed_at.is_some())
        .bind(completed_at)
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Instance with id {} not found", id)))?;
        Ok(instance)
    }
}
