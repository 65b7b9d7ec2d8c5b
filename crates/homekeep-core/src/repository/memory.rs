//! In-memory repository.
//!
//! Mirrors the SQLite store closely enough to run the planner against it in
//! tests: user scoping, the `(task_id, due_date)` uniqueness rule, all-or-nothing
//! batch writes, and per-row due-date updates checked in order. Reads and writes
//! can be made to fail on demand.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{apply_task_update, build_task, InstanceRepository, Repository, TaskRepository};
use crate::error::CoreError;
use crate::models::{NewTaskData, OccurrenceKey, Task, TaskInstance, UpdateTaskData};

#[derive(Default)]
struct MemoryState {
    tasks: HashMap<Uuid, Task>,
    instances: HashMap<Uuid, TaskInstance>,
}

impl MemoryState {
    fn keys(&self) -> HashSet<OccurrenceKey> {
        self.instances.values().map(TaskInstance::key).collect()
    }

    fn owned_by(&self, task_id: Uuid, user_id: &str) -> bool {
        self.tasks.get(&task_id).is_some_and(|t| t.user_id == user_id)
    }
}

pub struct MemoryRepository {
    state: Mutex<MemoryState>,
    user_id: Option<String>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryRepository {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            user_id,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// A repository signed in as `user_id`.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self::new(Some(user_id.into()))
    }

    /// Makes every subsequent read fail until switched off.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent write fail until switched off.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of every stored instance, ordered by due date.
    pub async fn all_instances(&self) -> Vec<TaskInstance> {
        let state = self.state.lock().await;
        let mut instances: Vec<_> = state.instances.values().cloned().collect();
        sort_instances(&mut instances);
        instances
    }

    fn require_user(&self) -> Result<&str, CoreError> {
        self.user_id.as_deref().ok_or(CoreError::NoCurrentUser)
    }

    fn check_read(&self) -> Result<(), CoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CoreError::Store("read failed (injected)".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), CoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::Store("write failed (injected)".to_string()));
        }
        Ok(())
    }
}

fn sort_instances(instances: &mut [TaskInstance]) {
    instances.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
}

fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| a.next_due_date.cmp(&b.next_due_date).then(a.id.cmp(&b.id)));
}

fn duplicate(key: &OccurrenceKey) -> CoreError {
    CoreError::Store(format!("duplicate occurrence: {}", key))
}

#[async_trait]
impl TaskRepository for MemoryRepository {
    async fn current_user_id(&self) -> Result<Option<String>, CoreError> {
        Ok(self.user_id.clone())
    }

    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError> {
        let user_id = self.require_user()?;
        self.check_write()?;
        let task = build_task(user_id, data)?;
        self.state.lock().await.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError> {
        let user_id = self.require_user()?;
        self.check_read()?;
        let state = self.state.lock().await;
        Ok(state.tasks.get(&id).filter(|t| t.user_id == user_id).cloned())
    }

    async fn find_tasks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Task>, CoreError> {
        let user_id = self.require_user()?;
        self.check_read()?;
        let state = self.state.lock().await;
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.user_id == user_id && wanted.contains(&t.id))
            .cloned()
            .collect();
        sort_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn find_tasks_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<Task>, CoreError> {
        let user_id = self.require_user()?;
        self.check_read()?;
        let prefix = short_id.to_lowercase();
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.user_id == user_id && t.id.to_string().starts_with(&prefix))
            .cloned()
            .collect();
        sort_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn find_templates_due_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        include_completed: bool,
    ) -> Result<Vec<Task>, CoreError> {
        let user_id = self.require_user()?;
        self.check_read()?;
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .filter(|t| start <= t.next_due_date && t.next_due_date <= end)
            .filter(|t| include_completed || !t.is_completed)
            .cloned()
            .collect();
        sort_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn find_recurring_templates(&self) -> Result<Vec<Task>, CoreError> {
        let user_id = self.require_user()?;
        self.check_read()?;
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.user_id == user_id && t.is_recurring && !t.is_completed)
            .cloned()
            .collect();
        sort_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn update_task(&self, id: Uuid, data: UpdateTaskData) -> Result<Task, CoreError> {
        let user_id = self.require_user()?;
        self.check_write()?;
        let mut state = self.state.lock().await;
        let current = state
            .tasks
            .get(&id)
            .filter(|t| t.user_id == user_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("Task with id {} not found", id)))?;
        let task = apply_task_update(current, data)?;
        state.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError> {
        let user_id = self.require_user()?;
        self.check_write()?;
        let mut state = self.state.lock().await;
        if !state.owned_by(id, user_id) {
            return Err(CoreError::NotFound(format!("Task with id {} not found", id)));
        }
        state.tasks.remove(&id);
        state.instances.retain(|_, i| i.task_id != id);
        Ok(())
    }
}

#[async_trait]
impl InstanceRepository for MemoryRepository {
    async fn find_instance_by_id(&self, id: Uuid) -> Result<Option<TaskInstance>, CoreError> {
        let user_id = self.require_user()?;
        self.check_read()?;
        let state = self.state.lock().await;
        Ok(state
            .instances
            .get(&id)
            .filter(|i| state.owned_by(i.task_id, user_id))
            .cloned())
    }

    async fn find_instances_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<TaskInstance>, CoreError> {
        let user_id = self.require_user()?;
        self.check_read()?;
        let prefix = short_id.to_lowercase();
        let state = self.state.lock().await;
        let mut instances: Vec<TaskInstance> = state
            .instances
            .values()
            .filter(|i| state.owned_by(i.task_id, user_id) && i.id.to_string().starts_with(&prefix))
            .cloned()
            .collect();
        sort_instances(&mut instances);
        Ok(instances)
    }

    async fn find_instances_for_tasks(
        &self,
        task_ids: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TaskInstance>, CoreError> {
        self.check_read()?;
        let wanted: HashSet<&Uuid> = task_ids.iter().collect();
        let state = self.state.lock().await;
        let mut instances: Vec<TaskInstance> = state
            .instances
            .values()
            .filter(|i| wanted.contains(&i.task_id) && start <= i.due_date && i.due_date <= end)
            .cloned()
            .collect();
        sort_instances(&mut instances);
        Ok(instances)
    }

    async fn find_instances_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TaskInstance>, CoreError> {
        let user_id = self.require_user()?;
        self.check_read()?;
        let state = self.state.lock().await;
        let mut instances: Vec<TaskInstance> = state
            .instances
            .values()
            .filter(|i| state.owned_by(i.task_id, user_id) && start <= i.due_date && i.due_date <= end)
            .cloned()
            .collect();
        sort_instances(&mut instances);
        Ok(instances)
    }

    async fn find_instances_from(&self, task_id: Uuid, from: DateTime<Utc>) -> Result<Vec<TaskInstance>, CoreError> {
        self.check_read()?;
        let state = self.state.lock().await;
        let mut instances: Vec<TaskInstance> = state
            .instances
            .values()
            .filter(|i| i.task_id == task_id && i.due_date >= from)
            .cloned()
            .collect();
        sort_instances(&mut instances);
        Ok(instances)
    }

    async fn insert_instances(&self, instances: &[TaskInstance]) -> Result<(), CoreError> {
        self.check_write()?;
        let mut state = self.state.lock().await;

        let mut keys = state.keys();
        for instance in instances {
            if !state.tasks.contains_key(&instance.task_id) {
                return Err(CoreError::Store(format!("unknown task {}", instance.task_id)));
            }
            if state.instances.contains_key(&instance.id) {
                return Err(CoreError::Store(format!("duplicate instance id {}", instance.id)));
            }
            let key = instance.key();
            if !keys.insert(key.clone()) {
                return Err(duplicate(&key));
            }
        }

        for instance in instances {
            state.instances.insert(instance.id, instance.clone());
        }
        Ok(())
    }

    async fn update_instance_due_dates(&self, updates: &[(Uuid, DateTime<Utc>)]) -> Result<(), CoreError> {
        self.check_write()?;
        let mut state = self.state.lock().await;

        // Apply to a scratch copy row by row, checking uniqueness after each
        // statement like SQLite does, then swap it in.
        let mut scratch = state.instances.clone();
        for (id, due_date) in updates {
            let task_id = scratch
                .get(id)
                .map(|i| i.task_id)
                .ok_or_else(|| CoreError::NotFound(format!("Instance with id {} not found", id)))?;

            let key = OccurrenceKey::new(task_id, *due_date);
            if scratch.values().any(|other| other.id != *id && other.key() == key) {
                return Err(duplicate(&key));
            }
            if let Some(instance) = scratch.get_mut(id) {
                instance.due_date = *due_date;
            }
        }

        state.instances = scratch;
        Ok(())
    }

    async fn set_instance_completion(
        &self,
        id: Uuid,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<TaskInstance, CoreError> {
        self.check_write()?;
        let mut state = self.state.lock().await;
        let instance = state
            .instances
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("Instance with id {} not found", id)))?;
        instance.is_completed = completed_at.is_some();
        instance.completed_at = completed_at;
        Ok(instance.clone())
    }
}

impl Repository for MemoryRepository {}
