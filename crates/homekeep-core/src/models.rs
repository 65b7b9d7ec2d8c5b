use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{Sqlite, SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::dates;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task priority: {0}")]
pub struct ParseTaskPriorityError(String);

impl FromStr for TaskPriority {
    type Err = ParseTaskPriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "urgent" => Ok(TaskPriority::Urgent),
            _ => Err(ParseTaskPriorityError(s.to_string())),
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Urgent => write!(f, "urgent"),
        }
    }
}

/// How often a recurring template comes due.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceType {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid recurrence type: {0}")]
pub struct ParseRecurrenceTypeError(String);

impl RecurrenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceType::Weekly => "weekly",
            RecurrenceType::Monthly => "monthly",
            RecurrenceType::Quarterly => "quarterly",
            RecurrenceType::Yearly => "yearly",
        }
    }

    /// Lenient parse for stored rules. Anything unknown or missing is treated as
    /// weekly, matching how existing rows have always been scheduled.
    pub fn from_rule(rule: Option<&str>) -> Self {
        match rule.map(str::parse::<RecurrenceType>) {
            Some(Ok(parsed)) => parsed,
            _ => {
                warn!(rule = ?rule, "Unrecognized recurrence rule, falling back to weekly");
                RecurrenceType::Weekly
            }
        }
    }
}

impl FromStr for RecurrenceType {
    type Err = ParseRecurrenceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" => Ok(RecurrenceType::Weekly),
            "monthly" => Ok(RecurrenceType::Monthly),
            "quarterly" => Ok(RecurrenceType::Quarterly),
            "yearly" | "annually" => Ok(RecurrenceType::Yearly),
            _ => Err(ParseRecurrenceTypeError(s.to_string())),
        }
    }
}

impl fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Stored as TEXT. Decoding goes through `from_rule` so a row carrying a rule this
// build does not know still loads.
impl sqlx::Type<Sqlite> for RecurrenceType {
    fn type_info() -> SqliteTypeInfo {
        <str as sqlx::Type<Sqlite>>::type_info()
    }
}

impl<'q> sqlx::Encode<'q, Sqlite> for RecurrenceType {
    fn encode_by_ref(&self, buf: &mut Vec<SqliteArgumentValue<'q>>) -> IsNull {
        <&str as sqlx::Encode<'q, Sqlite>>::encode(self.as_str(), buf)
    }
}

impl<'r> sqlx::Decode<'r, Sqlite> for RecurrenceType {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <&str as sqlx::Decode<'r, Sqlite>>::decode(value)?;
        Ok(RecurrenceType::from_rule(Some(raw)))
    }
}

/// A task template. For recurring tasks one row stands for the whole series and
/// `next_due_date` is the anchor of the next occurrence to generate.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub priority: TaskPriority,
    pub is_recurring: bool,
    /// Present only when `is_recurring` is set
    pub recurrence_type: Option<RecurrenceType>,
    pub next_due_date: DateTime<Utc>,
    pub estimated_duration_minutes: Option<i64>,
    /// Completion of the template's own single occurrence (one-off tasks)
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: String::new(),
            title: String::new(),
            description: None,
            category: DEFAULT_CATEGORY.to_string(),
            priority: TaskPriority::Medium,
            is_recurring: false,
            recurrence_type: None,
            next_due_date: Utc::now(),
            estimated_duration_minutes: None,
            is_completed: false,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

pub const DEFAULT_CATEGORY: &str = "general";

impl Task {
    /// The rule this template recurs by, if it recurs at all.
    pub fn recurrence(&self) -> Option<RecurrenceType> {
        if self.is_recurring {
            Some(self.recurrence_type.unwrap_or_else(|| RecurrenceType::from_rule(None)))
        } else {
            None
        }
    }

    /// Occurrence key of the template's anchor occurrence.
    pub fn anchor_key(&self) -> OccurrenceKey {
        OccurrenceKey::new(self.id, self.next_due_date)
    }
}

/// One concrete calendar occurrence of a task.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct TaskInstance {
    pub id: Uuid,
    pub task_id: Uuid,
    pub due_date: DateTime<Utc>,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TaskInstance {
    /// Builds the instance row for a template's current anchor.
    pub fn for_template(task: &Task) -> Self {
        Self {
            id: Uuid::now_v7(),
            task_id: task.id,
            due_date: task.next_due_date,
            is_completed: task.is_completed,
            completed_at: task.completed_at,
            created_at: Utc::now(),
        }
    }

    /// A pending instance of `task_id` at `due_date`.
    pub fn pending(task_id: Uuid, due_date: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            task_id,
            due_date,
            is_completed: false,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> OccurrenceKey {
        OccurrenceKey::new(self.task_id, self.due_date)
    }
}

/// `"{task_id}|{ISO(due_date)}"`, the identity of an occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OccurrenceKey(String);

impl OccurrenceKey {
    pub fn new(task_id: Uuid, due_date: DateTime<Utc>) -> Self {
        Self(format!("{}|{}", task_id, dates::to_iso_string(&due_date)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OccurrenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// UI clustering key: occurrences that look like the same chore stack together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GroupKey(String);

pub const ONE_OFF_SEGMENT: &str = "one-off";

impl GroupKey {
    pub fn new(title: &str, category: &str, recurrence: Option<RecurrenceType>) -> Self {
        let normalized_title = title
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let cadence = recurrence.map_or(ONE_OFF_SEGMENT, |r| r.as_str());
        Self(format!("{}|{}|{}", normalized_title, category, cadence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const VIRTUAL_PREFIX: &str = "virtual-";

/// Derived identity of a projected occurrence. Never stored.
pub fn virtual_occurrence_id(task_id: Uuid, due_date: DateTime<Utc>) -> String {
    format!("{}{}-{}", VIRTUAL_PREFIX, task_id, dates::to_iso_string(&due_date))
}

/// Inverse of [`virtual_occurrence_id`].
pub fn parse_virtual_occurrence_id(id: &str) -> Result<(Uuid, DateTime<Utc>), CoreError> {
    let invalid = || CoreError::InvalidInput(format!("'{}' is not a virtual occurrence id", id));

    let rest = id.strip_prefix(VIRTUAL_PREFIX).ok_or_else(invalid)?;
    // Hyphenated UUIDs are always 36 characters.
    if rest.len() < 38 || !rest.is_char_boundary(36) || rest.as_bytes()[36] != b'-' {
        return Err(invalid());
    }
    let task_id = Uuid::parse_str(&rest[..36]).map_err(|_| invalid())?;
    let due_date = dates::parse_iso_datetime(&rest[37..]).map_err(|_| invalid())?;
    Ok((task_id, due_date))
}

pub fn is_virtual_occurrence_id(id: &str) -> bool {
    id.starts_with(VIRTUAL_PREFIX)
}

/// Task-shaped record handed to callers: a persisted instance joined to its
/// template, or a projected virtual occurrence.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Occurrence {
    /// Instance id for persisted rows, `virtual-…` id for projections
    pub id: String,
    pub task_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<Uuid>,
    pub is_virtual: bool,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub priority: TaskPriority,
    pub recurrence_type: Option<RecurrenceType>,
    pub estimated_duration_minutes: Option<i64>,
    pub due_date: DateTime<Utc>,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Occurrence {
    pub fn from_instance(task: &Task, instance: &TaskInstance) -> Self {
        Self {
            id: instance.id.to_string(),
            task_id: task.id,
            instance_id: Some(instance.id),
            is_virtual: false,
            title: task.title.clone(),
            description: task.description.clone(),
            category: task.category.clone(),
            priority: task.priority,
            recurrence_type: task.recurrence(),
            estimated_duration_minutes: task.estimated_duration_minutes,
            due_date: instance.due_date,
            is_completed: instance.is_completed,
            completed_at: instance.completed_at,
        }
    }

    pub fn projected(task: &Task, due_date: DateTime<Utc>) -> Self {
        Self {
            id: virtual_occurrence_id(task.id, due_date),
            task_id: task.id,
            instance_id: None,
            is_virtual: true,
            title: task.title.clone(),
            description: task.description.clone(),
            category: task.category.clone(),
            priority: task.priority,
            recurrence_type: task.recurrence(),
            estimated_duration_minutes: task.estimated_duration_minutes,
            due_date,
            is_completed: false,
            completed_at: None,
        }
    }

    pub fn key(&self) -> OccurrenceKey {
        OccurrenceKey::new(self.task_id, self.due_date)
    }

    pub fn group_key(&self) -> GroupKey {
        GroupKey::new(&self.title, &self.category, self.recurrence_type)
    }
}

/// Occurrences sharing a [`GroupKey`], sorted by due date.
#[derive(Debug, Clone, Serialize)]
pub struct OccurrenceGroup {
    pub key: GroupKey,
    pub items: Vec<Occurrence>,
    pub earliest_due_date: DateTime<Utc>,
}

/// Points at something completable: a persisted instance or a projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OccurrenceRef {
    Instance(Uuid),
    Virtual(String),
}

#[derive(Debug, Clone, Default)]
pub struct NewTaskData {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<TaskPriority>,
    /// When present the task is created as a recurring template
    pub recurrence_type: Option<RecurrenceType>,
    pub next_due_date: DateTime<Utc>,
    pub estimated_duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTaskData {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    pub priority: Option<TaskPriority>,
    /// `Some(None)` turns a recurring template into a one-off
    pub recurrence_type: Option<Option<RecurrenceType>>,
    pub next_due_date: Option<DateTime<Utc>>,
    pub estimated_duration_minutes: Option<Option<i64>>,
    pub is_completed: Option<bool>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug)]
pub enum CompletionResult {
    /// A one-off task, or an occurrence that was not the template's anchor
    Single(TaskInstance),
    /// The anchor occurrence of a series; the template moved on
    Recurring {
        completed: TaskInstance,
        next_due_date: DateTime<Utc>,
    },
}

/// Inclusive `[start, end]` range of due dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CoreError> {
        if start > end {
            return Err(CoreError::InvalidInput(format!(
                "window start {} is after end {}",
                dates::to_iso_string(&start),
                dates::to_iso_string(&end)
            )));
        }
        Ok(Self { start, end })
    }

    /// `[now - grace_days, now + lookahead_days]`. Spans that leave the
    /// representable date range are `InvalidInput`.
    pub fn around(now: DateTime<Utc>, grace_days: u32, lookahead_days: u32) -> Result<Self, CoreError> {
        let start = now
            .checked_sub_signed(Duration::days(i64::from(grace_days)))
            .ok_or_else(|| CoreError::InvalidInput(format!("{} days of grace is out of range", grace_days)))?;
        let end = now
            .checked_add_signed(Duration::days(i64::from(lookahead_days)))
            .ok_or_else(|| CoreError::InvalidInput(format!("{} days of lookahead is out of range", lookahead_days)))?;
        Self::new(start, end)
    }

    #[inline]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Configuration for the planner - core version.
/// Kept separate from the CLI config so the two can differ in types.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Default window length into the future, in days
    pub lookahead_days: u32,
    /// Include the near past in default windows (days)
    pub grace_days: u32,
    /// Whether backfill also materializes completed templates
    pub include_completed: bool,
    /// Upper bound on projection steps per recurring template
    pub max_projection_steps: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            lookahead_days: 30,
            grace_days: 3,
            include_completed: true,
            max_projection_steps: 520,
        }
    }
}
