use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Store is not configured: {0}")]
    NotConfigured(String),

    #[error("No user is signed in.")]
    NoCurrentUser,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Store rejected the write: {0}")]
    Store(String),

    #[error("Ambiguous short ID. Did you mean one of these?")]
    AmbiguousId(Vec<(String, String)>), // Vec of (ID, Title)

    #[error("Recurrence did not advance past {0}")]
    NoForwardProgress(DateTime<Utc>),

    #[error("Projection for task {task_id} exceeded {limit} steps")]
    ProjectionLimit { task_id: String, limit: usize },
}
