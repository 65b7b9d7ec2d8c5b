//! # Homekeep Core Library
//!
//! Scheduling core for recurring home-maintenance chores: weekly, monthly,
//! quarterly and yearly templates, the concrete occurrences they produce, and
//! the bookkeeping that keeps the two in step.
//!
//! ## Features
//!
//! - **Calendar-correct recurrence**: month-based rules clamp to the end of
//!   short months instead of skipping them
//! - **Lazy backfill**: every template anchor inside a window gets exactly one
//!   instance row, however often the backfill runs
//! - **Virtual projection**: future occurrences are shown without being stored
//! - **Series shifting**: move the rest of a series without tripping the
//!   `(task_id, due_date)` uniqueness rule
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Templates, instances, occurrences and their keys
//! - [`repository`]: Data access traits with SQLite and in-memory backends
//! - [`recurrence`]: Next-due-date arithmetic
//! - [`reconcile`]: Instance backfill
//! - [`projection`]: Virtual occurrence projection
//! - [`shift`]: Series shifting
//! - [`grouping`]: De-duplication and clustering for display
//! - [`planner`]: The facade tying the above together
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use homekeep_core::{
//!     db, models::{NewTaskData, PlannerConfig, RecurrenceType},
//!     planner::Planner, repository::SqliteRepository,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), homekeep_core::error::CoreError> {
//!     let pool = db::establish_connection(Some("homekeep.db")).await?;
//!     let repo = Arc::new(SqliteRepository::new(pool, Some("me".to_string())));
//!     let planner = Planner::new(repo, PlannerConfig::default());
//!
//!     planner
//!         .add_task(NewTaskData {
//!             title: "Replace HVAC filter".to_string(),
//!             recurrence_type: Some(RecurrenceType::Quarterly),
//!             next_due_date: Utc::now(),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     let window = planner.default_window(Utc::now())?;
//!     for occurrence in planner.upcoming(&window).await? {
//!         println!("{} {}", occurrence.due_date, occurrence.title);
//!     }
//!     Ok(())
//! }
//! ```

pub mod dates;
pub mod db;
pub mod error;
pub mod grouping;
pub mod models;
pub mod planner;
pub mod projection;
pub mod reconcile;
pub mod recurrence;
pub mod repository;
pub mod shift;
