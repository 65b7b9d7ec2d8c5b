use anyhow::Result;
use chrono::Utc;
use homekeep_core::models::DateWindow;
use homekeep_core::planner::Planner;
use homekeep_core::repository::Repository;
use owo_colors::OwoColorize;

use crate::cli::BackfillCommand;
use crate::parser::parse_due_date;

pub async fn backfill(planner: &Planner<impl Repository>, command: BackfillCommand) -> Result<()> {
    let now = Utc::now();
    let default_window = planner.default_window(now)?;
    let start = match command.from.as_deref() {
        Some(from) => parse_due_date(from, now)?,
        None => default_window.start,
    };
    let end = match command.to.as_deref() {
        Some(to) => parse_due_date(to, now)?,
        None => default_window.end,
    };
    let window = DateWindow::new(start, end)?;

    let include_completed = planner.config().include_completed && !command.exclude_completed;
    let summary = planner.backfill(&window, include_completed).await?;

    println!(
        "{} Backfill complete: {} chores due, {} already stored, {} added",
        "✓".green().bold(),
        summary.templates_in_window,
        summary.already_present,
        summary.inserted
    );
    Ok(())
}
