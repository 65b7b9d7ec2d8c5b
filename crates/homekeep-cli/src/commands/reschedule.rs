use anyhow::Result;
use chrono::Utc;
use chrono_tz::Tz;
use homekeep_core::planner::Planner;
use homekeep_core::repository::Repository;
use owo_colors::OwoColorize;

use crate::cli::RescheduleCommand;
use crate::parser::parse_due_date;
use crate::timezone::format_local_date;
use crate::util::check_short_id;

pub async fn reschedule(planner: &Planner<impl Repository>, command: RescheduleCommand, tz: Tz) -> Result<()> {
    let task = planner.resolve_task(check_short_id(&command.id)?).await?;
    let new_anchor = parse_due_date(&command.to, Utc::now())?;

    let summary = planner.reschedule_series(task.id, new_anchor).await?;

    println!(
        "{} Moved '{}' to {}",
        "✓".green().bold(),
        task.title,
        format_local_date(&new_anchor, tz).cyan()
    );
    if summary.shifted > 0 {
        println!(
            "  {} {} stored occurrence{} shifted by {} day{}",
            "→".blue(),
            summary.shifted,
            if summary.shifted == 1 { "" } else { "s" },
            summary.delta.num_days(),
            if summary.delta.num_days().abs() == 1 { "" } else { "s" }
        );
    }
    Ok(())
}
