use anyhow::Result;
use chrono::Utc;
use chrono_tz::Tz;
use homekeep_core::models::CompletionResult;
use homekeep_core::planner::Planner;
use homekeep_core::repository::Repository;
use owo_colors::OwoColorize;

use crate::cli::DoCommand;
use crate::timezone::format_local_date;
use crate::util::check_short_id;

pub async fn do_occurrence(planner: &Planner<impl Repository>, command: DoCommand, tz: Tz) -> Result<()> {
    let input = check_short_id(&command.id)?;
    let reference = planner.resolve_occurrence(input).await?;

    match planner.complete_occurrence(&reference, Utc::now()).await? {
        CompletionResult::Single(instance) => {
            println!(
                "{} Completed occurrence due {}",
                "✓".green().bold(),
                format_local_date(&instance.due_date, tz)
            );
        }
        CompletionResult::Recurring {
            completed,
            next_due_date,
        } => {
            println!(
                "{} Completed occurrence due {}",
                "✓".green().bold(),
                format_local_date(&completed.due_date, tz)
            );
            println!(
                "  {} Next due {}",
                "→".blue(),
                format_local_date(&next_due_date, tz).cyan()
            );
        }
    }

    Ok(())
}
