use anyhow::Result;
use chrono::Utc;
use chrono_tz::Tz;
use homekeep_core::dates::start_of_day;
use homekeep_core::models::NewTaskData;
use homekeep_core::planner::Planner;
use homekeep_core::repository::Repository;
use owo_colors::{OwoColorize, Style};

use crate::cli::AddCommand;
use crate::parser::parse_due_date;
use crate::timezone::format_local_date;

pub async fn add_task(planner: &Planner<impl Repository>, command: AddCommand, tz: Tz) -> Result<()> {
    let now = Utc::now();
    let next_due_date = match command.due.as_deref() {
        Some(due) => parse_due_date(due, now)?,
        None => start_of_day(now),
    };

    let new_task_data = NewTaskData {
        title: command.title,
        description: command.description,
        category: command.category,
        priority: command.priority,
        recurrence_type: command.every,
        next_due_date,
        estimated_duration_minutes: command.duration,
    };

    let added_task = planner.add_task(new_task_data).await?;

    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();

    match added_task.recurrence() {
        Some(rule) => println!(
            "{} Created {} chore: {}",
            "✓".style(success_style),
            rule,
            added_task.title.bright_white().bold()
        ),
        None => println!(
            "{} Created chore: {}",
            "✓".style(success_style),
            added_task.title.bright_white().bold()
        ),
    }
    println!(
        "  {} Task ID: {}",
        "→".style(info_style),
        added_task.id.to_string().yellow()
    );
    println!(
        "  {} Due: {}",
        "→".style(info_style),
        format_local_date(&added_task.next_due_date, tz).cyan()
    );

    Ok(())
}
