use anyhow::Result;
use chrono::Utc;
use chrono_tz::Tz;
use homekeep_core::models::DateWindow;
use homekeep_core::planner::Planner;
use homekeep_core::repository::Repository;

use crate::cli::UpcomingCommand;
use crate::views::table::{display_groups, display_occurrences};

pub async fn list_upcoming(planner: &Planner<impl Repository>, command: UpcomingCommand, tz: Tz) -> Result<()> {
    let now = Utc::now();
    let lookahead = command.days.unwrap_or(planner.config().lookahead_days);
    let window = DateWindow::around(now, planner.config().grace_days, lookahead)?;

    if command.grouped {
        let groups = planner.upcoming_groups(&window).await?;
        if command.json {
            println!("{}", serde_json::to_string_pretty(&groups)?);
        } else {
            display_groups(&groups, now, tz);
        }
    } else {
        let occurrences = planner.upcoming(&window).await?;
        if command.json {
            println!("{}", serde_json::to_string_pretty(&occurrences)?);
        } else {
            display_occurrences(&occurrences, now, tz);
        }
    }

    Ok(())
}
