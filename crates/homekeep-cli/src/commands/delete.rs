use anyhow::Result;
use dialoguer::Confirm;
use homekeep_core::planner::Planner;
use homekeep_core::repository::Repository;
use owo_colors::OwoColorize;

use crate::cli::DeleteCommand;
use crate::util::check_short_id;

pub async fn delete_task(planner: &Planner<impl Repository>, command: DeleteCommand) -> Result<()> {
    let task = planner.resolve_task(check_short_id(&command.id)?).await?;

    if !command.force {
        let confirmation = Confirm::new()
            .with_prompt(format!(
                "Delete '{}' and all of its occurrences?",
                task.title
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirmation {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    planner.delete_task(task.id).await?;
    println!("{} Deleted '{}'", "✓".green().bold(), task.title);
    Ok(())
}
