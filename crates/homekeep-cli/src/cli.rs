use clap::{Parser, Subcommand};
use homekeep_core::models::{RecurrenceType, TaskPriority};

/// Homekeep: recurring home-maintenance reminders
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add a chore, optionally recurring
    Add(AddCommand),
    /// Show what is due soon, projected recurrences included
    Upcoming(UpcomingCommand),
    /// Make sure every chore due in a range has a stored occurrence
    Backfill(BackfillCommand),
    /// Mark an occurrence as done
    Do(DoCommand),
    /// Move a chore and all of its later occurrences to a new date
    Reschedule(RescheduleCommand),
    /// Print the due date that follows a date under a recurrence rule
    Next(NextCommand),
    /// Delete a chore with all of its occurrences
    Delete(DeleteCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// The title of the chore
    pub title: String,
    /// Free-form notes
    #[arg(short, long)]
    pub description: Option<String>,
    /// Category used for grouping (e.g. hvac, garden)
    #[arg(short, long)]
    pub category: Option<String>,
    /// low, medium, high or urgent
    #[arg(short, long)]
    pub priority: Option<TaskPriority>,
    /// First due date (e.g. "tomorrow", "2024-03-01"); defaults to today
    #[arg(long)]
    pub due: Option<String>,
    /// Repeat weekly, monthly, quarterly or yearly
    #[arg(short, long)]
    pub every: Option<RecurrenceType>,
    /// Estimated effort in minutes
    #[arg(long)]
    pub duration: Option<i64>,
}

#[derive(Parser, Debug, Clone)]
pub struct UpcomingCommand {
    /// Days to look ahead; defaults to the configured lookahead
    #[arg(long)]
    pub days: Option<u32>,
    /// Cluster occurrences of the same chore together
    #[arg(long)]
    pub grouped: bool,
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct BackfillCommand {
    /// Start of the range; defaults to the configured grace period before today
    #[arg(long)]
    pub from: Option<String>,
    /// End of the range; defaults to the configured lookahead after today
    #[arg(long)]
    pub to: Option<String>,
    /// Skip chores that are already completed
    #[arg(long)]
    pub exclude_completed: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DoCommand {
    /// Occurrence id, unique id prefix, or a full `virtual-…` id
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct RescheduleCommand {
    /// Chore id or unique prefix
    pub id: String,
    /// New date for the chore's next occurrence
    #[arg(long)]
    pub to: String,
}

#[derive(Parser, Debug, Clone)]
pub struct NextCommand {
    /// weekly, monthly, quarterly or yearly; anything else is treated as weekly
    pub rule: String,
    /// Anchor date in ISO form (YYYY-MM-DD or RFC 3339)
    pub date: String,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// Chore id or unique prefix
    pub id: String,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_with_recurrence() {
        let cli = Cli::try_parse_from([
            "homekeep", "add", "Replace HVAC filter", "--every", "quarterly", "--priority", "high", "--category", "hvac",
        ])
        .unwrap();

        let Commands::Add(add) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(add.title, "Replace HVAC filter");
        assert_eq!(add.every, Some(RecurrenceType::Quarterly));
        assert_eq!(add.priority, Some(TaskPriority::High));
        assert_eq!(add.category.as_deref(), Some("hvac"));
    }

    #[test]
    fn test_parse_rejects_unknown_rule() {
        assert!(Cli::try_parse_from(["homekeep", "add", "Mow", "--every", "fortnightly"]).is_err());
    }

    #[test]
    fn test_next_takes_raw_rule() {
        let cli = Cli::try_parse_from(["homekeep", "next", "biweekly", "2024-03-01"]).unwrap();
        assert!(matches!(cli.command, Commands::Next(NextCommand { ref rule, .. }) if rule == "biweekly"));
    }
}
