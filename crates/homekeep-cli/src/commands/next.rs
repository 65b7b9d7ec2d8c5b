use anyhow::Result;
use homekeep_core::recurrence::next_due_date_iso;

use crate::cli::NextCommand;

/// Prints the date after `command.date` under `command.rule`. Needs no store.
pub fn print_next(command: NextCommand) -> Result<()> {
    println!("{}", next_due_date_iso(Some(&command.rule), &command.date)?);
    Ok(())
}
