use chrono::{DateTime, Utc};
use chrono_humanize::Humanize;
use chrono_tz::Tz;
use comfy_table::{Attribute, Cell, Color, Row, Table};
use homekeep_core::models::{Occurrence, OccurrenceGroup, TaskPriority};

use crate::timezone::format_local_date;
use crate::util::{short_id, unique_prefix_len};

const RECURRING_MARK: char = '↻';

fn title_cell(occurrence: &Occurrence) -> Cell {
    let mut title = String::new();
    if occurrence.is_virtual {
        title.push(RECURRING_MARK);
        title.push(' ');
    }
    title.push_str(&occurrence.title);

    let cell = Cell::new(title);
    if occurrence.is_completed {
        return cell.add_attribute(Attribute::CrossedOut).fg(Color::DarkGrey);
    }
    match occurrence.priority {
        TaskPriority::Urgent => cell.fg(Color::Red).add_attribute(Attribute::Bold),
        TaskPriority::High => cell.fg(Color::Red),
        TaskPriority::Medium => cell.fg(Color::Yellow),
        TaskPriority::Low => cell.fg(Color::Green),
    }
}

fn due_cell(occurrence: &Occurrence, now: DateTime<Utc>, tz: Tz) -> Cell {
    let due = occurrence.due_date;
    let text = format!("{} ({})", format_local_date(&due, tz), due.humanize());
    let cell = Cell::new(text);

    if occurrence.is_completed {
        cell
    } else if due.with_timezone(&tz).date_naive() == now.with_timezone(&tz).date_naive() {
        cell.fg(Color::Yellow) // Due today
    } else if due < now {
        cell.fg(Color::Red) // Overdue
    } else {
        cell
    }
}

fn occurrence_row(occurrence: &Occurrence, id_len: usize, now: DateTime<Utc>, tz: Tz) -> Row {
    let mut row = Row::new();
    // Virtual ids cannot be abbreviated; `do` needs them whole.
    let id = if occurrence.is_virtual {
        occurrence.id.as_str()
    } else {
        short_id(&occurrence.id, id_len)
    };
    row.add_cell(Cell::new(id));
    row.add_cell(title_cell(occurrence));
    row.add_cell(Cell::new(&occurrence.category));
    row.add_cell(Cell::new(
        occurrence.recurrence_type.map_or("once".to_string(), |r| r.to_string()),
    ));
    row.add_cell(due_cell(occurrence, now, tz));
    row.add_cell(Cell::new(
        occurrence
            .estimated_duration_minutes
            .map_or(String::new(), |m| format!("{}m", m)),
    ));
    row.add_cell(Cell::new(if occurrence.is_completed { "done" } else { "" }).fg(Color::Green));
    row
}

fn stored_id_len<'a>(occurrences: impl IntoIterator<Item = &'a Occurrence>) -> usize {
    unique_prefix_len(
        occurrences
            .into_iter()
            .filter(|o| !o.is_virtual)
            .map(|o| o.id.as_str()),
    )
}

fn occurrence_table() -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Category", "Repeats", "Due", "Est.", ""]);
    table
}

pub fn display_occurrences(occurrences: &[Occurrence], now: DateTime<Utc>, tz: Tz) {
    if occurrences.is_empty() {
        println!("Nothing due.");
        return;
    }

    let id_len = stored_id_len(occurrences);
    let mut table = occurrence_table();
    for occurrence in occurrences {
        table.add_row(occurrence_row(occurrence, id_len, now, tz));
    }
    println!("{table}");

    if occurrences.iter().any(|o| o.is_virtual) {
        println!("{} projected, not yet stored", RECURRING_MARK);
    }
}

pub fn display_groups(groups: &[OccurrenceGroup], now: DateTime<Utc>, tz: Tz) {
    if groups.is_empty() {
        println!("Nothing due.");
        return;
    }

    let id_len = stored_id_len(groups.iter().flat_map(|g| &g.items));
    for group in groups {
        let Some(first) = group.items.first() else {
            continue;
        };
        println!(
            "{} · {} occurrence{} · next {}",
            first.title,
            group.items.len(),
            if group.items.len() == 1 { "" } else { "s" },
            format_local_date(&group.earliest_due_date, tz)
        );
        let mut table = occurrence_table();
        for occurrence in &group.items {
            table.add_row(occurrence_row(occurrence, id_len, now, tz));
        }
        println!("{table}");
    }
}
