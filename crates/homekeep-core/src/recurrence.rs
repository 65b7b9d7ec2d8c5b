//! Recurrence arithmetic.
//!
//! Monthly-based rules go through [`chrono::Months`], which clamps the day of
//! month to the last day of the target month (Jan 31 + 1 month = Feb 28/29).

use chrono::{DateTime, Duration, Months, Utc};

use crate::dates::{self, IsoPrecision};
use crate::error::CoreError;
use crate::models::RecurrenceType;

impl RecurrenceType {
    /// Calendar months per step, `None` for day-based rules.
    fn months_per_step(&self) -> Option<u32> {
        match self {
            RecurrenceType::Weekly => None,
            RecurrenceType::Monthly => Some(1),
            RecurrenceType::Quarterly => Some(3),
            RecurrenceType::Yearly => Some(12),
        }
    }
}

/// Computes the due date that follows `anchor` under `rule`.
///
/// # Behavior
/// - weekly: anchor + 7 days
/// - monthly / quarterly: anchor + 1 / 3 calendar months, day clamped to month end
/// - yearly: anchor + 12 months, so Feb 29 lands on Feb 28 in non-leap years
///
/// The result is always strictly later than `anchor`. Dates outside chrono's
/// representable range yield [`CoreError::InvalidDate`].
pub fn next_due_date(rule: RecurrenceType, anchor: DateTime<Utc>) -> Result<DateTime<Utc>, CoreError> {
    let next = match rule.months_per_step() {
        None => anchor.checked_add_signed(Duration::days(7)),
        Some(months) => anchor.checked_add_months(Months::new(months)),
    };

    next.ok_or_else(|| {
        CoreError::InvalidDate(format!(
            "{} step from {} is out of range",
            rule,
            dates::to_iso_string(&anchor)
        ))
    })
}

/// String-level form of [`next_due_date`].
///
/// An unknown or missing rule is scheduled weekly. A date-only anchor
/// (`2024-01-31`) yields a date-only result; anything else comes back in the
/// canonical ISO form.
pub fn next_due_date_iso(rule: Option<&str>, anchor: &str) -> Result<String, CoreError> {
    let (anchor_dt, precision) = dates::parse_iso(anchor)?;
    let next = next_due_date(RecurrenceType::from_rule(rule), anchor_dt)?;
    Ok(dates::format_iso(&next, precision))
}

/// Iterator over the due dates of a rule, starting one step after an anchor.
///
/// Each step is checked for strict forward progress; a step that fails to move
/// time forward ends the iteration with [`CoreError::NoForwardProgress`].
#[derive(Debug, Clone)]
pub struct Recurrence {
    rule: RecurrenceType,
    current: DateTime<Utc>,
    failed: bool,
}

impl Recurrence {
    pub fn after(rule: RecurrenceType, anchor: DateTime<Utc>) -> Self {
        Self {
            rule,
            current: anchor,
            failed: false,
        }
    }
}

impl Iterator for Recurrence {
    type Item = Result<DateTime<Utc>, CoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let step = next_due_date(self.rule, self.current).and_then(|next| {
            if next <= self.current {
                Err(CoreError::NoForwardProgress(self.current))
            } else {
                Ok(next)
            }
        });

        match step {
            Ok(next) => {
                self.current = next;
                Some(Ok(next))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
