pub mod add;
pub mod backfill;
pub mod delete;
pub mod r#do;
pub mod next;
pub mod reschedule;
pub mod upcoming;
