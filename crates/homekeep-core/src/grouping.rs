//! De-duplication and series clustering of occurrence lists.

use std::collections::{HashMap, HashSet};

use crate::models::{GroupKey, Occurrence, OccurrenceGroup};

/// Drops every occurrence whose key was already seen. First one wins; the
/// relative order of what is kept is unchanged.
pub fn dedupe_by_occurrence_key(occurrences: Vec<Occurrence>) -> Vec<Occurrence> {
    let mut seen = HashSet::with_capacity(occurrences.len());
    occurrences
        .into_iter()
        .filter(|occurrence| seen.insert(occurrence.key()))
        .collect()
}

/// Partitions occurrences by [`GroupKey`].
///
/// Items inside a group are ordered by due date, the group's
/// `earliest_due_date` is its first item's date, and groups are ordered by that
/// date. Both sorts are stable, so ties keep input order (groups by first
/// appearance).
pub fn group_by_key(occurrences: Vec<Occurrence>) -> Vec<OccurrenceGroup> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut buckets: Vec<(GroupKey, Vec<Occurrence>)> = Vec::new();

    for occurrence in occurrences {
        let key = occurrence.group_key();
        match index.get(&key) {
            Some(&slot) => buckets[slot].1.push(occurrence),
            None => {
                index.insert(key.clone(), buckets.len());
                buckets.push((key, vec![occurrence]));
            }
        }
    }

    let mut groups: Vec<OccurrenceGroup> = buckets
        .into_iter()
        .filter_map(|(key, mut items)| {
            items.sort_by_key(|o| o.due_date);
            let earliest_due_date = items.first()?.due_date;
            Some(OccurrenceGroup {
                key,
                items,
                earliest_due_date,
            })
        })
        .collect();

    groups.sort_by_key(|g| g.earliest_due_date);
    groups
}
