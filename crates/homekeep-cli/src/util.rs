use std::collections::HashSet;

use anyhow::{anyhow, Result};
use homekeep_core::error::CoreError;
use homekeep_core::models::is_virtual_occurrence_id;

const MIN_SHORT_ID_LEN: usize = 2;
const SHORT_ID_LEN: usize = 7;

/// Rejects id prefixes too short to be useful.
pub fn check_short_id(short_id: &str) -> Result<&str> {
    let trimmed = short_id.trim();
    if trimmed.len() < MIN_SHORT_ID_LEN && !is_virtual_occurrence_id(trimmed) {
        return Err(anyhow!(CoreError::InvalidInput(format!(
            "Short ID must be at least {} characters long.",
            MIN_SHORT_ID_LEN
        ))));
    }
    Ok(trimmed)
}

/// First `len` characters of an id, as shown in tables.
pub fn short_id(id: &str, len: usize) -> &str {
    id.get(..len).unwrap_or(id)
}

/// Shortest prefix length, never below seven, that keeps every id in `ids`
/// distinct. UUIDv7 ids created in the same millisecond share their first
/// twelve hex digits, so a batch of instances needs more than the default.
pub fn unique_prefix_len<'a>(ids: impl IntoIterator<Item = &'a str>) -> usize {
    let ids: Vec<&str> = ids.into_iter().collect();
    let longest = ids.iter().map(|id| id.len()).max().unwrap_or(0);

    (SHORT_ID_LEN..longest)
        .find(|&len| {
            let mut seen = HashSet::new();
            ids.iter().all(|id| seen.insert(short_id(id, len)))
        })
        .unwrap_or_else(|| longest.max(SHORT_ID_LEN))
}
