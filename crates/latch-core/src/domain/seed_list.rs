//! Denylist seed file parsing.
//!
//! Format: one domain per line. Blank lines and `#` comments are ignored, a
//! leading `*.` wildcard is stripped, and entries are deduplicated
//! case-insensitively.

use std::collections::BTreeSet;

const COMMENT_PREFIX: char = '#';
const WILDCARD_PREFIX: &str = "*.";

/// Normalize one line into a storable entry, or `None` if it carries no entry.
pub fn normalize_entry(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIX) {
        return None;
    }
    let entry = trimmed.strip_prefix(WILDCARD_PREFIX).unwrap_or(trimmed).trim();
    if entry.is_empty() {
        return None;
    }
    Some(entry.to_lowercase())
}

/// Parse a whole seed source into its deduplicated, sorted entry set.
pub fn parse_seed_list(text: &str) -> BTreeSet<String> {
    text.lines().filter_map(normalize_entry).collect()
}
