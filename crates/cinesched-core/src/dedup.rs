//! Duplicate folding: one record per showing key, first source wins.

use std::collections::HashMap;

use crate::model::{ShowingKey, ShowingRecord};

/// A later duplicate that carried a different non-empty booking URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlConflict {
    /// Identity of the merged showing.
    pub key: ShowingKey,
    /// URL that was kept.
    pub kept: String,
    /// URL that was discarded.
    pub discarded: String,
}

/// Result of [`merge_duplicates`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Unique records in first-seen order.
    pub records: Vec<ShowingRecord>,
    /// Number of duplicates folded into an earlier record.
    pub merged: usize,
    /// Booking URL disagreements between merged duplicates.
    pub url_conflicts: Vec<UrlConflict>,
}

/// Collapses records sharing `(cinemaId, filmTitle, startTime, format)`.
///
/// The first occurrence keeps its position. Its booking URL wins unless it
/// is empty, in which case the first later non-empty URL fills it in.
#[must_use]
pub fn merge_duplicates(records: Vec<ShowingRecord>) -> MergeOutcome {
    let mut index: HashMap<ShowingKey, usize> = HashMap::with_capacity(records.len());
    let mut out = MergeOutcome {
        records: Vec::with_capacity(records.len()),
        ..MergeOutcome::default()
    };

    for record in records {
        let key = record.key();
        let Some(&position) = index.get(&key) else {
            index.insert(key, out.records.len());
            out.records.push(record);
            continue;
        };
        let Some(kept) = out.records.get_mut(position) else {
            continue;
        };

        out.merged = out.merged.saturating_add(1);
        if record.booking_url.is_empty() || record.booking_url == kept.booking_url {
            continue;
        }
        if kept.booking_url.is_empty() {
            kept.booking_url = record.booking_url;
        } else {
            tracing::debug!(
                cinema = %key.cinema,
                title = %key.title,
                kept = %kept.booking_url,
                discarded = %record.booking_url,
                "Booking URL conflict on merge"
            );
            out.url_conflicts.push(UrlConflict {
                key,
                kept: kept.booking_url.clone(),
                discarded: record.booking_url,
            });
        }
    }

    out
}
