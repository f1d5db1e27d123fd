//! Time range coverage model

use serde::{Deserialize, Serialize};

/// Half-open `[start, end)` interval in Unix ms marked as fully cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    /// Create a range, rejecting empty or inverted intervals
    pub fn new(start: i64, end: i64) -> crate::Result<Self> {
        if start >= end {
            return Err(crate::Error::InvalidInput(format!(
                "range start ({start}) must be before end ({end})"
            )));
        }
        Ok(Self { start, end })
    }

    pub const fn contains(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

/// Insert `range` into a sorted, disjoint list, merging overlapping and
/// touching neighbours so the list stays sorted and disjoint.
pub fn insert_range(ranges: &mut Vec<TimeRange>, range: TimeRange) {
    let mut merged = range;
    let mut kept = Vec::with_capacity(ranges.len() + 1);

    for existing in ranges.drain(..) {
        if existing.end < merged.start || existing.start > merged.end {
            kept.push(existing);
        } else {
            merged.start = merged.start.min(existing.start);
            merged.end = merged.end.max(existing.end);
        }
    }

    kept.push(merged);
    kept.sort();
    *ranges = kept;
}

/// Whether `query` lies entirely inside the union of `ranges`.
///
/// `ranges` must be sorted and disjoint, as maintained by [`insert_range`].
pub fn covers(ranges: &[TimeRange], query: TimeRange) -> bool {
    let mut cursor = query.start;
    for range in ranges {
        if range.end <= cursor {
            continue;
        }
        if range.start > cursor {
            return false;
        }
        cursor = range.end;
        if cursor >= query.end {
            return true;
        }
    }
    false
}
