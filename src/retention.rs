//! Retention ladder
//!
//! The one table both the read path (slot selection) and the write path
//! (rollup and flush triggers) consult.
//!
//! | slot | history | step  | item epoch | rollup at | flush at |
//! |------|---------|-------|------------|-----------|----------|
//! | 1m   | 1d      | 60    | 1h         | 5         | 60       |
//! | 5m   | 7d      | 300   | 1d         | 12        | 288      |
//! | 1h   | 30d     | 3600  | 1w         | 24        | 168      |
//! | 1d   | 1y      | 86400 | 1y         | -         | 365      |

use crate::error::{Error, Result};
use crate::types::{align_timestamp, Timestamp};
use serde::Serialize;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const YEAR: i64 = 365 * DAY;

/// Most cold items one read may touch
///
/// Only the 1d slot can reach it, so a window may span at most this many
/// years; that also bounds every dense series built from the read.
pub const MAX_TIME_SLOTS: i64 = 1024;

/// One resolution of the ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Retention {
    /// Slot name, also the hot key prefix
    pub slot: &'static str,
    /// History label
    pub history: &'static str,
    /// History in seconds, added to the item epoch for the cold TTL
    pub history_secs: i64,
    /// Seconds between points
    pub timestamp_step: i64,
    /// Width of one cold item
    pub item_epoch_step: i64,
    /// Hot length that triggers a rollup into the next slot
    pub number_of_points: Option<usize>,
    /// Hot length that triggers a flush to the cold store
    pub flush_points: usize,
}

impl Retention {
    /// Floor `ts` to this slot's step
    pub fn align(&self, ts: Timestamp) -> Timestamp {
        align_timestamp(ts, self.timestamp_step)
    }

    /// Floor `ts` to this slot's cold item boundary
    pub fn item_epoch(&self, ts: Timestamp) -> Timestamp {
        align_timestamp(ts, self.item_epoch_step)
    }
}

/// The ladder, finest first
pub const LADDER: [Retention; 4] = [
    Retention {
        slot: "1m",
        history: "1d",
        history_secs: DAY,
        timestamp_step: MINUTE,
        item_epoch_step: HOUR,
        number_of_points: Some(5),
        flush_points: 60,
    },
    Retention {
        slot: "5m",
        history: "7d",
        history_secs: WEEK,
        timestamp_step: 5 * MINUTE,
        item_epoch_step: DAY,
        number_of_points: Some(12),
        flush_points: 288,
    },
    Retention {
        slot: "1h",
        history: "30d",
        history_secs: 30 * DAY,
        timestamp_step: HOUR,
        item_epoch_step: WEEK,
        number_of_points: Some(24),
        flush_points: 168,
    },
    Retention {
        slot: "1d",
        history: "1y",
        history_secs: YEAR,
        timestamp_step: DAY,
        item_epoch_step: YEAR,
        number_of_points: None,
        flush_points: 365,
    },
];

/// Finest slot; every write lands here first
pub fn finest() -> &'static Retention {
    &LADDER[0]
}

/// Lookup by slot name
pub fn by_slot(slot: &str) -> Option<&'static Retention> {
    LADDER.iter().find(|r| r.slot == slot)
}

/// The entry after `slot`, if any
pub fn next_coarser(slot: &str) -> Option<&'static Retention> {
    let idx = LADDER.iter().position(|r| r.slot == slot)?;
    LADDER.get(idx + 1)
}

/// Resolution for a query range: `>=1y` 1d, `>=1w` 1h, `>=1d` 5m, else 1m
pub fn select_retention(from: Timestamp, until: Timestamp) -> &'static Retention {
    let range = until.saturating_sub(from);
    if range >= YEAR {
        &LADDER[3]
    } else if range >= WEEK {
        &LADDER[2]
    } else if range >= DAY {
        &LADDER[1]
    } else {
        &LADDER[0]
    }
}

/// A cold item coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    /// Item boundary
    pub item_epoch: Timestamp,
    /// Point step inside the item
    pub step: i64,
}

impl TimeSlot {
    /// Cold range key, `"{item_epoch}:{step}"`
    pub fn range_key(&self) -> String {
        format!("{}:{}", self.item_epoch, self.step)
    }
}

/// First item boundary and number of cold items for `[from, until]`
///
/// Computed in `i128` so windows near the ends of the `i64` range cannot
/// overflow while aligning.
fn slot_span(from: Timestamp, until: Timestamp) -> (&'static Retention, i128, i128) {
    let retention = select_retention(from, until);
    if from > until {
        return (retention, i128::from(from), 0);
    }
    let step = i128::from(retention.item_epoch_step);
    let from = i128::from(from);
    let first = from - from.rem_euclid(step);
    (retention, first, (i128::from(until) - first) / step + 1)
}

/// Reject windows wider than [`MAX_TIME_SLOTS`] cold items
pub fn check_window(from: Timestamp, until: Timestamp) -> Result<()> {
    let (_, _, count) = slot_span(from, until);
    if count > i128::from(MAX_TIME_SLOTS) {
        return Err(Error::argument(
            "fetch",
            format!(
                "window {from}..{until} spans {count} cold items, at most {MAX_TIME_SLOTS} are allowed"
            ),
        ));
    }
    Ok(())
}

/// Cold items covering `[from, until]`, sorted by epoch
pub fn select_time_slots(from: Timestamp, until: Timestamp) -> Result<Vec<TimeSlot>> {
    check_window(from, until)?;
    let (retention, first, count) = slot_span(from, until);
    let step = i128::from(retention.item_epoch_step);
    Ok((0..count)
        .filter_map(|i| i64::try_from(first + i * step).ok())
        .map(|item_epoch| TimeSlot {
            item_epoch,
            step: retention.timestamp_step,
        })
        .collect())
}
