//! Interval normalization and derived facts
//!
//! Pure functions over interval lists. Normalization produces the canonical
//! form stored and served for each queue/date: sorted by start, zero-length
//! ranges dropped, overlapping or adjacent ranges of the same kind merged.
//! Derived facts (`total_hours_off`, active status) are recomputed on every
//! read so they can never go stale.

use chrono::{DateTime, NaiveDate, Timelike};
use chrono_tz::Tz;

use crate::models::{ClockTime, IntervalKind, QueueStatus, TimeInterval};

/// Normalize a raw interval list into canonical form
///
/// Idempotent: normalizing an already-normalized list returns it unchanged.
pub fn normalize(intervals: Vec<TimeInterval>) -> Vec<TimeInterval> {
    let mut base = Vec::new();
    let mut adjustment = Vec::new();

    for iv in intervals {
        if iv.duration_minutes() == 0 {
            continue;
        }
        match iv.kind {
            IntervalKind::Base => base.push(iv),
            IntervalKind::Adjustment => adjustment.push(iv),
        }
    }

    let mut merged = merge_same_kind(base);
    merged.extend(merge_same_kind(adjustment));
    merged.sort_by_key(|iv| (iv.start, iv.end, iv.kind));
    merged
}

/// Merge overlapping or touching intervals; all inputs share one kind
fn merge_same_kind(mut intervals: Vec<TimeInterval>) -> Vec<TimeInterval> {
    intervals.sort_by_key(|iv| (iv.start, iv.end));

    let mut merged: Vec<TimeInterval> = Vec::with_capacity(intervals.len());
    for iv in intervals {
        match merged.last_mut() {
            Some(last) if iv.start <= last.end => {
                if iv.end > last.end {
                    last.end = iv.end;
                }
            }
            _ => merged.push(iv),
        }
    }

    merged
}

/// Total outage duration in hours, rounded to one decimal place
pub fn total_hours_off(intervals: &[TimeInterval]) -> f64 {
    let minutes: u32 = intervals.iter().map(|iv| iv.duration_minutes() as u32).sum();
    (minutes as f64 / 60.0 * 10.0).round() / 10.0
}

/// Queue status for a stored entry, relative to `now` in the utility's
/// civil timezone
///
/// A queue is `Active` only when `now` falls on the entry's date and inside
/// one of its windows; entries for other dates report `Inactive`. Missing
/// entries are `Unknown` and handled by the caller.
pub fn status_at(entry_date: NaiveDate, intervals: &[TimeInterval], now: DateTime<Tz>) -> QueueStatus {
    if now.date_naive() != entry_date {
        return QueueStatus::Inactive;
    }

    let t = ClockTime::from_minutes((now.hour() * 60 + now.minute()) as u16)
        .unwrap_or(ClockTime::MIDNIGHT);

    if intervals.iter().any(|iv| iv.contains(t)) {
        QueueStatus::Active
    } else {
        QueueStatus::Inactive
    }
}
