//! Core data types for outage schedules
//!
//! Pure data structures with validation: queue identifiers, wall-clock
//! times, outage intervals and per-day schedule entries. Derived facts
//! (total hours off, active status) live in [`crate::normalize`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Error;

/// Number of valid service queues (`1.1` through `6.2`)
pub const TOTAL_QUEUES: usize = 12;

/// Two-level service queue identifier, `major.minor`
///
/// Exactly twelve combinations are valid: major 1..=6, minor 1..=2.
/// Anything else is rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueId {
    major: u8,
    minor: u8,
}

impl QueueId {
    /// Create a queue id, validating the component ranges
    pub fn new(major: u8, minor: u8) -> Result<Self, Error> {
        if (1..=6).contains(&major) && (1..=2).contains(&minor) {
            Ok(Self { major, minor })
        } else {
            Err(Error::InvalidQueue(format!("{major}.{minor}")))
        }
    }

    /// All twelve valid queue ids in order
    pub fn all() -> impl Iterator<Item = QueueId> {
        (1..=6).flat_map(|major| (1..=2).map(move |minor| QueueId { major, minor }))
    }

    pub fn major(&self) -> u8 {
        self.major
    }

    pub fn minor(&self) -> u8 {
        self.minor
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for QueueId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidQueue(s.to_string());

        let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
        // Reject forms like "01.1", "1.10" or "1.1.1" before parsing digits.
        if major.len() != 1 || minor.len() != 1 {
            return Err(invalid());
        }

        let major: u8 = major.parse().map_err(|_| invalid())?;
        let minor: u8 = minor.parse().map_err(|_| invalid())?;
        QueueId::new(major, minor).map_err(|_| invalid())
    }
}

impl Serialize for QueueId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QueueId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Wall-clock time with minute resolution, stored as minutes since midnight
///
/// The range is 0..=1440 so that `24:00` is representable as the end of an
/// interval touching the day boundary. Times never carry a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u16);

impl ClockTime {
    pub const MIDNIGHT: ClockTime = ClockTime(0);
    /// End-of-day boundary, rendered as `24:00`
    pub const END_OF_DAY: ClockTime = ClockTime(24 * 60);

    /// Build from minutes since midnight (0..=1440)
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes <= 24 * 60).then_some(Self(minutes))
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }

    /// Parse `H:MM` or `HH:MM`; `24:00` is accepted as the day boundary
    pub fn parse(s: &str) -> Option<Self> {
        let (h, m) = s.split_once(':')?;
        let h: u16 = h.parse().ok()?;
        let m: u16 = m.parse().ok()?;
        if m >= 60 || h > 24 || (h == 24 && m != 0) {
            return None;
        }
        Some(Self(h * 60 + m))
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ClockTime::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid clock time: {s}")))
    }
}

/// Distinguishes the published base schedule from ad hoc adjustments
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalKind {
    /// Interval from the regular published schedule
    Base,
    /// Interval communicated via an operational notice
    Adjustment,
}

impl IntervalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalKind::Base => "base",
            IntervalKind::Adjustment => "adjustment",
        }
    }
}

impl FromStr for IntervalKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(IntervalKind::Base),
            "adjustment" => Ok(IntervalKind::Adjustment),
            other => Err(Error::Config(format!("unknown interval kind: {other}"))),
        }
    }
}

/// One outage window confined to a single calendar date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeInterval {
    pub start: ClockTime,
    pub end: ClockTime,
    #[serde(rename = "type")]
    pub kind: IntervalKind,
}

impl TimeInterval {
    /// Create an interval; `start > end` (a window crossing midnight) is
    /// rejected since each interval must fit one calendar date.
    ///
    /// `start == end` is representable here so raw parser output can carry
    /// zero-length ranges; the normalizer drops them.
    pub fn new(start: ClockTime, end: ClockTime, kind: IntervalKind) -> Result<Self, Error> {
        if start > end {
            return Err(Error::MalformedPublication(format!(
                "interval {start}\u{2013}{end} crosses midnight"
            )));
        }
        Ok(Self { start, end, kind })
    }

    pub fn duration_minutes(&self) -> u16 {
        self.end.minutes() - self.start.minutes()
    }

    /// Whether the given wall-clock instant falls inside this window
    pub fn contains(&self, t: ClockTime) -> bool {
        self.start <= t && t < self.end
    }

    /// Half-open overlap test, ignoring the kind tag
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Whether a queue is currently without power
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    /// The current instant falls inside a stored outage window
    Active,
    /// An entry exists but no window covers the current instant
    Inactive,
    /// No entry stored for the requested queue and date
    Unknown,
}

/// Canonical per-(queue, date) schedule as served to callers
///
/// `total_hours_off` and `status` are derived on every read, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleEntry {
    pub queue: QueueId,
    pub date: NaiveDate,
    pub intervals: Vec<TimeInterval>,
    pub message: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Ingestion health as reported by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct IngestHealth {
    pub last_scrape: Option<DateTime<Utc>>,
    pub available_dates: Vec<NaiveDate>,
    pub total_queues: usize,
}
