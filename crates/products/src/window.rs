//! Time-of-day windows in which stock quantities may be replaced.

use core::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};

use eafoods_core::{DomainError, DomainResult, ValueObject};

/// Inclusive local time-of-day range, e.g. `08:00-12:00`.
///
/// A range whose start is after its end wraps midnight (`22:00-02:00`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    start: NaiveTime,
    end: NaiveTime,
}

impl ValueObject for TimeRange {}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= t && t <= self.end
        } else {
            t >= self.start || t <= self.end
        }
    }
}

impl core::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

impl FromStr for TimeRange {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| DomainError::validation(format!("time range '{s}' must be HH:MM-HH:MM")))?;
        Ok(Self::new(parse_time(start)?, parse_time(end)?))
    }
}

fn parse_time(s: &str) -> DomainResult<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| DomainError::validation(format!("invalid time '{}': {e}", s.trim())))
}

/// Parse a UTC offset such as `+03:00`, `-05:30` or `Z`.
pub fn parse_utc_offset(s: &str) -> DomainResult<FixedOffset> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Ok(utc());
    }

    let invalid = || DomainError::validation(format!("invalid UTC offset '{s}', expected ±HH:MM"));

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Stock-update policy: the request time, seen in the business' local offset,
/// must fall inside at least one of the ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockUpdateWindow {
    ranges: Vec<TimeRange>,
    offset: FixedOffset,
}

impl ValueObject for StockUpdateWindow {}

impl Default for StockUpdateWindow {
    /// Morning `08:00-12:00` and evening `18:00-19:00`, UTC.
    fn default() -> Self {
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default();
        Self {
            ranges: vec![
                TimeRange::new(at(8, 0), at(12, 0)),
                TimeRange::new(at(18, 0), at(19, 0)),
            ],
            offset: utc(),
        }
    }
}

impl StockUpdateWindow {
    pub fn new(ranges: Vec<TimeRange>, offset: FixedOffset) -> DomainResult<Self> {
        if ranges.is_empty() {
            return Err(DomainError::validation(
                "at least one stock update window is required",
            ));
        }
        Ok(Self { ranges, offset })
    }

    /// Parse a comma-separated list such as `08:00-12:00,18:00-19:00`.
    pub fn parse(ranges: &str, offset: FixedOffset) -> DomainResult<Self> {
        let ranges = ranges
            .split(',')
            .filter(|r| !r.trim().is_empty())
            .map(TimeRange::from_str)
            .collect::<DomainResult<Vec<_>>>()?;
        Self::new(ranges, offset)
    }

    pub fn ranges(&self) -> &[TimeRange] {
        &self.ranges
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.offset).time();
        self.ranges.iter().any(|r| r.contains(local))
    }

    /// `OutsideWindow` unless `at` is inside one of the ranges.
    pub fn check(&self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.contains(at) {
            return Ok(());
        }
        let allowed = self
            .ranges
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Err(DomainError::outside_window(format!(
            "stock can only be updated during {allowed} (UTC{})",
            self.offset
        )))
    }
}
