//! Delivery slots and the order cut-off rule that picks their date.

use core::str::FromStr;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};

use eafoods_core::{DomainError, DomainResult, Entity, ValueObject, typed_id};

typed_id!(
    /// Delivery slot identifier.
    SlotId
);

/// Named delivery window within a day.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotLabel {
    Morning,
    Afternoon,
    Evening,
}

impl ValueObject for SlotLabel {}

impl SlotLabel {
    pub const ALL: [SlotLabel; 3] = [SlotLabel::Morning, SlotLabel::Afternoon, SlotLabel::Evening];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotLabel::Morning => "MORNING",
            SlotLabel::Afternoon => "AFTERNOON",
            SlotLabel::Evening => "EVENING",
        }
    }

    /// Human-readable delivery hours.
    pub fn hours(&self) -> &'static str {
        match self {
            SlotLabel::Morning => "8AM - 11AM",
            SlotLabel::Afternoon => "12PM - 3PM",
            SlotLabel::Evening => "4PM - 7PM",
        }
    }
}

impl core::fmt::Display for SlotLabel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotLabel {
    type Err = DomainError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        SlotLabel::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "invalid slot '{wanted}', choose one of: MORNING, AFTERNOON, EVENING"
                ))
            })
    }
}

/// A delivery slot: one label on one date. Unique per `(date, label)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySlot {
    id: SlotId,
    date: NaiveDate,
    label: SlotLabel,
}

impl DeliverySlot {
    pub fn new(id: SlotId, date: NaiveDate, label: SlotLabel) -> Self {
        Self { id, date, label }
    }

    pub fn id_typed(&self) -> SlotId {
        self.id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn label(&self) -> SlotLabel {
        self.label
    }
}

impl Entity for DeliverySlot {
    type Id = SlotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Order cut-off rule.
///
/// Orders placed before the cut-off (local time) are delivered the next day;
/// at or after it, the day after next.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeliverySchedule {
    cutoff: NaiveTime,
    offset: FixedOffset,
}

impl Default for DeliverySchedule {
    /// 18:00 cut-off, UTC.
    fn default() -> Self {
        Self {
            cutoff: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            offset: Utc.fix(),
        }
    }
}

impl DeliverySchedule {
    pub fn new(cutoff: NaiveTime, offset: FixedOffset) -> Self {
        Self { cutoff, offset }
    }

    pub fn cutoff(&self) -> NaiveTime {
        self.cutoff
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn delivery_date(&self, placed_at: DateTime<Utc>) -> DomainResult<NaiveDate> {
        let local = placed_at.with_timezone(&self.offset);
        let days = if local.time() < self.cutoff { 1 } else { 2 };
        local
            .date_naive()
            .checked_add_days(Days::new(days))
            .ok_or_else(|| DomainError::validation("delivery date out of range"))
    }
}
