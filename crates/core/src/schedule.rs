// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delivery schedule slots and next-slot arithmetic.
//!
//! A [`Schedule`] is an ordered set of `HH:MM` wall-clock slots in some
//! named time zone. [`Schedule::next_slot_after`] is the sole authority on
//! "when is the next regular drain": it returns the earliest instant
//! strictly greater than the probe whose local time matches a slot,
//! rolling to the next day once today's slots are exhausted.

use chrono::{DateTime, Days, Duration, LocalResult, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Days scanned past the probe date before giving up. Slots recur daily,
/// so more than one extra day is only needed when a DST gap swallows a
/// slot on the first candidate day.
const MAX_LOOKAHEAD_DAYS: u64 = 7;

/// Error parsing a single `HH:MM` token.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid schedule slot {0:?}: expected HH:MM")]
pub struct SlotParseError(pub String);

/// A single `HH:MM` wall-clock slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slot {
    hour: u8,
    minute: u8,
}

impl Slot {
    /// Build a slot, rejecting out-of-range components.
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    fn naive_time(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
    }
}

impl FromStr for Slot {
    type Err = SlotParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || SlotParseError(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(err)?;
        let hour: u8 = h.parse().map_err(|_| err())?;
        let minute: u8 = m.parse().map_err(|_| err())?;
        Slot::new(hour, minute).ok_or_else(err)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<String> for Slot {
    type Error = SlotParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Slot> for String {
    fn from(slot: Slot) -> Self {
        slot.to_string()
    }
}

/// An ordered, deduplicated set of delivery slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule {
    slots: Vec<Slot>,
}

impl Schedule {
    pub fn new(mut slots: Vec<Slot>) -> Self {
        slots.sort();
        slots.dedup();
        Self { slots }
    }

    /// Parse `HH:MM` tokens leniently: invalid tokens are skipped and
    /// returned alongside the schedule so the caller can log them.
    pub fn parse_lenient<I, S>(tokens: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut slots = Vec::new();
        let mut rejected = Vec::new();
        for token in tokens {
            match token.as_ref().parse::<Slot>() {
                Ok(slot) => slots.push(slot),
                Err(_) => rejected.push(token.as_ref().to_string()),
            }
        }
        (Self::new(slots), rejected)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Earliest instant strictly after `t` whose local `HH:MM` in `tz`
    /// matches a slot.
    ///
    /// Empty schedule degenerates to `t + 24h`. A slot falling into a DST
    /// gap is skipped for that day; an ambiguous local time resolves to
    /// the earlier mapping.
    pub fn next_slot_after(&self, t: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
        if self.slots.is_empty() {
            return t + Duration::hours(24);
        }

        let start_date = t.with_timezone(&tz).date_naive();
        for day in 0..=MAX_LOOKAHEAD_DAYS {
            let Some(date) = start_date.checked_add_days(Days::new(day)) else {
                break;
            };
            for slot in &self.slots {
                let Some(time) = slot.naive_time() else {
                    continue;
                };
                let candidate = match tz.from_local_datetime(&date.and_time(time)) {
                    LocalResult::Single(dt) => dt,
                    LocalResult::Ambiguous(earliest, _) => earliest,
                    LocalResult::None => continue,
                };
                let candidate = candidate.with_timezone(&Utc);
                if candidate > t {
                    return candidate;
                }
            }
        }

        // Unreachable with a sane zone database; match the empty-schedule
        // degenerate case rather than loop forever.
        t + Duration::hours(24)
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
