//! Week anchors.
//!
//! In memory a week is keyed by its Monday. The persistence layer stores the
//! Sunday immediately before that Monday. Conversion happens only at the
//! boundary and is a pure function of the date; nothing stores both.
//!
//! All arithmetic is on [`NaiveDate`] so there is no time-of-day or offset to
//! drift across DST changes.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Wire date format.
pub const WIRE_DATE_FORMAT: &str = "%Y-%m-%d";

/// The Monday that starts a week.
///
/// Construction always canonicalises, so a `WeekStart` is a Monday by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(from = "NaiveDate", into = "NaiveDate")]
pub struct WeekStart(NaiveDate);

impl WeekStart {
    /// Monday of the week containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self(canonicalize_to_monday(date))
    }

    /// The Monday date.
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Last day of the week (Sunday after the Monday).
    pub fn week_end(&self) -> NaiveDate {
        week_end(*self)
    }

    /// Sunday anchor used by the persistence layer.
    pub fn backend_anchor(&self) -> NaiveDate {
        to_backend_anchor(*self)
    }

    /// Following week.
    pub fn next(&self) -> Self {
        self.offset_weeks(1)
    }

    /// Preceding week.
    pub fn previous(&self) -> Self {
        self.offset_weeks(-1)
    }

    /// Shift by whole weeks. Saturates at the calendar bounds.
    pub fn offset_weeks(&self, weeks: i64) -> Self {
        let days = Days::new(weeks.unsigned_abs().saturating_mul(7));
        let shifted = if weeks >= 0 {
            self.0.checked_add_days(days)
        } else {
            self.0.checked_sub_days(days)
        };
        Self::containing(shifted.unwrap_or(self.0))
    }

    /// The seven dates Monday..Sunday.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.0.iter_days().take(7)
    }
}

impl From<NaiveDate> for WeekStart {
    fn from(date: NaiveDate) -> Self {
        Self::containing(date)
    }
}

impl From<WeekStart> for NaiveDate {
    fn from(week: WeekStart) -> Self {
        week.0
    }
}

impl fmt::Display for WeekStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(WIRE_DATE_FORMAT))
    }
}

/// Shift `date` backward to the Monday of its week. Idempotent.
pub fn canonicalize_to_monday(date: NaiveDate) -> NaiveDate {
    let back = date.weekday().num_days_from_monday() as u64;
    date.checked_sub_days(Days::new(back)).unwrap_or(date)
}

/// Monday -> the Sunday before it.
pub fn to_backend_anchor(monday: WeekStart) -> NaiveDate {
    monday.0.pred_opt().unwrap_or(monday.0)
}

/// Sunday -> the Monday after it.
///
/// A non-Sunday input is canonicalised to a Monday anyway; use
/// [`is_backend_anchor`] to detect the drift.
pub fn to_ui_anchor(sunday: NaiveDate) -> WeekStart {
    WeekStart::containing(sunday.succ_opt().unwrap_or(sunday))
}

/// Whether `date` is a well-formed backend anchor (a Sunday).
pub fn is_backend_anchor(date: NaiveDate) -> bool {
    date.weekday() == chrono::Weekday::Sun
}

/// Monday + 6 days.
pub fn week_end(monday: WeekStart) -> NaiveDate {
    monday
        .0
        .checked_add_days(Days::new(6))
        .unwrap_or(monday.0)
}

/// Parse an ISO wire date. Anything after the date part is discarded
/// unparsed, so a timestamp never shifts the calendar day.
pub fn parse_wire_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, WIRE_DATE_FORMAT).ok()
}

/// Format a date for the wire.
pub fn format_wire_date(date: NaiveDate) -> String {
    date.format(WIRE_DATE_FORMAT).to_string()
}
