//! Days, shifts and facility shift sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::error::ValidationError;

/// Day of a Monday-anchored week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    /// Monday..Sunday.
    pub const ALL: [Day; 7] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];

    /// Monday..Friday.
    pub const WEEKDAYS: [Day; 5] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
    ];

    /// Saturday and Sunday.
    pub const WEEKEND: [Day; 2] = [Day::Saturday, Day::Sunday];

    /// Full name, as used by the nested `per_day_data` shape.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
            Self::Sunday => "Sunday",
        }
    }

    /// Three-letter label used in summaries and charts.
    pub fn short_label(&self) -> &'static str {
        match self {
            Self::Monday => "Mon",
            Self::Tuesday => "Tue",
            Self::Wednesday => "Wed",
            Self::Thursday => "Thu",
            Self::Friday => "Fri",
            Self::Saturday => "Sat",
            Self::Sunday => "Sun",
        }
    }

    /// Prefix written by the legacy flat shape (`TuesShift2Time`).
    pub fn flat_prefix(&self) -> &'static str {
        match self {
            Self::Monday => "Mon",
            Self::Tuesday => "Tues",
            Self::Wednesday => "Wed",
            Self::Thursday => "Thurs",
            Self::Friday => "Fri",
            Self::Saturday => "Sat",
            Self::Sunday => "Sun",
        }
    }

    /// Look up a day by its full name, ignoring case.
    pub fn from_name(name: &str) -> Option<Day> {
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Whether Saturday or Sunday.
    pub fn is_weekend(&self) -> bool {
        matches!(self, Self::Saturday | Self::Sunday)
    }

    /// Position in the week, Monday = 0.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl From<chrono::Weekday> for Day {
    fn from(weekday: chrono::Weekday) -> Self {
        Self::ALL[weekday.num_days_from_monday() as usize]
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A facility work period.
///
/// The discriminant is the flat-shape shift index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum Shift {
    Day = 1,
    Swing = 2,
    #[serde(rename = "NOC")]
    Noc = 3,
}

impl Shift {
    /// Day, Swing, NOC.
    pub const ALL: [Shift; 3] = [Shift::Day, Shift::Swing, Shift::Noc];

    /// Label used in the nested shape and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Day => "Day",
            Self::Swing => "Swing",
            Self::Noc => "NOC",
        }
    }

    /// Index used in flat keys (`Shift<N>Time`).
    pub fn flat_index(&self) -> u32 {
        *self as u32
    }

    /// Inverse of [`Shift::flat_index`].
    pub fn from_flat_index(index: u32) -> Option<Shift> {
        Self::ALL.into_iter().find(|s| s.flat_index() == index)
    }

    /// Look up a shift by label, ignoring case.
    pub fn from_label(label: &str) -> Option<Shift> {
        Self::ALL
            .into_iter()
            .find(|s| s.label().eq_ignore_ascii_case(label.trim()))
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Facility shift format, as exposed by the facility catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum ShiftFormat {
    #[serde(rename = "2_shift")]
    TwoShift,
    #[serde(rename = "3_shift")]
    ThreeShift,
}

impl ShiftFormat {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwoShift => "2_shift",
            Self::ThreeShift => "3_shift",
        }
    }
}

impl Default for ShiftFormat {
    fn default() -> Self {
        Self::ThreeShift
    }
}

impl FromStr for ShiftFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "2_shift" => Ok(Self::TwoShift),
            "3_shift" => Ok(Self::ThreeShift),
            other => Err(ValidationError::UnknownShiftFormat(other.to_string())),
        }
    }
}

/// Shifts a facility actually runs. Determines which matrix cells are legal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftSet {
    shifts: BTreeSet<Shift>,
}

impl ShiftSet {
    /// Shift set for a facility format.
    pub fn for_format(format: ShiftFormat) -> Self {
        let shifts = match format {
            ShiftFormat::TwoShift => [Shift::Day, Shift::Noc].into_iter().collect(),
            ShiftFormat::ThreeShift => Shift::ALL.into_iter().collect(),
        };
        Self { shifts }
    }

    /// `{Day, NOC}`.
    pub fn two_shift() -> Self {
        Self::for_format(ShiftFormat::TwoShift)
    }

    /// `{Day, Swing, NOC}`.
    pub fn three_shift() -> Self {
        Self::for_format(ShiftFormat::ThreeShift)
    }

    /// Whether the facility runs `shift`.
    pub fn contains(&self, shift: Shift) -> bool {
        self.shifts.contains(&shift)
    }

    /// Shifts in Day, Swing, NOC order.
    pub fn iter(&self) -> impl Iterator<Item = Shift> + '_ {
        self.shifts.iter().copied()
    }

    /// Number of shifts.
    pub fn len(&self) -> usize {
        self.shifts.len()
    }

    /// Always false for the two supported formats.
    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }
}

impl Default for ShiftSet {
    fn default() -> Self {
        Self::three_shift()
    }
}

impl From<ShiftFormat> for ShiftSet {
    fn from(format: ShiftFormat) -> Self {
        Self::for_format(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_sets() {
        let two = ShiftSet::two_shift();
        assert_eq!(two.len(), 2);
        assert!(!two.contains(Shift::Swing));
        assert_eq!(two.iter().collect::<Vec<_>>(), vec![Shift::Day, Shift::Noc]);
        assert_eq!(ShiftSet::three_shift().len(), 3);
    }

    #[test]
    fn test_shift_format_parse_and_serde() {
        assert_eq!("2_shift".parse::<ShiftFormat>().unwrap(), ShiftFormat::TwoShift);
        assert!("4_shift".parse::<ShiftFormat>().is_err());
        assert_eq!(
            serde_json::to_string(&ShiftFormat::ThreeShift).unwrap(),
            "\"3_shift\""
        );
    }

    #[test]
    fn test_shift_labels_and_indices() {
        assert_eq!(Shift::from_label("noc"), Some(Shift::Noc));
        assert_eq!(Shift::from_flat_index(2), Some(Shift::Swing));
        assert_eq!(Shift::from_flat_index(4), None);
        assert_eq!(serde_json::to_string(&Shift::Noc).unwrap(), "\"NOC\"");
    }

    #[test]
    fn test_day_lookup() {
        assert_eq!(Day::from_name("thursday"), Some(Day::Thursday));
        assert_eq!(Day::from_name("Thurs"), None);
        assert_eq!(Day::from(chrono::Weekday::Sun), Day::Sunday);
        assert!(Day::Saturday.is_weekend());
        assert_eq!(Day::Wednesday.index(), 2);
    }
}
