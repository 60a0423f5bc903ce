//! Named bulk fill / clear patterns.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::matrix::{CareMatrix, Cell};
use crate::shift::{Day, Shift, ShiftSet};

/// A named template. Mornings = Day shift, evenings = Swing, nights = NOC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkTemplate {
    WeekdayMornings,
    WeekdayEvenings,
    WeekdayNights,
    WeekendMornings,
    WeekendEvenings,
    WeekendNights,
    DailyMornings,
    DailyEvenings,
    DailyNights,
    FullWeek,
    WeekdaysOnly,
    ClearAll,
}

impl BulkTemplate {
    pub const ALL: [BulkTemplate; 12] = [
        Self::WeekdayMornings,
        Self::WeekdayEvenings,
        Self::WeekdayNights,
        Self::WeekendMornings,
        Self::WeekendEvenings,
        Self::WeekendNights,
        Self::DailyMornings,
        Self::DailyEvenings,
        Self::DailyNights,
        Self::FullWeek,
        Self::WeekdaysOnly,
        Self::ClearAll,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::WeekdayMornings => "weekday_mornings",
            Self::WeekdayEvenings => "weekday_evenings",
            Self::WeekdayNights => "weekday_nights",
            Self::WeekendMornings => "weekend_mornings",
            Self::WeekendEvenings => "weekend_evenings",
            Self::WeekendNights => "weekend_nights",
            Self::DailyMornings => "daily_mornings",
            Self::DailyEvenings => "daily_evenings",
            Self::DailyNights => "daily_nights",
            Self::FullWeek => "full_week",
            Self::WeekdaysOnly => "weekdays_only",
            Self::ClearAll => "clear_all",
        }
    }

    /// Days a fill template targets. Empty for `clear_all`.
    pub fn days(&self) -> &'static [Day] {
        match self {
            Self::WeekdayMornings | Self::WeekdayEvenings | Self::WeekdayNights | Self::WeekdaysOnly => {
                &Day::WEEKDAYS
            }
            Self::WeekendMornings | Self::WeekendEvenings | Self::WeekendNights => &Day::WEEKEND,
            Self::DailyMornings | Self::DailyEvenings | Self::DailyNights | Self::FullWeek => &Day::ALL,
            Self::ClearAll => &[],
        }
    }

    /// Shifts a fill template targets, before facility restriction.
    pub fn shifts(&self) -> &'static [Shift] {
        match self {
            Self::WeekdayMornings | Self::WeekendMornings | Self::DailyMornings => &[Shift::Day],
            Self::WeekdayEvenings | Self::WeekendEvenings | Self::DailyEvenings => &[Shift::Swing],
            Self::WeekdayNights | Self::WeekendNights | Self::DailyNights => &[Shift::Noc],
            Self::FullWeek | Self::WeekdaysOnly => &Shift::ALL,
            Self::ClearAll => &[],
        }
    }

    /// Apply to `matrix`, touching only targeted cells the facility runs.
    /// Returns the number of cells written.
    pub fn apply(&self, matrix: &mut CareMatrix, shifts: &ShiftSet) -> usize {
        if let Self::ClearAll = self {
            let keys = matrix.len();
            matrix.clear_counts();
            return keys;
        }

        let mut written = 0;
        for day in self.days() {
            for shift in self.shifts().iter().filter(|s| shifts.contains(**s)) {
                matrix.set(Cell::new(*day, *shift), 1);
                written += 1;
            }
        }
        written
    }
}

impl fmt::Display for BulkTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BulkTemplate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s.trim())
            .ok_or_else(|| ValidationError::UnknownTemplate(s.to_string()))
    }
}
