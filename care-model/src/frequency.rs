//! Derived frequency, minutes and hours.
//!
//! Totals are always recomputed from the whole matrix, never patched by a
//! delta, so they cannot drift from the cells.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::error::ValidationError;
use crate::matrix::CareMatrix;
use crate::shift::ShiftSet;

/// Totals derived from a matrix and a per-occurrence duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct DerivedTotals {
    /// Sum of all cell counts
    pub frequency_per_week: u64,
    /// `minutes_per_occurrence * frequency_per_week`
    pub total_minutes_week: u64,
    /// `total_minutes_week / 60`
    pub total_hours_week: f64,
}

impl DerivedTotals {
    /// Totals over every cell of the matrix.
    pub fn compute(matrix: &CareMatrix, minutes_per_occurrence: u32) -> Self {
        let frequency_per_week = matrix.total();
        let total_minutes_week = frequency_per_week.saturating_mul(u64::from(minutes_per_occurrence));
        Self {
            frequency_per_week,
            total_minutes_week,
            total_hours_week: minutes_to_hours(total_minutes_week),
        }
    }

    /// Totals over the cells a facility runs; other cells count as 0.
    pub fn compute_within(matrix: &CareMatrix, minutes_per_occurrence: u32, shifts: &ShiftSet) -> Self {
        Self::compute(&matrix.restricted_to(shifts), minutes_per_occurrence)
    }
}

/// Minutes as fractional hours.
pub fn minutes_to_hours(minutes: u64) -> f64 {
    minutes as f64 / 60.0
}

/// Validate a count or minutes value typed by a user.
pub fn coerce_input(value: i64) -> Result<u32, ValidationError> {
    if value < 0 {
        return Err(ValidationError::Negative(value));
    }
    u32::try_from(value).map_err(|_| ValidationError::OutOfRange(value))
}

/// Validate user text. Blank text means 0.
pub fn parse_input(text: &str) -> Result<u32, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    let value: i64 = trimmed
        .parse()
        .map_err(|_| ValidationError::NotNumeric(trimmed.to_string()))?;
    coerce_input(value)
}
