//! Validation errors and data-quality findings.

use serde::{Deserialize, Serialize};

use crate::shift::Shift;

/// Rejected user input. Never reaches the aggregator or the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Count or minutes below zero
    #[error("Value must not be negative: {0}")]
    Negative(i64),

    /// Count or minutes above the representable range
    #[error("Value out of range: {0}")]
    OutOfRange(i64),

    /// Text that is not a whole number
    #[error("Not a number: {0:?}")]
    NotNumeric(String),

    /// Template name not in the template table
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    /// Shift format other than `2_shift` / `3_shift`
    #[error("Unknown shift format: {0}")]
    UnknownShiftFormat(String),

    /// Cell edit on a shift the facility does not run
    #[error("Shift not run by this facility: {0:?}")]
    ShiftNotInFacility(Shift),
}

/// A non-fatal data-quality finding.
///
/// Reported alongside a best-effort result, never instead of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormatIssue {
    /// Payload is neither flat nor nested (or not an object at all)
    UnrecognizedShape { detail: String },
    /// Key ignored while decoding
    UnknownKey { key: String },
    /// Flat key with a shift index other than 1..=3
    ShiftIndexOutOfRange { key: String, index: u32 },
    /// Cell value coerced to 0 (negative, non-numeric, ...)
    CoercedValue { key: String, raw: String },
    /// Two keys address the same cell; the first one was kept
    DuplicateCell { key: String },
    /// Non-zero cell for a shift the facility does not run
    ShiftOutsideFacility { key: String, shift: Shift, count: u32 },
    /// Backend week anchor was not a Sunday
    AnchorDrift { week_start_date: String },
    /// Unparseable wire date
    InvalidDate { field: String, value: String },
    /// More than one stored entry for the same key; the lowest id was kept
    DuplicateEntry { kept: u64, dropped: u64 },
    /// Stored derived totals disagree with the recomputed ones
    DerivedMismatch { field: String, stored: String, computed: String },
}

impl FormatIssue {
    /// Short machine-readable kind, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnrecognizedShape { .. } => "unrecognized_shape",
            Self::UnknownKey { .. } => "unknown_key",
            Self::ShiftIndexOutOfRange { .. } => "shift_index_out_of_range",
            Self::CoercedValue { .. } => "coerced_value",
            Self::DuplicateCell { .. } => "duplicate_cell",
            Self::ShiftOutsideFacility { .. } => "shift_outside_facility",
            Self::AnchorDrift { .. } => "anchor_drift",
            Self::InvalidDate { .. } => "invalid_date",
            Self::DuplicateEntry { .. } => "duplicate_entry",
            Self::DerivedMismatch { .. } => "derived_mismatch",
        }
    }
}
