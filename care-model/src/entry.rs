//! The weekly care entry: one resident, one ADL question, one week.

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::frequency::DerivedTotals;
use crate::matrix::{CareMatrix, Cell};
use crate::shift::ShiftSet;
use crate::templates::BulkTemplate;
use crate::week::WeekStart;
use crate::{EntryId, QuestionId, ResidentId};

/// Completion status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum EntryStatus {
    Complete,
    Incomplete,
    #[serde(rename = "Not Applicable")]
    NotApplicable,
}

impl Default for EntryStatus {
    fn default() -> Self {
        Self::Incomplete
    }
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "Complete",
            Self::Incomplete => "Incomplete",
            Self::NotApplicable => "Not Applicable",
        }
    }
}

/// Uniqueness key: at most one entry exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct EntryKey {
    pub resident_id: ResidentId,
    pub question_id: QuestionId,
    pub week_start: WeekStart,
}

impl EntryKey {
    pub fn new(resident_id: ResidentId, question_id: QuestionId, week_start: WeekStart) -> Self {
        Self {
            resident_id,
            question_id,
            week_start,
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.resident_id, self.question_id, self.week_start)
    }
}

/// Per-week care record.
///
/// The matrix and minutes are only reachable through methods that recompute
/// [`DerivedTotals`], so `totals` always matches the cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EntryFields", into = "EntryFields")]
pub struct WeeklyCareEntry {
    /// Store id, `None` until the first save completes
    pub id: Option<EntryId>,
    pub resident_id: ResidentId,
    pub question_id: QuestionId,
    pub week_start: WeekStart,
    pub status: EntryStatus,
    minutes_per_occurrence: u32,
    matrix: CareMatrix,
    totals: DerivedTotals,
}

impl WeeklyCareEntry {
    /// Empty entry for a key.
    pub fn new(key: EntryKey, minutes_per_occurrence: u32, status: EntryStatus) -> Self {
        Self::with_matrix(key, minutes_per_occurrence, CareMatrix::new(), status)
    }

    /// Entry with an existing matrix.
    pub fn with_matrix(
        key: EntryKey,
        minutes_per_occurrence: u32,
        matrix: CareMatrix,
        status: EntryStatus,
    ) -> Self {
        let totals = DerivedTotals::compute(&matrix, minutes_per_occurrence);
        Self {
            id: None,
            resident_id: key.resident_id,
            question_id: key.question_id,
            week_start: key.week_start,
            status,
            minutes_per_occurrence,
            matrix,
            totals,
        }
    }

    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.resident_id, self.question_id, self.week_start)
    }

    pub fn matrix(&self) -> &CareMatrix {
        &self.matrix
    }

    pub fn minutes_per_occurrence(&self) -> u32 {
        self.minutes_per_occurrence
    }

    pub fn totals(&self) -> DerivedTotals {
        self.totals
    }

    pub fn frequency_per_week(&self) -> u64 {
        self.totals.frequency_per_week
    }

    pub fn total_minutes_week(&self) -> u64 {
        self.totals.total_minutes_week
    }

    pub fn total_hours_week(&self) -> f64 {
        self.totals.total_hours_week
    }

    /// Set one cell.
    pub fn set_cell(&mut self, cell: Cell, count: u32) {
        self.matrix.set(cell, count);
        self.recompute();
    }

    /// Set the per-occurrence duration.
    pub fn set_minutes(&mut self, minutes_per_occurrence: u32) {
        self.minutes_per_occurrence = minutes_per_occurrence;
        self.recompute();
    }

    /// Apply a bulk template; returns the number of cells written.
    pub fn apply_template(&mut self, template: BulkTemplate, shifts: &ShiftSet) -> usize {
        let written = template.apply(&mut self.matrix, shifts);
        self.recompute();
        written
    }

    /// Replace the whole matrix.
    pub fn replace_matrix(&mut self, matrix: CareMatrix) {
        self.matrix = matrix;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.totals = DerivedTotals::compute(&self.matrix, self.minutes_per_occurrence);
    }
}

/// Flat serialised view. Deserialising ignores incoming totals and
/// recomputes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export, rename = "WeeklyCareEntry"))]
struct EntryFields {
    #[serde(default)]
    id: Option<EntryId>,
    resident_id: ResidentId,
    question_id: QuestionId,
    week_start: WeekStart,
    #[serde(default)]
    status: EntryStatus,
    #[serde(default)]
    minutes_per_occurrence: u32,
    #[serde(default)]
    #[cfg_attr(feature = "typescript", ts(type = "Record<string, Record<string, number>>"))]
    matrix: CareMatrix,
    #[serde(default)]
    frequency_per_week: u64,
    #[serde(default)]
    total_minutes_week: u64,
    #[serde(default)]
    total_hours_week: f64,
}

impl From<EntryFields> for WeeklyCareEntry {
    fn from(fields: EntryFields) -> Self {
        let key = EntryKey::new(fields.resident_id, fields.question_id, fields.week_start);
        let mut entry =
            WeeklyCareEntry::with_matrix(key, fields.minutes_per_occurrence, fields.matrix, fields.status);
        entry.id = fields.id;
        entry
    }
}

impl From<WeeklyCareEntry> for EntryFields {
    fn from(entry: WeeklyCareEntry) -> Self {
        Self {
            id: entry.id,
            resident_id: entry.resident_id,
            question_id: entry.question_id,
            week_start: entry.week_start,
            status: entry.status,
            minutes_per_occurrence: entry.minutes_per_occurrence,
            matrix: entry.matrix,
            frequency_per_week: entry.totals.frequency_per_week,
            total_minutes_week: entry.totals.total_minutes_week,
            total_hours_week: entry.totals.total_hours_week,
        }
    }
}
