//! Caregiving summaries.
//!
//! Pure folds over entries. Callers choose the entries (resident, section,
//! facility, week); nothing here filters.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::category::{AdlCategory, AdlQuestion};
use crate::entry::WeeklyCareEntry;
use crate::frequency::minutes_to_hours;
use crate::matrix::Cell;
use crate::shift::{Day, Shift, ShiftSet};

/// Hours per shift for one day, serialised as
/// `{ "day": "Mon", "Day": 1.5, "NOC": 0.25 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayBreakdown {
    #[serde(with = "day_label")]
    pub day: Day,
    #[serde(flatten)]
    pub hours: BTreeMap<Shift, f64>,
}

impl DayBreakdown {
    /// Hours for a shift; 0 if the shift is not in the breakdown.
    pub fn hours_for(&self, shift: Shift) -> f64 {
        self.hours.get(&shift).copied().unwrap_or(0.0)
    }

    /// Sum over shifts.
    pub fn total_hours(&self) -> f64 {
        self.hours.values().sum()
    }
}

/// Coarse totals for a scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ScopeSummary {
    pub total_hours: f64,
    pub total_minutes: u64,
    /// Entries with a non-zero frequency
    pub total_adls: u64,
}

impl ScopeSummary {
    fn add(&mut self, entry: &WeeklyCareEntry) {
        self.total_minutes += entry.total_minutes_week();
        self.total_hours = minutes_to_hours(self.total_minutes);
        if entry.frequency_per_week() > 0 {
            self.total_adls += 1;
        }
    }
}

/// Seven day records, Monday first, one hours bucket per facility shift.
pub fn per_shift_breakdown(entries: &[WeeklyCareEntry], shifts: &ShiftSet) -> Vec<DayBreakdown> {
    Day::ALL
        .into_iter()
        .map(|day| {
            let hours = shifts
                .iter()
                .map(|shift| {
                    let cell = Cell::new(day, shift);
                    let minutes: u64 = entries
                        .iter()
                        .map(|e| u64::from(e.minutes_per_occurrence()) * u64::from(e.matrix().get(cell)))
                        .sum();
                    (shift, minutes_to_hours(minutes))
                })
                .collect();
            DayBreakdown { day, hours }
        })
        .collect()
}

/// Totals over all entries.
pub fn scope_summary(entries: &[WeeklyCareEntry]) -> ScopeSummary {
    entries.iter().fold(ScopeSummary::default(), |mut acc, e| {
        acc.add(e);
        acc
    })
}

/// Totals per question category. Entries whose question is not in
/// `questions` count as Other.
pub fn category_summary(
    entries: &[WeeklyCareEntry],
    questions: &[AdlQuestion],
) -> BTreeMap<AdlCategory, ScopeSummary> {
    let categories: HashMap<_, _> = questions.iter().map(|q| (q.id, q.category)).collect();
    let mut out: BTreeMap<AdlCategory, ScopeSummary> = BTreeMap::new();
    for entry in entries {
        let category = categories
            .get(&entry.question_id)
            .copied()
            .unwrap_or(AdlCategory::Other);
        out.entry(category).or_default().add(entry);
    }
    out
}

mod day_label {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use crate::shift::Day;

    pub fn serialize<S: Serializer>(day: &Day, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(day.short_label())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Day, D::Error> {
        let label = String::deserialize(deserializer)?;
        Day::ALL
            .into_iter()
            .find(|d| d.short_label() == label || d.name() == label)
            .ok_or_else(|| D::Error::custom(format!("unknown day label: {label}")))
    }
}
