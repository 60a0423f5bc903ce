//! Caregiving reports over a chosen scope.
//!
//! The summary reducers in `care_model::summary` only add things up. This
//! module picks which entries go in, using resident placements supplied by
//! the caller.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use care_model::summary::{self, DayBreakdown, ScopeSummary};
use care_model::{
    AdlCategory, AdlQuestion, FacilityId, ResidentId, SectionId, ShiftSet, WeekStart, WeeklyCareEntry,
};
use care_store::{LedgerEntryStore, QuestionCatalog};

use crate::error::Result;
use crate::ledger::decode_rows;

/// Which residents a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum SummaryScope {
    Resident(ResidentId),
    Section(SectionId),
    Facility(FacilityId),
    All,
}

/// Where a resident lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidentPlacement {
    pub resident_id: ResidentId,
    pub section_id: Option<SectionId>,
    pub facility_id: FacilityId,
}

impl SummaryScope {
    /// Whether a resident belongs to the scope. Residents without a
    /// placement only match `Resident` and `All`.
    fn includes(&self, resident_id: ResidentId, placement: Option<&ResidentPlacement>) -> bool {
        match self {
            Self::All => true,
            Self::Resident(id) => *id == resident_id,
            Self::Section(id) => placement.is_some_and(|p| p.section_id == Some(*id)),
            Self::Facility(id) => placement.is_some_and(|p| p.facility_id == *id),
        }
    }
}

/// Entries in `scope`, for one week or (with `None`) all time.
pub fn select_entries(
    entries: &[WeeklyCareEntry],
    placements: &[ResidentPlacement],
    scope: SummaryScope,
    week: Option<WeekStart>,
) -> Vec<WeeklyCareEntry> {
    let by_resident: HashMap<ResidentId, &ResidentPlacement> =
        placements.iter().map(|p| (p.resident_id, p)).collect();

    entries
        .iter()
        .filter(|e| week.map_or(true, |w| e.week_start == w))
        .filter(|e| scope.includes(e.resident_id, by_resident.get(&e.resident_id).copied()))
        .cloned()
        .collect()
}

/// Hours for a scope and week, in both summary shapes plus a per-category
/// split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaregivingReport {
    pub scope: SummaryScope,
    pub week: Option<WeekStart>,
    pub breakdown: Vec<DayBreakdown>,
    pub summary: ScopeSummary,
    pub by_category: BTreeMap<AdlCategory, ScopeSummary>,
}

impl CaregivingReport {
    /// Select entries for the scope and reduce them.
    pub fn build(
        entries: &[WeeklyCareEntry],
        placements: &[ResidentPlacement],
        scope: SummaryScope,
        week: Option<WeekStart>,
        shifts: &ShiftSet,
        questions: &[AdlQuestion],
    ) -> Self {
        let selected = select_entries(entries, placements, scope, week);
        debug!(?scope, entries = selected.len(), "Building caregiving report");
        Self {
            scope,
            week,
            breakdown: summary::per_shift_breakdown(&selected, shifts),
            summary: summary::scope_summary(&selected),
            by_category: summary::category_summary(&selected, questions),
        }
    }

    /// Build a report straight from the store and question catalog.
    pub async fn from_store(
        store: &dyn LedgerEntryStore,
        catalog: &dyn QuestionCatalog,
        placements: &[ResidentPlacement],
        scope: SummaryScope,
        week: Option<WeekStart>,
        shifts: &ShiftSet,
    ) -> Result<Self> {
        let rows = store.list_all(week.map(|w| w.backend_anchor())).await?;
        let decoded = decode_rows(&rows, shifts, week);
        if !decoded.issues.is_empty() {
            warn!(issues = decoded.issues.len(), "Data quality issues in report rows");
        }
        let entries: Vec<_> = decoded.entries.into_values().map(|(_, entry)| entry).collect();
        let questions = catalog.questions().await?;
        Ok(Self::build(&entries, placements, scope, week, shifts, &questions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use care_model::{Cell, Day, EntryKey, EntryStatus, Shift};
    use care_store::wire;
    use care_store::{InMemoryStore, StaticCatalog};
    use chrono::NaiveDate;

    fn week(day: u32) -> WeekStart {
        WeekStart::containing(NaiveDate::from_ymd_opt(2024, 3, day).unwrap())
    }

    fn entry(resident_id: u64, question_id: u64, week: WeekStart, minutes: u32, count: u32) -> WeeklyCareEntry {
        let mut entry = WeeklyCareEntry::new(EntryKey::new(resident_id, question_id, week), minutes, EntryStatus::Complete);
        entry.set_cell(Cell::new(Day::Monday, Shift::Day), count);
        entry
    }

    fn placements() -> Vec<ResidentPlacement> {
        vec![
            ResidentPlacement {
                resident_id: 1,
                section_id: Some(10),
                facility_id: 100,
            },
            ResidentPlacement {
                resident_id: 2,
                section_id: Some(11),
                facility_id: 100,
            },
            ResidentPlacement {
                resident_id: 3,
                section_id: None,
                facility_id: 200,
            },
        ]
    }

    fn entries() -> Vec<WeeklyCareEntry> {
        vec![
            entry(1, 1, week(4), 10, 1),
            entry(2, 1, week(4), 10, 2),
            entry(3, 1, week(4), 10, 3),
            entry(1, 1, week(11), 10, 4),
            entry(4, 1, week(4), 10, 5),
        ]
    }

    #[test]
    fn test_select_by_scope() {
        let all = entries();
        let places = placements();
        let count = |scope, week| select_entries(&all, &places, scope, week).len();

        assert_eq!(count(SummaryScope::Resident(1), Some(week(4))), 1);
        assert_eq!(count(SummaryScope::Resident(1), None), 2);
        assert_eq!(count(SummaryScope::Section(10), Some(week(4))), 1);
        assert_eq!(count(SummaryScope::Facility(100), Some(week(4))), 2);
        assert_eq!(count(SummaryScope::Facility(200), None), 1);
        assert_eq!(count(SummaryScope::All, Some(week(4))), 4);
        assert_eq!(count(SummaryScope::All, None), 5);
    }

    #[test]
    fn test_build_report() {
        let questions = vec![AdlQuestion::new(1, "Bathing assistance")];
        let report = CaregivingReport::build(
            &entries(),
            &placements(),
            SummaryScope::Facility(100),
            Some(week(4)),
            &ShiftSet::three_shift(),
            &questions,
        );
        assert_eq!(report.summary.total_minutes, 30);
        assert_eq!(report.summary.total_adls, 2);
        assert_eq!(report.breakdown[0].hours_for(Shift::Day), 0.5);
        assert_eq!(report.by_category[&AdlCategory::PersonalCare].total_minutes, 30);
    }

    #[test]
    fn test_scope_serialisation() {
        let json = serde_json::to_value(SummaryScope::Section(4)).unwrap();
        assert_eq!(json, serde_json::json!({"scope": "section", "id": 4}));
        let json = serde_json::to_value(SummaryScope::All).unwrap();
        assert_eq!(json, serde_json::json!({"scope": "all"}));
    }

    #[tokio::test]
    async fn test_report_from_store() {
        let store = InMemoryStore::new();
        let shifts = ShiftSet::three_shift();
        for e in entries() {
            store.create(wire::to_new_entry(&e, &shifts)).await.unwrap();
        }
        let catalog = StaticCatalog::new().with_question(1, "Wheelchair transfer");

        let report = CaregivingReport::from_store(
            &store,
            &catalog,
            &placements(),
            SummaryScope::All,
            Some(week(4)),
            &shifts,
        )
        .await
        .unwrap();

        assert_eq!(report.summary.total_minutes, 110);
        assert_eq!(report.by_category[&AdlCategory::Mobility].total_adls, 4);
    }
}
