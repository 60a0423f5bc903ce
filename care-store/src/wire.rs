//! Wire records and the Monday <-> Sunday boundary.
//!
//! This is the only place week anchors are converted. Outbound payloads carry
//! the Sunday before the ledger's Monday as `week_start_date` and Monday + 6
//! as `week_end_date`; inbound rows are mapped back and their
//! `per_day_data` reconciled.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use care_model::reconcile::{self, PayloadFormat};
use care_model::week::{self, format_wire_date, parse_wire_date};
use care_model::{
    EntryId, EntryKey, EntryStatus, FormatIssue, QuestionId, ResidentId, ShiftSet, WeeklyCareEntry,
};

/// An entry as the store returns it.
///
/// Everything except the identifiers is tolerated in any shape; decoding is
/// done by [`from_stored`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: EntryId,
    pub resident_id: ResidentId,
    pub question_id: QuestionId,
    /// Sunday anchor, ISO date
    pub week_start_date: String,
    #[serde(default)]
    pub week_end_date: Option<String>,
    #[serde(default)]
    pub minutes_per_occurrence: Value,
    #[serde(default)]
    pub frequency_per_week: Option<u64>,
    #[serde(default)]
    pub total_minutes_week: Option<u64>,
    #[serde(default)]
    pub total_hours_week: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    /// Flat or nested per-day/shift counts
    #[serde(default)]
    pub per_day_data: Value,
}

/// Payload for `create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub resident_id: ResidentId,
    pub question_id: QuestionId,
    pub week_start_date: String,
    pub week_end_date: String,
    pub minutes_per_occurrence: u32,
    pub frequency_per_week: u64,
    pub total_minutes_week: u64,
    pub total_hours_week: f64,
    pub status: EntryStatus,
    pub per_day_data: Value,
}

/// Payload for `patch`. Absent fields are left unchanged by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes_per_occurrence: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_day_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_per_week: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_minutes_week: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_hours_week: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EntryStatus>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Which groups of fields an edit touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub matrix: bool,
    pub minutes: bool,
    pub status: bool,
}

impl ChangeSet {
    pub const MATRIX: ChangeSet = ChangeSet {
        matrix: true,
        minutes: false,
        status: false,
    };
    pub const MINUTES: ChangeSet = ChangeSet {
        matrix: false,
        minutes: true,
        status: false,
    };
    pub const STATUS: ChangeSet = ChangeSet {
        matrix: false,
        minutes: false,
        status: true,
    };
    pub const ALL: ChangeSet = ChangeSet {
        matrix: true,
        minutes: true,
        status: true,
    };

    /// Fields touched by either set.
    pub fn union(self, other: ChangeSet) -> ChangeSet {
        ChangeSet {
            matrix: self.matrix || other.matrix,
            minutes: self.minutes || other.minutes,
            status: self.status || other.status,
        }
    }

    /// Whether the derived totals must be sent.
    pub fn touches_totals(&self) -> bool {
        self.matrix || self.minutes
    }
}

/// Create payload for an entry.
pub fn to_new_entry(entry: &WeeklyCareEntry, shifts: &ShiftSet) -> NewEntry {
    let totals = entry.totals();
    NewEntry {
        resident_id: entry.resident_id,
        question_id: entry.question_id,
        week_start_date: format_wire_date(entry.week_start.backend_anchor()),
        week_end_date: format_wire_date(entry.week_start.week_end()),
        minutes_per_occurrence: entry.minutes_per_occurrence(),
        frequency_per_week: totals.frequency_per_week,
        total_minutes_week: totals.total_minutes_week,
        total_hours_week: totals.total_hours_week,
        status: entry.status,
        per_day_data: reconcile::encode_nested(entry.matrix(), shifts),
    }
}

/// Patch payload carrying every field relevant to `changes`.
pub fn to_patch(entry: &WeeklyCareEntry, changes: ChangeSet, shifts: &ShiftSet) -> EntryPatch {
    let totals = entry.totals();
    let mut patch = EntryPatch::default();
    if changes.matrix {
        patch.per_day_data = Some(reconcile::encode_nested(entry.matrix(), shifts));
    }
    if changes.minutes {
        patch.minutes_per_occurrence = Some(entry.minutes_per_occurrence());
    }
    if changes.touches_totals() {
        patch.frequency_per_week = Some(totals.frequency_per_week);
        patch.total_minutes_week = Some(totals.total_minutes_week);
        patch.total_hours_week = Some(totals.total_hours_week);
    }
    if changes.status {
        patch.status = Some(entry.status);
    }
    patch
}

/// An inbound row mapped into the ledger's model.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEntry {
    pub entry: WeeklyCareEntry,
    pub format: PayloadFormat,
    pub issues: Vec<FormatIssue>,
}

/// Map a stored row into a ledger entry.
///
/// Only an unreadable `week_start_date` prevents decoding (the row cannot be
/// keyed); every other defect is coerced and reported in `issues`.
pub fn from_stored(stored: &StoredEntry, shifts: &ShiftSet) -> Result<DecodedEntry, FormatIssue> {
    let sunday = parse_wire_date(&stored.week_start_date).ok_or_else(|| FormatIssue::InvalidDate {
        field: "week_start_date".to_string(),
        value: stored.week_start_date.clone(),
    })?;

    let mut issues = Vec::new();
    if !week::is_backend_anchor(sunday) {
        issues.push(FormatIssue::AnchorDrift {
            week_start_date: stored.week_start_date.clone(),
        });
    }
    let week_start = week::to_ui_anchor(sunday);

    let reconciled = reconcile::reconcile(&stored.per_day_data).restrict_to(shifts);
    issues.extend(reconciled.issues);

    let (minutes, coerced) = reconcile::coerce_count(&stored.minutes_per_occurrence);
    if coerced {
        issues.push(FormatIssue::CoercedValue {
            key: "minutes_per_occurrence".to_string(),
            raw: stored.minutes_per_occurrence.to_string(),
        });
    }

    let status = match stored.status.as_deref() {
        None => EntryStatus::default(),
        Some(raw) => parse_status(raw).unwrap_or_else(|| {
            issues.push(FormatIssue::CoercedValue {
                key: "status".to_string(),
                raw: raw.to_string(),
            });
            EntryStatus::default()
        }),
    };

    let key = EntryKey::new(stored.resident_id, stored.question_id, week_start);
    let mut entry = WeeklyCareEntry::with_matrix(key, minutes, reconciled.matrix, status);
    entry.id = Some(stored.id);

    check_derived(stored, &entry, &mut issues);

    debug!(
        entry_id = stored.id,
        resident_id = stored.resident_id,
        question_id = stored.question_id,
        format = ?reconciled.format,
        issues = issues.len(),
        "Decoded stored entry"
    );

    Ok(DecodedEntry {
        entry,
        format: reconciled.format,
        issues,
    })
}

fn parse_status(raw: &str) -> Option<EntryStatus> {
    [
        EntryStatus::Complete,
        EntryStatus::Incomplete,
        EntryStatus::NotApplicable,
    ]
    .into_iter()
    .find(|s| s.as_str().eq_ignore_ascii_case(raw.trim()))
}

/// Stored totals are informational; report when they disagree with ours.
fn check_derived(stored: &StoredEntry, entry: &WeeklyCareEntry, issues: &mut Vec<FormatIssue>) {
    let totals = entry.totals();
    let mut mismatch = |field: &str, stored: String, computed: String| {
        issues.push(FormatIssue::DerivedMismatch {
            field: field.to_string(),
            stored,
            computed,
        })
    };
    if let Some(freq) = stored.frequency_per_week {
        if freq != totals.frequency_per_week {
            mismatch("frequency_per_week", freq.to_string(), totals.frequency_per_week.to_string());
        }
    }
    if let Some(minutes) = stored.total_minutes_week {
        if minutes != totals.total_minutes_week {
            mismatch("total_minutes_week", minutes.to_string(), totals.total_minutes_week.to_string());
        }
    }
    if let Some(hours) = stored.total_hours_week {
        if (hours - totals.total_hours_week).abs() > 0.005 {
            mismatch("total_hours_week", hours.to_string(), totals.total_hours_week.to_string());
        }
    }
}
