//! The ledger: sole owner and writer of weekly care entries.
//!
//! Edits are synchronous. Each one validates its input, updates the local
//! entry and its derived totals, then queues a save with the
//! [`SyncCoordinator`]; the store is never awaited on the edit path. Save
//! outcomes come back through [`Ledger::pump`] / [`Ledger::settle`] and only
//! ever record the entry id and sync state. They never overwrite local
//! fields, so the last local edit wins whatever order responses arrive in.
//!
//! # Concurrency risk
//!
//! There is no locking and no transaction around a resident's week. Two
//! ledgers editing the same entry each keep their own last edit, and the
//! store ends up with whichever save lands last. This is accepted on the
//! assumption that at most one user edits a given resident's week at a
//! time; nothing here enforces it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use care_model::frequency::{coerce_input, parse_input};
use care_model::summary::{self, DayBreakdown, ScopeSummary};
use care_model::{
    BulkTemplate, Cell, DerivedTotals, EntryId, EntryKey, EntryStatus, FacilityId, FormatIssue, ResidentId, ShiftSet,
    ValidationError, WeekStart, WeeklyCareEntry,
};
use care_store::wire::{self, ChangeSet, StoredEntry};
use care_store::{FacilityCatalog, LedgerEntryStore};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::events::LedgerEvent;
use crate::sync::{DeleteRequest, SaveRequest, SyncCoordinator, SyncOutcome, SyncState};

struct Slot {
    entry: WeeklyCareEntry,
    id: Option<EntryId>,
    state: SyncState,
    /// Fields edited since the store last confirmed the latest revision
    unsaved: ChangeSet,
    /// Revision of the latest local edit
    revision: u64,
    /// Revision the slot was created at; older outcomes belong to a deleted
    /// predecessor with the same key
    born: u64,
}

/// A data-quality finding on a stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowIssue {
    pub entry_id: EntryId,
    /// None when the row could not be keyed
    pub key: Option<EntryKey>,
    pub issue: FormatIssue,
}

/// Stored rows decoded into entries, one per key.
#[derive(Debug, Default)]
pub struct DecodedRows {
    pub entries: BTreeMap<EntryKey, (EntryId, WeeklyCareEntry)>,
    pub issues: Vec<RowIssue>,
}

/// Decode stored rows, keeping the lowest id when a key repeats.
///
/// Rows with an unreadable week are skipped; they are keyed to
/// `fallback_week` in the issue list when one is given.
pub fn decode_rows(rows: &[StoredEntry], shifts: &ShiftSet, fallback_week: Option<WeekStart>) -> DecodedRows {
    let mut ordered: Vec<&StoredEntry> = rows.iter().collect();
    ordered.sort_by_key(|row| row.id);

    let mut decoded = DecodedRows::default();
    for row in ordered {
        match wire::from_stored(row, shifts) {
            Ok(result) => {
                let key = result.entry.key();
                decoded.issues.extend(result.issues.into_iter().map(|issue| RowIssue {
                    entry_id: row.id,
                    key: Some(key),
                    issue,
                }));
                if let Some((kept, _)) = decoded.entries.get(&key) {
                    decoded.issues.push(RowIssue {
                        entry_id: row.id,
                        key: Some(key),
                        issue: FormatIssue::DuplicateEntry {
                            kept: *kept,
                            dropped: row.id,
                        },
                    });
                    continue;
                }
                decoded.entries.insert(key, (row.id, result.entry));
            }
            Err(issue) => decoded.issues.push(RowIssue {
                entry_id: row.id,
                key: fallback_week.map(|week| EntryKey::new(row.resident_id, row.question_id, week)),
                issue,
            }),
        }
    }
    decoded
}

/// What a [`Ledger::load`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Entries taken from the store
    pub loaded: usize,
    /// Stored entries skipped because the local copy has unsaved edits
    pub kept_local: usize,
    /// Stored entries skipped because their delete is still queued
    pub deleting: usize,
    pub issues: Vec<RowIssue>,
}

/// In-memory set of weekly care entries with background saves.
pub struct Ledger {
    config: LedgerConfig,
    shifts: ShiftSet,
    store: Arc<dyn LedgerEntryStore>,
    entries: HashMap<EntryKey, Slot>,
    /// Keys with a queued delete, by the revision it was issued at
    deleting: HashMap<EntryKey, u64>,
    revision: u64,
    coordinator: SyncCoordinator,
    events: broadcast::Sender<LedgerEvent>,
}

impl Ledger {
    /// Create a ledger using the configured facility shift format.
    ///
    /// Must be called inside a tokio runtime; save queues are spawned on it.
    pub fn new(store: Arc<dyn LedgerEntryStore>, config: LedgerConfig) -> Result<Self> {
        let shifts = config.facility.shift_set();
        Self::with_shift_set(store, config, shifts)
    }

    /// Create a ledger for an explicit shift set.
    pub fn with_shift_set(store: Arc<dyn LedgerEntryStore>, config: LedgerConfig, shifts: ShiftSet) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| LedgerError::Runtime(e.to_string()))?;
        let (events, _) = broadcast::channel(config.sync.event_capacity);
        let coordinator = SyncCoordinator::new(Arc::clone(&store), shifts.clone(), config.sync.debounce(), runtime);

        info!(
            shifts = shifts.len(),
            debounce_ms = config.sync.debounce_ms,
            "Ledger created"
        );

        Ok(Self {
            config,
            shifts,
            store,
            entries: HashMap::new(),
            deleting: HashMap::new(),
            revision: 0,
            coordinator,
            events,
        })
    }

    /// Create a ledger for a facility, resolving its shift format from the
    /// catalog. Unknown facilities fall back to the configured format.
    pub async fn for_facility(
        store: Arc<dyn LedgerEntryStore>,
        catalog: &dyn FacilityCatalog,
        facility_id: FacilityId,
        config: LedgerConfig,
    ) -> Result<Self> {
        let shifts = match catalog.shift_format(facility_id).await? {
            Some(format) => ShiftSet::for_format(format),
            None => {
                warn!(facility_id, "Facility not in catalog, using configured shift format");
                config.facility.shift_set()
            }
        };
        Self::with_shift_set(store, config, shifts)
    }

    pub fn shift_set(&self) -> &ShiftSet {
        &self.shifts
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Subscribe to ledger events.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    // ---- edits ----

    /// Set one cell's occurrence count.
    pub fn set_cell(&mut self, key: EntryKey, cell: Cell, count: i64) -> Result<DerivedTotals> {
        let count = coerce_input(count)?;
        self.set_cell_count(key, cell, count)
    }

    /// Set one cell from text input. Blank text means 0.
    pub fn set_cell_text(&mut self, key: EntryKey, cell: Cell, text: &str) -> Result<DerivedTotals> {
        let count = parse_input(text)?;
        self.set_cell_count(key, cell, count)
    }

    fn set_cell_count(&mut self, key: EntryKey, cell: Cell, count: u32) -> Result<DerivedTotals> {
        if !self.shifts.contains(cell.shift) {
            return Err(ValidationError::ShiftNotInFacility(cell.shift).into());
        }
        self.edit(key, ChangeSet::MATRIX, |entry, _| entry.set_cell(cell, count))
    }

    /// Set minutes per occurrence.
    pub fn set_minutes(&mut self, key: EntryKey, minutes: i64) -> Result<DerivedTotals> {
        let minutes = coerce_input(minutes)?;
        self.edit(key, ChangeSet::MINUTES, |entry, _| entry.set_minutes(minutes))
    }

    pub fn set_status(&mut self, key: EntryKey, status: EntryStatus) -> Result<DerivedTotals> {
        self.edit(key, ChangeSet::STATUS, |entry, _| entry.status = status)
    }

    /// Apply a bulk template, limited to the facility's shifts.
    pub fn apply_template(&mut self, key: EntryKey, template: BulkTemplate) -> Result<DerivedTotals> {
        self.edit(key, ChangeSet::MATRIX, |entry, shifts| {
            let written = entry.apply_template(template, shifts);
            debug!(%key, template = %template, written, "Template applied");
        })
    }

    /// Apply a bulk template by name (`full_week`, `weekday_mornings`, ...).
    pub fn apply_template_named(&mut self, key: EntryKey, name: &str) -> Result<DerivedTotals> {
        let template: BulkTemplate = name.parse()?;
        self.apply_template(key, template)
    }

    fn edit<F>(&mut self, key: EntryKey, changes: ChangeSet, apply: F) -> Result<DerivedTotals>
    where
        F: FnOnce(&mut WeeklyCareEntry, &ShiftSet),
    {
        self.revision += 1;
        let revision = self.revision;
        let defaults = &self.config.defaults;
        let slot = self.entries.entry(key).or_insert_with(|| Slot {
            entry: WeeklyCareEntry::new(key, defaults.minutes_per_occurrence, defaults.status),
            id: None,
            state: SyncState::Dirty,
            unsaved: ChangeSet::default(),
            revision,
            born: revision,
        });

        apply(&mut slot.entry, &self.shifts);
        slot.revision = revision;
        slot.state = SyncState::Dirty;
        // Fields from failed or superseded saves go out again with this one.
        slot.unsaved = slot.unsaved.union(changes);

        let totals = slot.entry.totals();
        let request = SaveRequest {
            revision,
            id: slot.id,
            entry: slot.entry.clone(),
            changes: slot.unsaved,
        };
        debug!(
            %key,
            revision,
            frequency = totals.frequency_per_week,
            total_minutes = totals.total_minutes_week,
            "Entry edited"
        );
        self.coordinator.enqueue_save(key, request);
        Ok(totals)
    }

    /// Remove an entry locally and queue its deletion from the store.
    pub fn delete(&mut self, key: EntryKey) -> Result<()> {
        let slot = self.entries.remove(&key).ok_or(LedgerError::UnknownEntry(key))?;
        self.revision += 1;
        let revision = self.revision;
        self.deleting.insert(key, revision);
        debug!(%key, entry_id = ?slot.id, revision, "Entry removed");
        self.coordinator.enqueue_delete(key, DeleteRequest { revision, id: slot.id });
        Ok(())
    }

    // ---- loading ----

    /// Load a resident's week from the store.
    ///
    /// Entries with unsaved local edits are kept as they are. Clean local
    /// entries for the week that the store no longer has are dropped. Rows
    /// for entries deleted locally are ignored until the delete has run.
    pub async fn load(&mut self, resident_id: ResidentId, week: WeekStart) -> Result<LoadReport> {
        self.pump();
        // A delete finishing while the list is in flight can still leave its
        // row in the listing.
        let deleting: HashSet<EntryKey> = self.deleting.keys().copied().collect();
        let rows = self.store.list(resident_id, week.backend_anchor()).await?;
        let decoded = decode_rows(&rows, &self.shifts, Some(week));
        // Apply anything that finished while the list was in flight.
        self.pump();

        self.entries.retain(|key, slot| {
            key.resident_id != resident_id
                || key.week_start != week
                || slot.state != SyncState::Clean
                || decoded.entries.contains_key(key)
        });

        let mut report = LoadReport::default();
        for (key, (id, entry)) in decoded.entries {
            if let Some(slot) = self.entries.get_mut(&key).filter(|slot| slot.state != SyncState::Clean) {
                slot.id.get_or_insert(id);
                report.kept_local += 1;
                continue;
            }
            if deleting.contains(&key) && !self.entries.contains_key(&key) {
                debug!(%key, entry_id = id, "Skipping row with queued delete");
                report.deleting += 1;
                continue;
            }
            self.revision += 1;
            self.entries.insert(
                key,
                Slot {
                    entry,
                    id: Some(id),
                    state: SyncState::Clean,
                    unsaved: ChangeSet::default(),
                    revision: self.revision,
                    born: self.revision,
                },
            );
            report.loaded += 1;
        }

        for row_issue in &decoded.issues {
            warn!(
                entry_id = row_issue.entry_id,
                kind = row_issue.issue.kind(),
                "Data quality issue in stored entry"
            );
            if let Some(key) = row_issue.key {
                self.emit(LedgerEvent::DataQuality {
                    key,
                    issue: row_issue.issue.clone(),
                });
            }
        }
        report.issues = decoded.issues;

        info!(
            resident_id,
            week = %week,
            loaded = report.loaded,
            kept_local = report.kept_local,
            deleting = report.deleting,
            issues = report.issues.len(),
            "Week loaded"
        );
        Ok(report)
    }

    // ---- sync outcomes ----

    /// Apply finished save outcomes without waiting. Returns how many.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(outcome) = self.coordinator.try_next_outcome() {
            self.apply_outcome(outcome);
            applied += 1;
        }
        applied
    }

    /// Wait for every queued save and delete, then apply the outcomes.
    pub async fn settle(&mut self) -> usize {
        self.coordinator.idle().await;
        self.pump()
    }

    /// Settle and stop the save queues.
    pub async fn close(mut self) {
        self.settle().await;
        self.coordinator.shutdown().await;
        self.pump();
    }

    /// Saves and deletes queued or in flight.
    pub fn pending_saves(&self) -> usize {
        self.coordinator.pending()
    }

    fn apply_outcome(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Started { key, revision } => {
                if let Some(slot) = self.live_slot(key, revision) {
                    if slot.revision == revision {
                        slot.state = SyncState::Saving;
                    }
                }
            }
            SyncOutcome::Saved { key, id, revision } => {
                self.record_saved(key, id, revision);
                self.emit(LedgerEvent::Saved { key, id, revision });
            }
            SyncOutcome::ConflictResolved { key, id, revision } => {
                self.record_saved(key, id, revision);
                self.emit(LedgerEvent::ConflictResolved { key, id });
            }
            SyncOutcome::Failed { key, revision, error } => {
                if let Some(slot) = self.live_slot(key, revision) {
                    if slot.revision == revision {
                        slot.state = SyncState::Dirty;
                    }
                }
                self.emit(LedgerEvent::SaveFailed {
                    key,
                    revision,
                    message: error.to_string(),
                });
            }
            SyncOutcome::Deleted { key, revision, .. } => {
                self.record_deleted(key, revision);
                self.emit(LedgerEvent::Deleted { key });
            }
            SyncOutcome::DeleteFailed { key, revision, error } => {
                self.record_deleted(key, revision);
                self.emit(LedgerEvent::DeleteFailed {
                    key,
                    message: error.to_string(),
                });
            }
        }
    }

    fn record_saved(&mut self, key: EntryKey, id: EntryId, revision: u64) {
        if let Some(slot) = self.live_slot(key, revision) {
            slot.id = Some(id);
            if slot.revision == revision {
                slot.state = SyncState::Clean;
                slot.unsaved = ChangeSet::default();
            }
        }
    }

    fn record_deleted(&mut self, key: EntryKey, revision: u64) {
        if self.deleting.get(&key).is_some_and(|latest| *latest <= revision) {
            self.deleting.remove(&key);
        }
    }

    fn live_slot(&mut self, key: EntryKey, revision: u64) -> Option<&mut Slot> {
        self.entries.get_mut(&key).filter(|slot| revision >= slot.born)
    }

    fn emit(&self, event: LedgerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // ---- snapshots ----

    pub fn entry(&self, key: &EntryKey) -> Option<WeeklyCareEntry> {
        self.entries.get(key).map(|slot| slot.entry.clone())
    }

    pub fn entry_id(&self, key: &EntryKey) -> Option<EntryId> {
        self.entries.get(key).and_then(|slot| slot.id)
    }

    pub fn sync_state(&self, key: &EntryKey) -> Option<SyncState> {
        self.entries.get(key).map(|slot| slot.state)
    }

    /// Keys with edits not yet confirmed by the store.
    pub fn unsaved(&self) -> Vec<EntryKey> {
        let mut keys: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.state != SyncState::Clean)
            .map(|(key, _)| *key)
            .collect();
        keys.sort();
        keys
    }

    /// A resident's entries for a week, ordered by question.
    pub fn entries_for(&self, resident_id: ResidentId, week: WeekStart) -> Vec<WeeklyCareEntry> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .filter(|(key, _)| key.resident_id == resident_id && key.week_start == week)
            .map(|(_, slot)| slot.entry.clone())
            .collect();
        entries.sort_by_key(|entry| entry.question_id);
        entries
    }

    /// Every entry, ordered by key.
    pub fn snapshot(&self) -> Vec<WeeklyCareEntry> {
        let mut entries: Vec<_> = self.entries.values().map(|slot| slot.entry.clone()).collect();
        entries.sort_by_key(|entry| entry.key());
        entries
    }

    /// Day x shift hours for a resident's week.
    pub fn breakdown(&self, resident_id: ResidentId, week: WeekStart) -> Vec<DayBreakdown> {
        summary::per_shift_breakdown(&self.entries_for(resident_id, week), &self.shifts)
    }

    /// Totals for a resident's week.
    pub fn week_summary(&self, resident_id: ResidentId, week: WeekStart) -> ScopeSummary {
        summary::scope_summary(&self.entries_for(resident_id, week))
    }
}
