//! Ledger integration tests
//!
//! Drives the ledger against the in-memory store:
//! - local edits and derived totals
//! - create / conflict / patch decisions
//! - network failures and the last-edit-wins rule
//! - loading legacy rows and facility shift sets
//! - templates, deletes and the week context

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use care_ledger::{Ledger, LedgerConfig, LedgerEvent, SyncState, WeekContext};
use care_model::{
    BulkTemplate, Cell, Day, EntryId, EntryKey, EntryStatus, ResidentId, Shift, ShiftFormat, ShiftSet, WeekStart,
    WeeklyCareEntry,
};
use care_store::wire::{self, EntryPatch, NewEntry, StoredEntry};
use care_store::{InMemoryStore, LedgerEntryStore, StaticCatalog, StoreError};

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
}

fn week() -> WeekStart {
    WeekStart::containing(monday())
}

fn key(question_id: u64) -> EntryKey {
    EntryKey::new(1, question_id, week())
}

fn config() -> LedgerConfig {
    LedgerConfig::default().with_debounce_ms(0)
}

fn ledger(store: &Arc<InMemoryStore>, config: LedgerConfig) -> Ledger {
    Ledger::new(store.clone(), config).unwrap()
}

fn drain(rx: &mut broadcast::Receiver<LedgerEvent>) -> Vec<LedgerEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

fn mon_day() -> Cell {
    Cell::new(Day::Monday, Shift::Day)
}

fn tue_day() -> Cell {
    Cell::new(Day::Tuesday, Shift::Day)
}

// =============================================================================
// Local Edits
// =============================================================================

#[tokio::test]
async fn test_fifteen_minute_scenario() {
    let store = Arc::new(InMemoryStore::new());
    let mut ledger = ledger(&store, config());

    ledger.set_minutes(key(1), 15).unwrap();
    ledger.set_cell(key(1), mon_day(), 2).unwrap();
    let totals = ledger.set_cell(key(1), tue_day(), 1).unwrap();

    assert_eq!(totals.frequency_per_week, 3);
    assert_eq!(totals.total_minutes_week, 45);
    assert_eq!(totals.total_hours_week, 0.75);

    ledger.settle().await;

    let rows = store.all();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.week_start_date, "2024-03-03");
    assert_eq!(row.week_end_date.as_deref(), Some("2024-03-10"));
    assert_eq!(row.frequency_per_week, Some(3));
    assert_eq!(row.total_minutes_week, Some(45));
    assert_eq!(row.total_hours_week, Some(0.75));
    assert_eq!(row.per_day_data["Monday"], json!({"Day": 2, "Swing": 0, "NOC": 0}));
    assert_eq!(row.per_day_data["Tuesday"]["Day"], json!(1));
}

#[tokio::test]
async fn test_new_entries_take_configured_defaults() {
    let store = Arc::new(InMemoryStore::new());
    let mut ledger = ledger(&store, config().with_default_minutes(20));

    let totals = ledger.set_cell(key(1), mon_day(), 3).unwrap();
    assert_eq!(totals.total_minutes_week, 60);
    assert_eq!(totals.total_hours_week, 1.0);

    let entry = ledger.entry(&key(1)).unwrap();
    assert_eq!(entry.status, EntryStatus::Incomplete);
    assert_eq!(entry.minutes_per_occurrence(), 20);
}

#[tokio::test]
async fn test_status_change_patches_status_only() {
    let store = Arc::new(InMemoryStore::new());
    let mut ledger = ledger(&store, config());

    ledger.set_cell(key(1), mon_day(), 1).unwrap();
    ledger.settle().await;
    ledger.set_status(key(1), EntryStatus::NotApplicable).unwrap();
    ledger.settle().await;

    assert_eq!(store.patch_calls(), 1);
    assert_eq!(store.all()[0].status.as_deref(), Some("Not Applicable"));
    assert_eq!(ledger.sync_state(&key(1)), Some(SyncState::Clean));
}

// =============================================================================
// Create / Conflict / Patch
// =============================================================================

#[tokio::test]
async fn test_create_conflict_falls_back_to_update() {
    let store = Arc::new(InMemoryStore::new());
    let shifts = ShiftSet::three_shift();
    let mut other = WeeklyCareEntry::new(key(1), 5, EntryStatus::Incomplete);
    other.set_cell(mon_day(), 7);
    let existing = store.create(wire::to_new_entry(&other, &shifts)).await.unwrap();

    let mut ledger = ledger(&store, config());
    let mut events = ledger.subscribe();
    ledger.set_minutes(key(1), 10).unwrap();
    ledger.set_cell(key(1), mon_day(), 2).unwrap();
    ledger.settle().await;

    let events = drain(&mut events);
    assert!(events.contains(&LedgerEvent::ConflictResolved {
        key: key(1),
        id: existing.id
    }));
    assert!(!events.iter().any(|e| matches!(e, LedgerEvent::SaveFailed { .. })));

    let rows = store.find(1, 1, week().backend_anchor());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].frequency_per_week, Some(2));
    assert_eq!(rows[0].minutes_per_occurrence, json!(10));
    assert_eq!(ledger.entry_id(&key(1)), Some(existing.id));
    assert_eq!(ledger.sync_state(&key(1)), Some(SyncState::Clean));
}

/// Store whose conflicts do not say which row collided.
struct AnonymousConflictStore {
    inner: InMemoryStore,
}

#[async_trait]
impl LedgerEntryStore for AnonymousConflictStore {
    async fn list(&self, resident_id: ResidentId, week_start_date: NaiveDate) -> Result<Vec<StoredEntry>, StoreError> {
        self.inner.list(resident_id, week_start_date).await
    }

    async fn list_all(&self, week_start_date: Option<NaiveDate>) -> Result<Vec<StoredEntry>, StoreError> {
        self.inner.list_all(week_start_date).await
    }

    async fn create(&self, entry: NewEntry) -> Result<StoredEntry, StoreError> {
        self.inner.create(entry).await.map_err(|e| match e {
            StoreError::Conflict { .. } => StoreError::Conflict { existing: None },
            other => other,
        })
    }

    async fn patch(&self, id: EntryId, patch: EntryPatch) -> Result<StoredEntry, StoreError> {
        self.inner.patch(id, patch).await
    }

    async fn delete(&self, id: EntryId) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }
}

#[tokio::test]
async fn test_conflict_without_id_resolved_by_listing() {
    let store = Arc::new(AnonymousConflictStore {
        inner: InMemoryStore::new(),
    });
    let seeded = WeeklyCareEntry::new(key(2), 5, EntryStatus::Incomplete);
    let existing = store
        .create(wire::to_new_entry(&seeded, &ShiftSet::three_shift()))
        .await
        .unwrap();

    let mut ledger = Ledger::new(store.clone(), config()).unwrap();
    ledger.set_cell(key(2), mon_day(), 4).unwrap();
    ledger.settle().await;

    assert_eq!(ledger.entry_id(&key(2)), Some(existing.id));
    let rows = store.inner.all();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].frequency_per_week, Some(4));
}

#[tokio::test]
async fn test_one_entry_per_key_across_sessions() {
    let store = Arc::new(InMemoryStore::new());
    let mut first = ledger(&store, config());
    let mut second = ledger(&store, config());

    first.set_cell(key(3), mon_day(), 1).unwrap();
    second.set_cell(key(3), tue_day(), 1).unwrap();
    first.settle().await;
    second.settle().await;

    for count in 2..5 {
        first.set_cell(key(3), mon_day(), count).unwrap();
        first.settle().await;
        second.set_minutes(key(3), count).unwrap();
        second.settle().await;
    }

    assert_eq!(store.find(1, 3, week().backend_anchor()).len(), 1);
    assert_eq!(first.entry_id(&key(3)), second.entry_id(&key(3)));
}

// =============================================================================
// Failures and Ordering
// =============================================================================

#[tokio::test]
async fn test_network_failure_keeps_local_state() {
    let store = Arc::new(InMemoryStore::new());
    let mut ledger = ledger(&store, config().with_default_minutes(10));
    let mut events = ledger.subscribe();

    store.fail_next_writes(1);
    ledger.set_cell(key(1), mon_day(), 2).unwrap();
    ledger.settle().await;

    let failed = drain(&mut events);
    assert!(failed
        .iter()
        .any(|e| matches!(e, LedgerEvent::SaveFailed { revision: 1, .. })));
    assert!(store.is_empty());
    assert_eq!(ledger.sync_state(&key(1)), Some(SyncState::Dirty));
    assert_eq!(ledger.entry(&key(1)).unwrap().frequency_per_week(), 2);
    assert_eq!(ledger.unsaved(), vec![key(1)]);

    // No retry until the next edit.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(store.create_calls(), 1);

    ledger.set_cell(key(1), tue_day(), 1).unwrap();
    ledger.settle().await;

    let rows = store.all();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].frequency_per_week, Some(3));
    assert_eq!(ledger.sync_state(&key(1)), Some(SyncState::Clean));
}

#[tokio::test]
async fn test_failed_patch_fields_resent_with_next_edit() {
    let store = Arc::new(InMemoryStore::new());
    let mut ledger = ledger(&store, config());

    ledger.set_minutes(key(1), 10).unwrap();
    ledger.set_cell(key(1), mon_day(), 1).unwrap();
    ledger.settle().await;
    assert_eq!(ledger.sync_state(&key(1)), Some(SyncState::Clean));

    store.fail_next_writes(1);
    ledger.set_cell(key(1), mon_day(), 5).unwrap();
    ledger.settle().await;
    assert_eq!(ledger.sync_state(&key(1)), Some(SyncState::Dirty));
    assert_eq!(store.all()[0].per_day_data["Monday"]["Day"], json!(1));

    // A minutes-only edit still carries the matrix that failed to save.
    ledger.set_minutes(key(1), 12).unwrap();
    ledger.settle().await;

    let rows = store.all();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].per_day_data["Monday"]["Day"], json!(5));
    assert_eq!(rows[0].frequency_per_week, Some(5));
    assert_eq!(rows[0].total_minutes_week, Some(60));
    assert_eq!(ledger.sync_state(&key(1)), Some(SyncState::Clean));
}

#[tokio::test]
async fn test_last_local_edit_wins() {
    let store = Arc::new(InMemoryStore::new());
    let mut ledger = ledger(&store, config());

    store.push_write_delay(Duration::from_millis(200));
    ledger.set_cell(key(1), mon_day(), 1).unwrap();

    // Let the first save go out, then edit while it is in flight.
    tokio::time::sleep(Duration::from_millis(20)).await;
    ledger.pump();
    assert_eq!(ledger.sync_state(&key(1)), Some(SyncState::Saving));

    ledger.set_cell(key(1), mon_day(), 5).unwrap();
    assert_eq!(ledger.sync_state(&key(1)), Some(SyncState::Dirty));

    ledger.settle().await;

    assert_eq!(ledger.entry(&key(1)).unwrap().frequency_per_week(), 5);
    assert_eq!(ledger.sync_state(&key(1)), Some(SyncState::Clean));
    assert_eq!(store.all()[0].frequency_per_week, Some(5));
    assert_eq!(store.create_calls(), 1);
    assert_eq!(store.patch_calls(), 1);
}

#[tokio::test]
async fn test_debounce_coalesces_rapid_edits() {
    let store = Arc::new(InMemoryStore::new());
    let mut ledger = ledger(&store, LedgerConfig::default().with_debounce_ms(30));

    for count in 1..=6 {
        ledger.set_cell(key(1), mon_day(), count).unwrap();
    }
    assert_eq!(ledger.pending_saves(), 6);
    ledger.settle().await;

    assert_eq!(store.create_calls(), 1);
    assert_eq!(store.patch_calls(), 0);
    assert_eq!(store.all()[0].frequency_per_week, Some(6));
    assert_eq!(ledger.pending_saves(), 0);
}

// =============================================================================
// Loading
// =============================================================================

fn legacy_row(id: EntryId, question_id: u64, per_day_data: serde_json::Value) -> StoredEntry {
    StoredEntry {
        id,
        resident_id: 1,
        question_id,
        week_start_date: "2024-03-03".to_string(),
        week_end_date: None,
        minutes_per_occurrence: json!(15),
        frequency_per_week: Some(7),
        total_minutes_week: None,
        total_hours_week: None,
        status: Some("Complete".to_string()),
        per_day_data,
    }
}

#[tokio::test]
async fn test_load_legacy_row_on_two_shift_facility() {
    let store = Arc::new(InMemoryStore::new());
    store.seed(legacy_row(
        40,
        2,
        json!({"MonShift1Time": 1, "MonShift3Time": 2, "WedShift2Time": 4}),
    ));
    let catalog = StaticCatalog::new().with_facility(5, ShiftFormat::TwoShift);

    let mut ledger = Ledger::for_facility(store.clone(), &catalog, 5, config()).await.unwrap();
    let mut events = ledger.subscribe();
    let report = ledger.load(1, week()).await.unwrap();

    assert_eq!(report.loaded, 1);
    let entry = ledger.entry(&key(2)).unwrap();
    assert_eq!(entry.frequency_per_week(), 3);
    assert_eq!(entry.total_minutes_week(), 45);
    assert_eq!(entry.status, EntryStatus::Complete);
    assert_eq!(ledger.entry_id(&key(2)), Some(40));
    assert_eq!(ledger.sync_state(&key(2)), Some(SyncState::Clean));

    let kinds: Vec<_> = report.issues.iter().map(|i| i.issue.kind()).collect();
    assert!(kinds.contains(&"shift_outside_facility"));
    assert!(kinds.contains(&"derived_mismatch"));
    assert_eq!(drain(&mut events).len(), report.issues.len());

    let breakdown = ledger.breakdown(1, week());
    assert_eq!(breakdown[0].hours_for(Shift::Day), 0.25);
    assert_eq!(breakdown[0].hours_for(Shift::Noc), 0.5);
    assert_eq!(breakdown[2].hours_for(Shift::Swing), 0.0);
}

#[tokio::test]
async fn test_load_keeps_dirty_entries_and_dedupes() {
    let store = Arc::new(InMemoryStore::new());
    store.seed(legacy_row(11, 1, json!({"Monday": {"Day": 1}})));
    store.seed(legacy_row(12, 1, json!({"Monday": {"Day": 3}})));
    store.seed(legacy_row(20, 2, json!({"Friday": {"NOC": 2}})));

    let mut ledger = ledger(&store, LedgerConfig::default().with_debounce_ms(500));
    ledger.set_cell(key(2), mon_day(), 9).unwrap();

    let report = ledger.load(1, week()).await.unwrap();
    assert_eq!(report.loaded, 1);
    assert_eq!(report.kept_local, 1);
    assert!(report
        .issues
        .iter()
        .any(|i| i.issue.kind() == "duplicate_entry" && i.entry_id == 12));

    assert_eq!(ledger.entry(&key(1)).unwrap().frequency_per_week(), 1);
    assert_eq!(ledger.entry_id(&key(1)), Some(11));
    let local = ledger.entry(&key(2)).unwrap();
    assert_eq!(local.matrix().get(mon_day()), 9);
    assert_eq!(local.matrix().get(Cell::new(Day::Friday, Shift::Noc)), 0);
    assert_eq!(ledger.entry_id(&key(2)), Some(20));

    ledger.settle().await;
    let row = store.get(20).unwrap();
    assert_eq!(row.per_day_data["Monday"]["Day"], json!(9));
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn test_load_ignores_rows_with_queued_delete() {
    let store = Arc::new(InMemoryStore::new());
    let mut ledger = ledger(&store, LedgerConfig::default().with_debounce_ms(50));

    ledger.set_minutes(key(1), 10).unwrap();
    ledger.set_cell(key(1), mon_day(), 3).unwrap();
    ledger.settle().await;
    assert_eq!(store.len(), 1);

    ledger.delete(key(1)).unwrap();
    let report = ledger.load(1, week()).await.unwrap();
    assert_eq!(report.loaded, 0);
    assert_eq!(report.deleting, 1);
    assert!(ledger.entry(&key(1)).is_none());

    ledger.settle().await;
    assert!(store.is_empty());
    assert!(ledger.entry(&key(1)).is_none());
    assert_eq!(ledger.week_summary(1, week()).total_minutes, 0);

    let report = ledger.load(1, week()).await.unwrap();
    assert_eq!(report.deleting, 0);
    assert!(ledger.entries_for(1, week()).is_empty());
}

#[tokio::test]
async fn test_entries_follow_week_context() {
    let store = Arc::new(InMemoryStore::new());
    store.seed(legacy_row(1, 1, json!({"Monday": {"Day": 1}})));
    let mut next_week = legacy_row(2, 1, json!({"Monday": {"Day": 2}}));
    next_week.week_start_date = "2024-03-10".to_string();
    store.seed(next_week);

    let context = WeekContext::new(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
    let mut ledger = ledger(&store, config());

    ledger.load(1, context.current()).await.unwrap();
    let week_two = context.advance(1);
    ledger.load(1, week_two).await.unwrap();

    assert_eq!(ledger.entries_for(1, week()).len(), 1);
    assert_eq!(ledger.entries_for(1, week_two)[0].frequency_per_week(), 2);
    assert_eq!(ledger.snapshot().len(), 2);
    assert_eq!(ledger.week_summary(1, week_two).total_minutes, 30);
}

// =============================================================================
// Templates and Deletes
// =============================================================================

#[tokio::test]
async fn test_templates_respect_facility_shifts() {
    let store = Arc::new(InMemoryStore::new());
    let mut ledger = ledger(&store, config().with_shift_format(ShiftFormat::TwoShift));

    let totals = ledger.apply_template(key(1), BulkTemplate::FullWeek).unwrap();
    assert_eq!(totals.frequency_per_week, 14);
    let totals = ledger.apply_template(key(1), BulkTemplate::WeekdayEvenings).unwrap();
    assert_eq!(totals.frequency_per_week, 14);
    ledger.settle().await;

    let row = &store.all()[0];
    assert_eq!(row.frequency_per_week, Some(14));
    assert_eq!(row.per_day_data["Sunday"], json!({"Day": 1, "NOC": 1}));

    let totals = ledger.apply_template(key(1), BulkTemplate::ClearAll).unwrap();
    assert_eq!(totals.frequency_per_week, 0);
    assert_eq!(ledger.entry(&key(1)).unwrap().matrix().len(), 14);
}

#[tokio::test]
async fn test_delete_removes_entry() {
    let store = Arc::new(InMemoryStore::new());
    let mut ledger = ledger(&store, config());
    let mut events = ledger.subscribe();

    ledger.set_cell(key(1), mon_day(), 1).unwrap();
    ledger.settle().await;
    assert_eq!(store.len(), 1);

    ledger.delete(key(1)).unwrap();
    assert!(ledger.entry(&key(1)).is_none());
    ledger.settle().await;

    assert!(store.is_empty());
    assert!(drain(&mut events).contains(&LedgerEvent::Deleted { key: key(1) }));

    // Re-created entries start over with a fresh row.
    ledger.set_cell(key(1), tue_day(), 2).unwrap();
    ledger.close().await;
    let rows = store.all();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].frequency_per_week, Some(2));
    assert_eq!(rows[0].per_day_data["Monday"]["Day"], json!(0));
}
