//! In-memory entry store.
//!
//! Enforces the (resident, question, week_start_date) uniqueness the real
//! backend is expected to enforce, and can inject latency and network
//! failures so sync behaviour can be exercised without a server.

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

use care_model::week::format_wire_date;
use care_model::{EntryId, QuestionId, ResidentId};

use crate::traits::{LedgerEntryStore, StoreError};
use crate::wire::{EntryPatch, NewEntry, StoredEntry};

type UniqueKey = (ResidentId, QuestionId, String);

/// Store backed by concurrent maps.
pub struct InMemoryStore {
    entries: DashMap<EntryId, StoredEntry>,
    by_key: DashMap<UniqueKey, EntryId>,
    next_id: AtomicU64,
    offline: AtomicBool,
    fail_next_writes: AtomicU32,
    write_delays: Mutex<VecDeque<Duration>>,
    create_calls: AtomicU32,
    patch_calls: AtomicU32,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            by_key: DashMap::new(),
            next_id: AtomicU64::new(1),
            offline: AtomicBool::new(false),
            fail_next_writes: AtomicU32::new(0),
            write_delays: Mutex::new(VecDeque::new()),
            create_calls: AtomicU32::new(0),
            patch_calls: AtomicU32::new(0),
        }
    }

    /// Insert a row as-is, bypassing uniqueness. For seeding legacy data.
    pub fn seed(&self, entry: StoredEntry) {
        self.next_id.fetch_max(entry.id + 1, Ordering::SeqCst);
        self.by_key
            .entry(unique_key_of(&entry))
            .or_insert(entry.id);
        self.entries.insert(entry.id, entry);
    }

    /// While offline every call fails with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next `count` create/patch/delete calls with a network error.
    pub fn fail_next_writes(&self, count: u32) {
        self.fail_next_writes.store(count, Ordering::SeqCst);
    }

    /// Delay the next write calls, one queued delay per call.
    pub fn push_write_delay(&self, delay: Duration) {
        if let Ok(mut delays) = self.write_delays.lock() {
            delays.push_back(delay);
        }
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A stored row by id.
    pub fn get(&self, id: EntryId) -> Option<StoredEntry> {
        self.entries.get(&id).map(|e| e.value().clone())
    }

    /// Every stored row, ordered by id.
    pub fn all(&self) -> Vec<StoredEntry> {
        let mut rows: Vec<_> = self.entries.iter().map(|e| e.value().clone()).collect();
        rows.sort_by_key(|e| e.id);
        rows
    }

    /// Rows matching a ledger key's wire form.
    pub fn find(&self, resident_id: ResidentId, question_id: QuestionId, week_start_date: NaiveDate) -> Vec<StoredEntry> {
        let date = format_wire_date(week_start_date);
        let mut rows: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.resident_id == resident_id && e.question_id == question_id && e.week_start_date == date)
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|e| e.id);
        rows
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn patch_calls(&self) -> u32 {
        self.patch_calls.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Network("store offline".to_string()));
        }
        Ok(())
    }

    async fn before_write(&self) -> Result<(), StoreError> {
        let delay = self.write_delays.lock().ok().and_then(|mut d| d.pop_front());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_online()?;
        let injected = self
            .fail_next_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            warn!("Injected write failure");
            return Err(StoreError::Network("injected failure".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn unique_key_of(entry: &StoredEntry) -> UniqueKey {
    (entry.resident_id, entry.question_id, entry.week_start_date.clone())
}

#[async_trait]
impl LedgerEntryStore for InMemoryStore {
    async fn list(
        &self,
        resident_id: ResidentId,
        week_start_date: NaiveDate,
    ) -> Result<Vec<StoredEntry>, StoreError> {
        self.check_online()?;
        let date = format_wire_date(week_start_date);
        let mut rows: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.resident_id == resident_id && e.week_start_date == date)
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|e| e.id);
        Ok(rows)
    }

    async fn list_all(&self, week_start_date: Option<NaiveDate>) -> Result<Vec<StoredEntry>, StoreError> {
        self.check_online()?;
        let date = week_start_date.map(format_wire_date);
        let mut rows: Vec<_> = self
            .entries
            .iter()
            .filter(|e| date.as_ref().map_or(true, |d| &e.week_start_date == d))
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|e| e.id);
        Ok(rows)
    }

    async fn create(&self, entry: NewEntry) -> Result<StoredEntry, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.before_write().await?;

        let key = (entry.resident_id, entry.question_id, entry.week_start_date.clone());
        let id = match self.by_key.entry(key) {
            Entry::Occupied(existing) => {
                let existing = *existing.get();
                debug!(existing_id = existing, "Create collided with existing entry");
                return Err(StoreError::Conflict {
                    existing: Some(existing),
                });
            }
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                slot.insert(id);
                id
            }
        };

        let stored = StoredEntry {
            id,
            resident_id: entry.resident_id,
            question_id: entry.question_id,
            week_start_date: entry.week_start_date,
            week_end_date: Some(entry.week_end_date),
            minutes_per_occurrence: entry.minutes_per_occurrence.into(),
            frequency_per_week: Some(entry.frequency_per_week),
            total_minutes_week: Some(entry.total_minutes_week),
            total_hours_week: Some(entry.total_hours_week),
            status: Some(entry.status.as_str().to_string()),
            per_day_data: entry.per_day_data,
        };
        self.entries.insert(id, stored.clone());
        debug!(entry_id = id, "Created entry");
        Ok(stored)
    }

    async fn patch(&self, id: EntryId, patch: EntryPatch) -> Result<StoredEntry, StoreError> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        self.before_write().await?;

        let mut row = self.entries.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if let Some(minutes) = patch.minutes_per_occurrence {
            row.minutes_per_occurrence = minutes.into();
        }
        if let Some(data) = patch.per_day_data {
            row.per_day_data = data;
        }
        if let Some(freq) = patch.frequency_per_week {
            row.frequency_per_week = Some(freq);
        }
        if let Some(minutes) = patch.total_minutes_week {
            row.total_minutes_week = Some(minutes);
        }
        if let Some(hours) = patch.total_hours_week {
            row.total_hours_week = Some(hours);
        }
        if let Some(status) = patch.status {
            row.status = Some(status.as_str().to_string());
        }
        debug!(entry_id = id, "Patched entry");
        Ok(row.clone())
    }

    async fn delete(&self, id: EntryId) -> Result<(), StoreError> {
        self.before_write().await?;
        let (_, row) = self.entries.remove(&id).ok_or(StoreError::NotFound(id))?;
        self.by_key.remove_if(&unique_key_of(&row), |_, owner| *owner == id);
        debug!(entry_id = id, "Deleted entry");
        Ok(())
    }
}
