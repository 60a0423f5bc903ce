//! The entry store contract.

use async_trait::async_trait;
use chrono::NaiveDate;

use care_model::{EntryId, ResidentId};

use crate::wire::{EntryPatch, NewEntry, StoredEntry};

/// Error types for store operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// An entry already exists for (resident, question, week_start)
    #[error("Entry already exists (existing id: {existing:?})")]
    Conflict { existing: Option<EntryId> },

    /// No entry with this id
    #[error("Entry not found: {0}")]
    NotFound(EntryId),

    /// Transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Store refused the payload
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Persistence for weekly care entries.
///
/// Week dates on this trait are backend anchors (the Sunday before the
/// Monday the ledger works with). Conversion lives in [`crate::wire`].
#[async_trait]
pub trait LedgerEntryStore: Send + Sync {
    /// Entries for one resident and one week.
    async fn list(
        &self,
        resident_id: ResidentId,
        week_start_date: NaiveDate,
    ) -> Result<Vec<StoredEntry>, StoreError>;

    /// Entries for every resident, for one week or for all time.
    async fn list_all(&self, week_start_date: Option<NaiveDate>) -> Result<Vec<StoredEntry>, StoreError>;

    /// Create an entry. Fails with [`StoreError::Conflict`] if the key exists.
    async fn create(&self, entry: NewEntry) -> Result<StoredEntry, StoreError>;

    /// Update some fields of an entry.
    async fn patch(&self, id: EntryId, patch: EntryPatch) -> Result<StoredEntry, StoreError>;

    /// Remove an entry.
    async fn delete(&self, id: EntryId) -> Result<(), StoreError>;
}
