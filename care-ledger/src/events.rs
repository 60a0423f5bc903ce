//! Events broadcast by the ledger.

use serde::{Deserialize, Serialize};

use care_model::{EntryId, EntryKey, FormatIssue};

/// Non-fatal notifications for whoever is listening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A stored row was read with a defect
    DataQuality { key: EntryKey, issue: FormatIssue },
    /// A save completed
    Saved {
        key: EntryKey,
        id: EntryId,
        revision: u64,
    },
    /// A create collided with an existing row and was applied as an update
    ConflictResolved { key: EntryKey, id: EntryId },
    /// A save failed; local state is unchanged and the entry stays dirty
    SaveFailed {
        key: EntryKey,
        revision: u64,
        message: String,
    },
    /// A delete completed
    Deleted { key: EntryKey },
    DeleteFailed { key: EntryKey, message: String },
}

impl LedgerEvent {
    pub fn key(&self) -> EntryKey {
        match self {
            Self::DataQuality { key, .. }
            | Self::Saved { key, .. }
            | Self::ConflictResolved { key, .. }
            | Self::SaveFailed { key, .. }
            | Self::Deleted { key }
            | Self::DeleteFailed { key, .. } => *key,
        }
    }
}
