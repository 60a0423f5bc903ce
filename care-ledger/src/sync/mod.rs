//! Background persistence of ledger edits.

pub mod coordinator;

pub use coordinator::{DeleteRequest, SaveRequest, SyncCoordinator, SyncOutcome};

use serde::{Deserialize, Serialize};

/// Persistence state of one entry as the ledger sees it.
///
/// `Clean -> Dirty` on a local edit, `Dirty -> Saving` when its snapshot is
/// sent, `Saving -> Clean` when the latest revision is stored. A newer edit
/// while saving moves the entry back to `Dirty`; the older response is then
/// ignored apart from recording the entry id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Clean,
    Dirty,
    Saving,
}
