//! Ledger error types.

use care_model::{EntryKey, ValidationError};
use care_store::StoreError;

/// Errors returned by ledger operations.
///
/// Save failures are not returned here: saves run in the background and
/// report through [`crate::LedgerEvent::SaveFailed`].
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown entry: {0}")]
    UnknownEntry(EntryKey),

    /// Ledger created outside a tokio runtime
    #[error("Runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
