//! Care Ledger - weekly care-time ledger with optimistic per-entry sync
//!
//! The [`Ledger`] owns every weekly care entry a session works with. Edits
//! apply locally at once, derived totals included, and are persisted in the
//! background by the [`SyncCoordinator`]:
//!
//! ```text
//! edit ──► Ledger (validate, recompute, mark Dirty)
//!             │ SaveRequest
//!             ▼
//!          SyncCoordinator ── per-entry queue ── debounce ──► LedgerEntryStore
//!             │                                                   │
//!             └──────────── SyncOutcome (pump / settle) ◄─────────┘
//! ```
//!
//! Other pieces:
//!
//! - [`WeekContext`]: the session's selected week
//! - [`LedgerEvent`]: save, conflict, failure and data-quality notifications
//! - [`report`]: scope selection and caregiving reports
//! - [`LedgerConfig`]: YAML-loadable settings

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod ledger;
pub mod report;
pub mod sync;

// Re-export main types
pub use config::{EntryDefaults, FacilityConfig, LedgerConfig, SyncConfig};
pub use context::WeekContext;
pub use error::{LedgerError, Result};
pub use events::LedgerEvent;
pub use ledger::{decode_rows, DecodedRows, Ledger, LoadReport, RowIssue};
pub use report::{select_entries, CaregivingReport, ResidentPlacement, SummaryScope};
pub use sync::{SyncCoordinator, SyncOutcome, SyncState};
