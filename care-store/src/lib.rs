//! Care Store - the persistence boundary of the care-time ledger
//!
//! Everything that crosses into or out of the entry store goes through this
//! crate:
//!
//! - [`LedgerEntryStore`]: trait over list / create / patch / delete
//! - [`wire`]: wire records, Sunday week anchors and `per_day_data` encoding
//! - [`InMemoryStore`]: uniqueness-enforcing store for tests and embedding
//! - [`catalog`]: read-only facility and question catalogs
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  NewEntry / EntryPatch   ┌──────────────────┐
//! │ care-ledger  │ ───────────────────────► │ LedgerEntryStore │
//! │  (Monday)    │ ◄─────────────────────── │    (Sunday)      │
//! └──────────────┘      StoredEntry         └──────────────────┘
//!         ▲                                          │
//!         └────────── wire::from_stored ◄────────────┘
//! ```

pub mod catalog;
pub mod memory;
pub mod traits;
pub mod wire;

// Re-export main types
pub use catalog::{FacilityCatalog, QuestionCatalog, StaticCatalog};
pub use memory::InMemoryStore;
pub use traits::{LedgerEntryStore, StoreError};
pub use wire::{EntryPatch, NewEntry, StoredEntry};
