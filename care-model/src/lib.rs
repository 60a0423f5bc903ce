//! Weekly Care-Time Model
//!
//! Pure domain types and algorithms for the weekly care-time ledger:
//!
//! - **Week anchors**: Monday-keyed weeks in memory, Sunday-keyed weeks at the
//!   persistence boundary
//! - **Care matrix**: occurrence counts per (day, shift) slot
//! - **Reconciler**: decodes both historical `per_day_data` shapes
//! - **Aggregator**: frequency, minutes and hours derived from a matrix
//! - **Templates**: named bulk fill / clear patterns
//! - **Summaries**: day x shift hour buckets and scope totals
//!
//! # Example
//!
//! ```
//! use care_model::{CareMatrix, Cell, Day, DerivedTotals, Shift};
//!
//! let mut matrix = CareMatrix::new();
//! matrix.set(Cell::new(Day::Monday, Shift::Day), 2);
//! matrix.set(Cell::new(Day::Tuesday, Shift::Day), 1);
//!
//! let totals = DerivedTotals::compute(&matrix, 15);
//! assert_eq!(totals.frequency_per_week, 3);
//! assert_eq!(totals.total_minutes_week, 45);
//! assert_eq!(totals.total_hours_week, 0.75);
//! ```

pub mod category;
pub mod entry;
pub mod error;
pub mod frequency;
pub mod matrix;
pub mod reconcile;
pub mod shift;
pub mod summary;
pub mod templates;
pub mod week;

// Re-export main types
pub use category::{AdlCategory, AdlQuestion};
pub use entry::{EntryKey, EntryStatus, WeeklyCareEntry};
pub use error::{FormatIssue, ValidationError};
pub use frequency::DerivedTotals;
pub use matrix::{CareMatrix, Cell};
pub use reconcile::{reconcile, PayloadFormat, PerDayPayload, Reconciled};
pub use shift::{Day, Shift, ShiftFormat, ShiftSet};
pub use summary::{DayBreakdown, ScopeSummary};
pub use templates::BulkTemplate;
pub use week::WeekStart;

/// Resident identifier.
pub type ResidentId = u64;
/// ADL question identifier.
pub type QuestionId = u64;
/// Persisted entry identifier, assigned by the store.
pub type EntryId = u64;
/// Facility identifier.
pub type FacilityId = u64;
/// Facility section identifier.
pub type SectionId = u64;
