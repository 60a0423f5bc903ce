//! The session's current week.
//!
//! One [`WeekContext`] is created per session and handed to every view that
//! needs it. Updates always go through Monday canonicalisation, so every
//! subscriber sees a [`WeekStart`].

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use care_model::WeekStart;

/// Shared handle to the currently selected week.
#[derive(Debug, Clone)]
pub struct WeekContext {
    tx: Arc<watch::Sender<WeekStart>>,
}

impl WeekContext {
    /// Start on the week containing `date`.
    pub fn new(date: NaiveDate) -> Self {
        let (tx, _rx) = watch::channel(WeekStart::containing(date));
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> WeekStart {
        *self.tx.borrow()
    }

    /// Select the week containing `date`. Returns the canonical week.
    pub fn set(&self, date: NaiveDate) -> WeekStart {
        let week = WeekStart::containing(date);
        let changed = self.tx.send_if_modified(|current| {
            if *current == week {
                return false;
            }
            *current = week;
            true
        });
        if changed {
            debug!(week = %week, "Week changed");
        }
        week
    }

    /// Move forward (or back, for negative `weeks`).
    pub fn advance(&self, weeks: i64) -> WeekStart {
        let target = self.current().offset_weeks(weeks);
        self.set(target.date())
    }

    /// Receiver notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<WeekStart> {
        self.tx.subscribe()
    }
}
