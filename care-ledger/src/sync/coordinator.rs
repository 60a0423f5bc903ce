//! Sync coordinator: one save queue per entry.
//!
//! Each [`EntryKey`] gets its own tokio task fed by an mpsc channel. A task
//! waits for a quiet period of `debounce` after the last command before it
//! talks to the store, merging everything that arrived in between:
//!
//! - save + save: the later snapshot wins, touched fields are unioned
//! - save + delete: delete
//! - delete + save: delete, then create from the save
//!
//! Requests for one entry are sent one at a time. Nothing is cancelled and
//! nothing is retried; outcomes are reported back over a channel that the
//! ledger drains.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use care_model::{EntryId, EntryKey, ShiftSet, WeeklyCareEntry};
use care_store::wire::{self, ChangeSet};
use care_store::{LedgerEntryStore, StoreError};

/// A full snapshot of an entry to persist.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    /// Ledger revision the snapshot was taken at
    pub revision: u64,
    /// Store id, if the ledger knows it
    pub id: Option<EntryId>,
    pub entry: WeeklyCareEntry,
    /// Fields touched since the entry was last clean
    pub changes: ChangeSet,
}

/// Removal of an entry from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteRequest {
    /// Ledger revision the delete was issued at
    pub revision: u64,
    pub id: Option<EntryId>,
}

impl SaveRequest {
    fn merge(self, later: SaveRequest) -> SaveRequest {
        SaveRequest {
            revision: later.revision,
            id: later.id.or(self.id),
            entry: later.entry,
            changes: self.changes.union(later.changes),
        }
    }
}

/// Result of one store round trip, reported to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The worker started sending `revision`
    Started { key: EntryKey, revision: u64 },
    Saved {
        key: EntryKey,
        id: EntryId,
        revision: u64,
    },
    /// Create hit an existing row; the row was patched instead
    ConflictResolved {
        key: EntryKey,
        id: EntryId,
        revision: u64,
    },
    Failed {
        key: EntryKey,
        revision: u64,
        error: StoreError,
    },
    Deleted {
        key: EntryKey,
        id: Option<EntryId>,
        revision: u64,
    },
    DeleteFailed {
        key: EntryKey,
        revision: u64,
        error: StoreError,
    },
}

enum Command {
    Save(SaveRequest),
    Delete(DeleteRequest),
}

/// Commands collected during one debounce window.
#[derive(Default)]
struct Batch {
    delete: Option<DeleteRequest>,
    save: Option<SaveRequest>,
}

impl Batch {
    fn absorb(&mut self, command: Command) {
        match command {
            Command::Save(request) => {
                self.save = Some(match self.save.take() {
                    Some(earlier) => earlier.merge(request),
                    None => request,
                });
            }
            Command::Delete(request) => {
                let pending_id = self.save.take().and_then(|s| s.id);
                let earlier = self.delete.and_then(|d| d.id);
                self.delete = Some(DeleteRequest {
                    revision: request.revision,
                    id: request.id.or(pending_id).or(earlier),
                });
            }
        }
    }
}

/// Outstanding command count, for [`SyncCoordinator::idle`].
#[derive(Default)]
struct Pending {
    count: AtomicUsize,
    notify: Notify,
}

impl Pending {
    fn add(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self, n: usize) {
        self.count.fetch_sub(n, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

struct Queue {
    tx: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

/// Owns the per-entry queues.
pub struct SyncCoordinator {
    store: Arc<dyn LedgerEntryStore>,
    shifts: ShiftSet,
    debounce: Duration,
    runtime: Handle,
    queues: HashMap<EntryKey, Queue>,
    outcomes_tx: mpsc::UnboundedSender<SyncOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<SyncOutcome>,
    pending: Arc<Pending>,
}

impl SyncCoordinator {
    pub fn new(store: Arc<dyn LedgerEntryStore>, shifts: ShiftSet, debounce: Duration, runtime: Handle) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            store,
            shifts,
            debounce,
            runtime,
            queues: HashMap::new(),
            outcomes_tx,
            outcomes_rx,
            pending: Arc::new(Pending::default()),
        }
    }

    /// Queue a save behind whatever is pending for the entry.
    pub fn enqueue_save(&mut self, key: EntryKey, request: SaveRequest) {
        self.send(key, Command::Save(request));
    }

    /// Queue a delete behind whatever is pending for the entry.
    pub fn enqueue_delete(&mut self, key: EntryKey, request: DeleteRequest) {
        self.send(key, Command::Delete(request));
    }

    fn send(&mut self, key: EntryKey, command: Command) {
        self.pending.add();
        let sent = self.queue(key).tx.send(command);
        if let Err(mpsc::error::SendError(command)) = sent {
            // Worker gone (panicked); start a fresh one.
            warn!(%key, "Save queue closed, restarting");
            self.queues.remove(&key);
            if self.queue(key).tx.send(command).is_err() {
                self.pending.finish(1);
            }
        }
    }

    fn queue(&mut self, key: EntryKey) -> &Queue {
        let Self {
            store,
            shifts,
            debounce,
            runtime,
            queues,
            outcomes_tx,
            pending,
            ..
        } = self;
        queues.entry(key).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            let worker = EntryWorker {
                key,
                id: None,
                store: Arc::clone(store),
                shifts: shifts.clone(),
                debounce: *debounce,
                outcomes: outcomes_tx.clone(),
                pending: Arc::clone(pending),
            };
            debug!(%key, "Starting save queue");
            let handle = runtime.spawn(worker.run(rx));
            Queue { tx, handle }
        })
    }

    /// Next reported outcome, without waiting.
    pub fn try_next_outcome(&mut self) -> Option<SyncOutcome> {
        self.outcomes_rx.try_recv().ok()
    }

    /// Wait until every queued command has been sent and answered.
    pub async fn idle(&self) {
        loop {
            let notified = self.pending.notify.notified();
            if self.pending.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Commands queued or in flight.
    pub fn pending(&self) -> usize {
        self.pending.count.load(Ordering::SeqCst)
    }

    /// Close every queue and wait for the workers to drain.
    pub async fn shutdown(&mut self) {
        let handles: Vec<_> = self
            .queues
            .drain()
            .map(|(_, queue)| {
                drop(queue.tx);
                queue.handle
            })
            .collect();
        let count = handles.len();
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Save queue ended abnormally");
            }
        }
        info!(queues = count, "Sync coordinator stopped");
    }
}

/// How a save reached the store.
enum Persisted {
    Created(EntryId),
    Patched(EntryId),
    Resolved(EntryId),
}

struct EntryWorker {
    key: EntryKey,
    id: Option<EntryId>,
    store: Arc<dyn LedgerEntryStore>,
    shifts: ShiftSet,
    debounce: Duration,
    outcomes: mpsc::UnboundedSender<SyncOutcome>,
    pending: Arc<Pending>,
}

impl EntryWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(first) = rx.recv().await {
            let mut batch = Batch::default();
            batch.absorb(first);
            let mut taken = 1;

            // Trailing debounce: restart the window on every command.
            while let Ok(Some(command)) = tokio::time::timeout(self.debounce, rx.recv()).await {
                batch.absorb(command);
                taken += 1;
            }

            if taken > 1 {
                debug!(key = %self.key, commands = taken, "Coalesced queued commands");
            }
            self.execute(batch).await;
            self.pending.finish(taken);
        }
        debug!(key = %self.key, "Save queue closed");
    }

    async fn execute(&mut self, batch: Batch) {
        if let Some(request) = batch.delete {
            self.delete(request).await;
        }
        if let Some(request) = batch.save {
            self.save(request).await;
        }
    }

    async fn delete(&mut self, request: DeleteRequest) {
        let revision = request.revision;
        let Some(id) = self.id.take().or(request.id) else {
            // Never persisted.
            self.report(SyncOutcome::Deleted {
                key: self.key,
                id: None,
                revision,
            });
            return;
        };
        match self.store.delete(id).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {
                debug!(key = %self.key, entry_id = id, "Entry deleted");
                self.report(SyncOutcome::Deleted {
                    key: self.key,
                    id: Some(id),
                    revision,
                });
            }
            Err(error) => {
                warn!(key = %self.key, entry_id = id, %error, "Delete failed");
                self.id = Some(id);
                self.report(SyncOutcome::DeleteFailed {
                    key: self.key,
                    revision,
                    error,
                });
            }
        }
    }

    async fn save(&mut self, request: SaveRequest) {
        let revision = request.revision;
        self.report(SyncOutcome::Started { key: self.key, revision });

        let outcome = match self.persist(&request).await {
            Ok(Persisted::Created(id)) | Ok(Persisted::Patched(id)) => {
                self.id = Some(id);
                debug!(key = %self.key, entry_id = id, revision, "Entry saved");
                SyncOutcome::Saved {
                    key: self.key,
                    id,
                    revision,
                }
            }
            Ok(Persisted::Resolved(id)) => {
                self.id = Some(id);
                SyncOutcome::ConflictResolved {
                    key: self.key,
                    id,
                    revision,
                }
            }
            Err(error) => {
                warn!(key = %self.key, revision, %error, "Save failed");
                SyncOutcome::Failed {
                    key: self.key,
                    revision,
                    error,
                }
            }
        };
        self.report(outcome);
    }

    async fn persist(&mut self, request: &SaveRequest) -> Result<Persisted, StoreError> {
        if let Some(id) = self.id.or(request.id) {
            let patch = wire::to_patch(&request.entry, request.changes, &self.shifts);
            match self.store.patch(id, patch).await {
                Ok(stored) => return Ok(Persisted::Patched(stored.id)),
                Err(StoreError::NotFound(_)) => {
                    // Removed behind our back; create it again.
                    debug!(key = %self.key, entry_id = id, "Entry vanished, recreating");
                    self.id = None;
                }
                Err(e) => return Err(e),
            }
        }

        match self.store.create(wire::to_new_entry(&request.entry, &self.shifts)).await {
            Ok(stored) => Ok(Persisted::Created(stored.id)),
            Err(StoreError::Conflict { existing }) => {
                let id = match existing {
                    Some(id) => id,
                    None => self.lookup_existing().await?,
                };
                warn!(key = %self.key, entry_id = id, "Create conflicted, updating existing entry");
                let patch = wire::to_patch(&request.entry, ChangeSet::ALL, &self.shifts);
                let stored = self.store.patch(id, patch).await?;
                Ok(Persisted::Resolved(stored.id))
            }
            Err(e) => Err(e),
        }
    }

    /// Find the row that made a create conflict. Lowest id wins.
    async fn lookup_existing(&self) -> Result<EntryId, StoreError> {
        let rows = self
            .store
            .list(self.key.resident_id, self.key.week_start.backend_anchor())
            .await?;
        rows.iter()
            .filter(|row| row.question_id == self.key.question_id)
            .map(|row| row.id)
            .min()
            .ok_or(StoreError::Conflict { existing: None })
    }

    fn report(&self, outcome: SyncOutcome) {
        // The ledger may already be gone.
        let _ = self.outcomes.send(outcome);
    }
}
