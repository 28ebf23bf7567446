//! Shared, session-scoped home of the scheduler model.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{JobscopeError, Result};
use crate::model::{ApplyOutcome, IgnoreReason, RawEvent, SchedulerAggregate, Snapshot};
use crate::telemetry::metrics::EventMetrics;

/// The scheduler model plus a change counter.
///
/// The ingestor is the only writer. Readers take short read locks and never
/// hold them across an `.await`. Every mutation bumps the revision published
/// on a `watch` channel so views can recompute.
#[derive(Clone)]
pub struct ModelStore {
    model: Arc<RwLock<Option<SchedulerAggregate>>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStore")
            .field("initialized", &self.is_initialized())
            .field("revision", &self.revision())
            .finish()
    }
}

impl ModelStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            model: Arc::new(RwLock::new(None)),
            revision: Arc::new(revision),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.model.read().is_some()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Receiver notified after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Run `f` against the current model.
    ///
    /// # Errors
    ///
    /// Fails with `SessionNotInitialized` before the first snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&SchedulerAggregate) -> T) -> Result<T> {
        let guard = self.model.read();
        guard.as_ref().map(f).ok_or_else(JobscopeError::not_initialized)
    }

    /// Start a new session from `snapshot`, replacing any previous one.
    pub fn initialize(&self, snapshot: &Snapshot) -> Uuid {
        let scheduler = SchedulerAggregate::initialize(snapshot);
        let session_id = scheduler.session_id;

        let previous = self.model.write().replace(scheduler);
        if let Some(previous) = previous {
            info!(
                previous = %previous.session_id,
                session_id = %session_id,
                "Session re-initialized from new snapshot"
            );
        }

        self.bump();
        session_id
    }

    /// Apply one wire event to the current session.
    pub fn apply(&self, event: &RawEvent) -> ApplyOutcome {
        let outcome = {
            let mut guard = self.model.write();
            match guard.as_mut() {
                Some(scheduler) => scheduler.apply_raw(event),
                None => {
                    debug!(kind = %event.kind, "Event received before snapshot");
                    let reason = IgnoreReason::NotInitialized {
                        kind: event.kind.clone(),
                    };
                    EventMetrics::record_dropped(reason.label());
                    ApplyOutcome::ignored(reason)
                }
            }
        };

        if outcome.mutated() {
            self.bump();
        }
        outcome
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}
