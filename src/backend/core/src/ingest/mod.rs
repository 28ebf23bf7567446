//! Scheduler stream ingestion.
//!
//! - **`message`**: the tagged transport envelope.
//! - **`source`**: the [`EventSource`] trait with JSON-lines and channel sources.
//! - **`store`**: the shared [`ModelStore`] the ingestor writes to.
//!
//! The [`Ingestor`] is the single writer of the model: it pulls messages in
//! delivery order and applies them one at a time.

pub mod message;
pub mod source;
pub mod store;

pub use message::StreamMessage;
pub use source::{ChannelSource, EventSource, JsonLinesSource};
pub use store::ModelStore;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Result;
use crate::model::{ApplyOutcome, ReplaySummary};
use crate::telemetry::metrics::EventMetrics;

/// Counts for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub messages: u64,
    pub sessions: u64,
    pub events: ReplaySummary,
}

/// Pulls messages from a source into a [`ModelStore`].
#[derive(Debug, Clone)]
pub struct Ingestor {
    store: ModelStore,
}

impl Ingestor {
    pub fn new(store: ModelStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Apply one message. Returns the event outcome, or `None` for a snapshot.
    pub fn handle(&self, message: &StreamMessage) -> Option<ApplyOutcome> {
        match message {
            StreamMessage::InitJobs(snapshot) => {
                self.store.initialize(snapshot);
                None
            }
            other => {
                let event = other.event()?;
                let outcome = self.store.apply(event);
                debug!(
                    message = other.type_name(),
                    kind = %event.kind,
                    outcome = outcome.label(),
                    "Stream event processed"
                );
                Some(outcome)
            }
        }
    }

    /// Consume `source` until it ends or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns the source's I/O error; messages that fail to decode or apply
    /// never end the run.
    pub async fn run<S>(&self, mut source: S, cancel: CancellationToken) -> Result<IngestSummary>
    where
        S: EventSource,
    {
        let mut summary = IngestSummary::default();
        info!("Ingestor started");

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Ingestor cancelled");
                    break;
                }
                next = source.next_message() => next?,
            };

            let Some(message) = next else {
                info!("Event source exhausted");
                break;
            };

            summary.messages += 1;
            match self.handle(&message) {
                Some(outcome) => summary.events.record(&outcome),
                None => summary.sessions += 1,
            }
        }

        if let Ok(jobs) = self.store.read(|scheduler| scheduler.jobs.len()) {
            EventMetrics::set_jobs_tracked(jobs);
        }
        info!(
            messages = summary.messages,
            sessions = summary.sessions,
            events = summary.events.total(),
            applied = summary.events.applied,
            ignored = summary.events.ignored,
            "Ingestor stopped"
        );
        Ok(summary)
    }

    /// Run on a background task.
    pub fn spawn<S>(self, source: S, cancel: CancellationToken) -> JoinHandle<Result<IngestSummary>>
    where
        S: EventSource + 'static,
    {
        tokio::spawn(async move { self.run(source, cancel).await })
    }
}
