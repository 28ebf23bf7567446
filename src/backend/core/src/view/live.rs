//! The live overview task and its redraw scheduling.
//!
//! Redraws happen on these triggers:
//!
//! - a model change or an interval change marks the view dirty;
//! - a forced redraw timer, at `max(interval * factor, floor)`, marks it dirty;
//! - the render poll draws only when the view is dirty;
//! - resize and filter changes are debounced, then draw directly.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::ViewConfig;
use crate::error::{ErrorCode, JobscopeError, Result};
use crate::ingest::ModelStore;
use crate::timeline::{AnimationClock, LayoutParams, Scene, TimeInterval, TimelineLayoutEngine};

// =============================================================================
// Messages
// =============================================================================

/// A change to the live view's parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ViewCommand {
    Resize { width: u32 },
    Filter { text: String },
    Interval { interval: TimeInterval },
}

impl ViewCommand {
    /// Reject parameters the layout cannot draw.
    pub fn validate(&self) -> Result<()> {
        if let Self::Resize { width } = self {
            LayoutParams::checked_width(*width)?;
        }
        Ok(())
    }
}

/// One published scene with the animation that runs until the next one.
#[derive(Debug, Clone, Serialize)]
pub struct LiveFrame {
    /// Increases by one per published scene.
    pub generation: u64,
    /// Model revision the scene was computed from.
    pub revision: u64,
    pub scene: Arc<Scene>,
    pub animation: Arc<AnimationClock>,
}

const COMMAND_BUFFER: usize = 32;

// =============================================================================
// Task
// =============================================================================

/// The live overview task, before it is spawned.
pub struct LiveView {
    store: ModelStore,
    engine: TimelineLayoutEngine,
    clock: Arc<dyn Clock>,
    config: ViewConfig,
    params: LayoutParams,
    generation: u64,
}

impl LiveView {
    pub fn new(
        store: ModelStore,
        engine: TimelineLayoutEngine,
        clock: Arc<dyn Clock>,
        config: ViewConfig,
        params: LayoutParams,
    ) -> Self {
        Self {
            store,
            engine,
            clock,
            config,
            params,
            generation: 0,
        }
    }

    /// Start the task. It stops when `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> LiveViewHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (frames_tx, frames_rx) = watch::channel(None);

        let join = tokio::spawn(self.run(commands_rx, frames_tx, cancel.clone()));

        LiveViewHandle {
            client: LiveViewClient {
                commands: commands_tx,
                frames: frames_rx,
            },
            cancel,
            join,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<ViewCommand>,
        frames: watch::Sender<Option<Arc<LiveFrame>>>,
        cancel: CancellationToken,
    ) {
        let mut changes = self.store.subscribe();
        let mut changes_open = true;
        let mut commands_open = true;

        let mut poll = time::interval(self.config.render_poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut redraw = self.redraw_timer();

        let mut full_redraw = true;
        let mut resize_at: Option<Instant> = None;
        let mut filter_at: Option<Instant> = None;

        info!(interval = %self.params.interval, width = self.params.width, "Live view started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                _ = poll.tick() => {
                    if full_redraw {
                        full_redraw = false;
                        self.render(&frames);
                    }
                }

                _ = redraw.tick() => full_redraw = true,

                changed = changes.changed(), if changes_open => {
                    if changed.is_ok() {
                        full_redraw = true;
                    } else {
                        changes_open = false;
                    }
                }

                command = commands.recv(), if commands_open => match command {
                    Some(ViewCommand::Resize { width }) => {
                        self.params.width = width;
                        resize_at = Some(Instant::now() + self.config.resize_debounce);
                    }
                    Some(ViewCommand::Filter { text }) => {
                        self.params.filter = text;
                        filter_at = Some(Instant::now() + self.config.filter_debounce);
                    }
                    Some(ViewCommand::Interval { interval }) => {
                        self.params.interval = interval;
                        redraw = self.redraw_timer();
                        full_redraw = true;
                    }
                    None => commands_open = false,
                },

                _ = wait_until(resize_at) => {
                    resize_at = None;
                    self.render(&frames);
                }

                _ = wait_until(filter_at) => {
                    filter_at = None;
                    self.render(&frames);
                }
            }
        }

        info!(generation = self.generation, "Live view stopped");
    }

    fn redraw_timer(&self) -> time::Interval {
        let period = self.config.redraw_period(self.params.interval);
        let mut timer = time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    }

    /// Compute and publish a frame. Does nothing before the first snapshot.
    fn render(&mut self, frames: &watch::Sender<Option<Arc<LiveFrame>>>) {
        let revision = self.store.revision();
        let (engine, clock, params) = (&self.engine, &self.clock, &self.params);
        let scene = match self.store.read(|scheduler| {
            let now = clock.now_in(&scheduler.tz());
            engine.compute(scheduler, now, params)
        }) {
            Ok(scene) => scene,
            Err(_) => {
                debug!("Live view waiting for snapshot");
                return;
            }
        };

        self.generation += 1;
        let animation = AnimationClock::new(&scene, self.generation);
        debug!(
            generation = self.generation,
            revision,
            frames = animation.len(),
            "Live frame published"
        );

        frames.send_replace(Some(Arc::new(LiveFrame {
            generation: self.generation,
            revision,
            scene: Arc::new(scene),
            animation: Arc::new(animation),
        })));
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// =============================================================================
// Handles
// =============================================================================

/// Cloneable access to a running live view.
#[derive(Debug, Clone)]
pub struct LiveViewClient {
    commands: mpsc::Sender<ViewCommand>,
    frames: watch::Receiver<Option<Arc<LiveFrame>>>,
}

impl LiveViewClient {
    /// The newest published frame, if any.
    pub fn latest(&self) -> Option<Arc<LiveFrame>> {
        self.frames.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<LiveFrame>>> {
        self.frames.clone()
    }

    /// Queue a parameter change.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidViewport` for an out-of-range width and with
    /// `StreamClosed` once the task has stopped.
    pub async fn send(&self, command: ViewCommand) -> Result<()> {
        command.validate()?;
        self.commands
            .send(command)
            .await
            .map_err(|_| JobscopeError::new(ErrorCode::StreamClosed, "Live view has stopped"))
    }
}

/// Owner of a spawned live view.
#[derive(Debug)]
pub struct LiveViewHandle {
    client: LiveViewClient,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl LiveViewHandle {
    pub fn client(&self) -> LiveViewClient {
        self.client.clone()
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.join.await {
            tracing::warn!(error = %err, "Live view task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::{RawEvent, Snapshot};
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn spawn_view(store: &ModelStore, interval: TimeInterval) -> LiveViewHandle {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap());
        LiveView::new(
            store.clone(),
            TimelineLayoutEngine::default(),
            Arc::new(clock),
            ViewConfig::default(),
            LayoutParams::overview(1300, interval),
        )
        .spawn(CancellationToken::new())
    }

    async fn next_frame(frames: &mut watch::Receiver<Option<Arc<LiveFrame>>>) -> Arc<LiveFrame> {
        loop {
            frames.changed().await.unwrap();
            if let Some(frame) = frames.borrow_and_update().clone() {
                return frame;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_published_before_snapshot() {
        let store = ModelStore::new();
        let view = spawn_view(&store, TimeInterval::HOUR);

        time::sleep(Duration::from_secs(2)).await;
        assert!(view.client().latest().is_none());
        view.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_change_renders_on_next_poll() {
        let store = ModelStore::new();
        store.initialize(&Snapshot::default());
        let view = spawn_view(&store, TimeInterval::HOUR);
        let mut frames = view.client().subscribe();

        let first = next_frame(&mut frames).await;
        assert_eq!(first.generation, 1);

        let before = Instant::now();
        store.apply(&RawEvent::new("scheduler_paused", "2024-03-01 10:30:00"));
        let second = next_frame(&mut frames).await;
        assert_eq!(second.generation, 2);
        assert_eq!(second.revision, store.revision());
        assert!(Instant::now() - before <= Duration::from_millis(500));

        view.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_resize_is_debounced() {
        let store = ModelStore::new();
        store.initialize(&Snapshot::default());
        let view = spawn_view(&store, TimeInterval::HOUR);
        let client = view.client();
        let mut frames = client.subscribe();
        next_frame(&mut frames).await;

        client.send(ViewCommand::Resize { width: 800 }).await.unwrap();
        time::sleep(Duration::from_millis(50)).await;
        client.send(ViewCommand::Resize { width: 900 }).await.unwrap();
        let sent = Instant::now();

        let frame = next_frame(&mut frames).await;
        assert!(Instant::now() - sent >= Duration::from_millis(100));
        assert_eq!(frame.generation, 2);
        assert_eq!(frame.scene.intervals, 14);

        view.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_view_redraws_on_forced_timer() {
        let store = ModelStore::new();
        store.initialize(&Snapshot::default());
        let view = spawn_view(&store, TimeInterval::MINUTE);
        let mut frames = view.client().subscribe();
        next_frame(&mut frames).await;

        let start = Instant::now();
        let frame = next_frame(&mut frames).await;
        let waited = Instant::now() - start;
        assert_eq!(frame.generation, 2);
        assert!(waited >= Duration::from_secs(57));
        assert!(waited <= Duration::from_millis(57_500));

        view.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_marks_redraw() {
        let store = ModelStore::new();
        store.initialize(&Snapshot::default());
        let view = spawn_view(&store, TimeInterval::HOUR);
        let client = view.client();
        let mut frames = client.subscribe();
        next_frame(&mut frames).await;

        client
            .send(ViewCommand::Interval {
                interval: TimeInterval::MINUTE,
            })
            .await
            .unwrap();
        let frame = next_frame(&mut frames).await;
        assert_eq!(frame.scene.interval, TimeInterval::MINUTE);

        view.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_resize_is_rejected() {
        let store = ModelStore::new();
        store.initialize(&Snapshot::default());
        let view = spawn_view(&store, TimeInterval::HOUR);
        let client = view.client();
        let mut frames = client.subscribe();
        let first = next_frame(&mut frames).await;

        let command: ViewCommand =
            serde_json::from_str(r#"{"command": "resize", "width": 4000000000}"#).unwrap();
        let err = client.send(command).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidViewport);

        let err = client.send(ViewCommand::Resize { width: 0 }).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidViewport);

        client.send(ViewCommand::Resize { width: 640 }).await.unwrap();
        let frame = next_frame(&mut frames).await;
        assert_eq!(frame.generation, first.generation + 1);
        assert_eq!(frame.scene.width, 640);

        view.shutdown().await;
    }

    #[tokio::test]
    async fn test_send_after_shutdown_fails() {
        let store = ModelStore::new();
        let view = spawn_view(&store, TimeInterval::HOUR);
        let client = view.client();
        view.shutdown().await;

        let err = client
            .send(ViewCommand::Filter { text: "x".into() })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::StreamClosed);
    }
}
