//! Periodic progress sampling.
//!
//! The notifier runs as a tokio task. On every tick it asks its
//! [`ProgressSource`] for a sample; the source reads the engine on the playback
//! worker and answers through a oneshot channel, so the engine is never touched
//! from the timer. Each answer is cached, published as a `ProgressUpdate` and
//! rendered to the [`PlaybackObserver`].

use log::{debug, info, trace};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::events::{EventBus, PlayerEvent};
use crate::models::{NotificationPayload, Song};

/// Last known playback position, readable from any thread
#[derive(Debug, Clone, Default)]
pub struct ProgressCache(Arc<AtomicU64>);

impl ProgressCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn store(&self, position_ms: u64) {
        self.0.store(position_ms, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSample {
    pub song: Song,
    pub position_ms: u64,
}

/// Something that can be asked for the current playback position
pub trait ProgressSource: Send + Sync + 'static {
    fn is_playing(&self) -> bool;

    /// Request a sample. `None` when the request could not be queued; the
    /// receiver yields `None` when playback stopped before the request ran.
    fn sample(&self) -> Option<oneshot::Receiver<Option<ProgressSample>>>;
}

/// Notification sink. Called from the notifier task; must return quickly.
pub trait PlaybackObserver: Send + Sync {
    fn on_progress(&self, payload: &NotificationPayload);
}

/// Observer that writes each update to the log
#[derive(Debug, Default)]
pub struct LogObserver;

impl PlaybackObserver for LogObserver {
    fn on_progress(&self, payload: &NotificationPayload) {
        info!("{} {}", payload.headline(), payload.position_label);
    }
}

struct TickContext<P> {
    source: P,
    bus: EventBus,
    cache: ProgressCache,
    observer: Arc<dyn PlaybackObserver>,
}

pub struct ProgressNotifier<P> {
    context: Arc<TickContext<P>>,
    period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<P: ProgressSource> ProgressNotifier<P> {
    pub fn new(
        period: Duration,
        source: P,
        bus: EventBus,
        cache: ProgressCache,
        observer: Arc<dyn PlaybackObserver>,
    ) -> Self {
        Self {
            context: Arc::new(TickContext {
                source,
                bus,
                cache,
                observer,
            }),
            period,
            task: Mutex::new(None),
        }
    }

    /// Begin ticking on `runtime`. A notifier that is already running is left alone.
    pub fn start(&self, runtime: &Handle) {
        let mut task = self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if task.is_some() {
            return;
        }

        let context = self.context.clone();
        let period = self.period;
        *task = Some(runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                tick(&context).await;
            }
        }));
        debug!("Progress notifier started ({}ms)", period.as_millis());
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    /// Cancel the timer. Safe before `start` and when called repeatedly.
    pub fn stop(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
            debug!("Progress notifier stopped");
        }
    }
}

impl<P> Drop for ProgressNotifier<P> {
    fn drop(&mut self) {
        if let Some(task) = self
            .task
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            task.abort();
        }
    }
}

/// One notifier tick. Returns true when an update was published.
async fn tick<P: ProgressSource>(context: &TickContext<P>) -> bool {
    if !context.source.is_playing() {
        return false;
    }

    let Some(reply) = context.source.sample() else {
        trace!("Progress sample could not be queued; skipping tick");
        return false;
    };

    match reply.await {
        Ok(Some(sample)) => {
            context.cache.store(sample.position_ms);
            context.bus.broadcast(PlayerEvent::ProgressUpdate {
                position_ms: sample.position_ms,
            });
            context
                .observer
                .on_progress(&NotificationPayload::new(&sample.song, sample.position_ms));
            true
        }
        Ok(None) => false,
        Err(_) => {
            trace!("Progress sample was dropped before it ran");
            false
        }
    }
}
