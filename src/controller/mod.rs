//! Public command surface of the player.
//!
//! Every command is queued onto the [`PlayQueue`] worker that owns the engine
//! and the playback state, so callers on any thread return immediately and the
//! engine only ever sees one operation at a time. Read accessors use a snapshot
//! published by the worker after each command.

mod worker;

pub use self::worker::{PlayerCore, StatusSnapshot};

use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::config::PlayerConfig;
use crate::engine::{CompletionListener, MediaEngine};
use crate::error::{PlayerError, QueueError};
use crate::events::EventBus;
use crate::library::SongRepository;
use crate::models::{PlayList, PlaybackState, Song, SongId};
use crate::progress::{ProgressCache, ProgressSample, ProgressSource};
use crate::queue::{PlayQueue, QueueHandle, QueueSettings};
use crate::resume::ResumeStore;

/// The subset of commands that interruption and button handlers need
pub trait PlaybackCommands: Send + Sync {
    fn is_playing(&self) -> bool;
    fn pause(&self);
    fn resume(&self);
    fn play_next(&self);
}

struct ControllerInner {
    queue: PlayQueue<PlayerCore>,
    session_saved: AtomicBool,
    status: Arc<Mutex<StatusSnapshot>>,
    progress: ProgressCache,
}

/// Cloneable handle to the playback worker
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<ControllerInner>,
}

impl PlaybackController {
    pub fn new(
        config: &PlayerConfig,
        engine: Box<dyn MediaEngine>,
        library: Arc<dyn SongRepository>,
        resume: Box<dyn ResumeStore>,
        bus: EventBus,
    ) -> Result<Self, PlayerError> {
        let status = Arc::new(Mutex::new(StatusSnapshot::default()));
        let progress = ProgressCache::new();
        let core = PlayerCore::new(engine, library, resume, bus, status.clone(), progress.clone());
        let generation = core.generation();

        let settings = QueueSettings {
            name: "play-queue".to_string(),
            capacity: config.queue_capacity,
            slow_task_threshold: Duration::from_millis(config.slow_task_threshold_ms),
        };
        let queue = PlayQueue::spawn(settings, core, |core: &mut PlayerCore, err: &PlayerError| {
            core.recover(err)
        })?;

        // The engine reports completion on its own thread; route it through the queue
        let handle: QueueHandle<PlayerCore> = queue.handle();
        let listener: CompletionListener = Arc::new(move || {
            let raised_for = generation.load(Ordering::SeqCst);
            if let Err(err) = handle.submit(move |core: &mut PlayerCore| {
                let result = core.on_completion(raised_for);
                core.publish_status();
                result
            }) {
                warn!("Dropped end-of-track notice: {}", err);
            }
        });
        queue.submit(move |core: &mut PlayerCore| {
            core.install_completion_listener(listener);
            Ok(())
        })?;

        info!("Playback controller started (queue capacity {})", config.queue_capacity);

        Ok(Self {
            inner: Arc::new(ControllerInner {
                queue,
                session_saved: AtomicBool::new(false),
                status,
                progress,
            }),
        })
    }

    /// Play `id` from `start_ms`. Unknown ids are ignored.
    pub fn play_song(&self, id: SongId, start_ms: u64) -> Result<(), QueueError> {
        // Readers see the requested position before the worker gets to it
        self.inner.progress.store(start_ms);
        self.dispatch("play", move |core| core.play_song(id, start_ms))
    }

    pub fn pause(&self) -> Result<(), QueueError> {
        self.dispatch("pause", |core| core.pause())
    }

    pub fn resume(&self) -> Result<(), QueueError> {
        self.dispatch("resume", |core| core.resume())
    }

    pub fn play_next(&self) -> Result<(), QueueError> {
        self.dispatch("next", |core| core.play_next())
    }

    pub fn play_prev(&self) -> Result<(), QueueError> {
        self.dispatch("prev", |core| core.play_prev())
    }

    /// Stop playback and forget the current song, e.g. after it was deleted
    pub fn discard_current_song(&self) -> Result<(), QueueError> {
        self.dispatch("discard", |core| core.discard_current_song())
    }

    pub fn set_play_list(&self, play_list: PlayList) -> Result<(), QueueError> {
        self.dispatch("set play list", move |core| {
            core.set_play_list(play_list);
            Ok(())
        })
    }

    pub fn current_song(&self) -> Option<Song> {
        self.snapshot().current
    }

    pub fn is_playing(&self) -> bool {
        self.lock_status().state.is_playing()
    }

    /// Last known position in milliseconds
    pub fn playing_progress(&self) -> u64 {
        self.inner.progress.load()
    }

    pub fn state(&self) -> PlaybackState {
        self.snapshot().state
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock_status().clone()
    }

    pub fn progress_cache(&self) -> ProgressCache {
        self.inner.progress.clone()
    }

    /// The saved song and position, if the song still exists. Blocks until the
    /// worker answers; do not call from an event listener.
    pub fn resumable_song(&self, timeout: Duration) -> Result<Option<(Song, u64)>, QueueError> {
        self.query(timeout, |core| core.resumable_song())
    }

    /// Wait until every command queued so far has run
    pub fn flush(&self, timeout: Duration) -> Result<(), QueueError> {
        self.query(timeout, |_| ())
    }

    /// Number of commands dropped because the queue was full
    pub fn dropped_commands(&self) -> u64 {
        self.inner.queue.handle().dropped_count()
    }

    /// Save the session, stop accepting commands and wait for the worker to
    /// finish. Idempotent.
    pub fn shutdown(&self) {
        if !self.inner.session_saved.swap(true, Ordering::SeqCst) {
            let saved = self.inner.queue.submit(|core: &mut PlayerCore| {
                core.save_session();
                Ok(())
            });
            if let Err(err) = saved {
                warn!("Could not save the session before shutdown: {}", err);
            }
        }
        self.inner.queue.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        !self.inner.queue.is_running()
    }

    fn dispatch<F>(&self, command: &'static str, task: F) -> Result<(), QueueError>
    where
        F: FnOnce(&mut PlayerCore) -> Result<(), PlayerError> + Send + 'static,
    {
        let result = self.inner.queue.submit(move |core: &mut PlayerCore| {
            let result = task(core);
            core.publish_status();
            result
        });
        if let Err(err) = &result {
            match err {
                QueueError::Full { .. } => warn!("Dropped '{}' command: {}", command, err),
                _ => info!("Ignored '{}' command: {}", command, err),
            }
        }
        result
    }

    fn query<T, F>(&self, timeout: Duration, f: F) -> Result<T, QueueError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PlayerCore) -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        self.inner.queue.submit(move |core: &mut PlayerCore| {
            let _ = tx.send(f(core));
            Ok(())
        })?;
        rx.recv_timeout(timeout).map_err(|err| match err {
            mpsc::RecvTimeoutError::Timeout => QueueError::Timeout {
                waited_ms: timeout.as_millis() as u64,
            },
            mpsc::RecvTimeoutError::Disconnected => QueueError::ShutDown,
        })
    }

    fn lock_status(&self) -> std::sync::MutexGuard<'_, StatusSnapshot> {
        self.inner
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PlaybackCommands for PlaybackController {
    fn is_playing(&self) -> bool {
        PlaybackController::is_playing(self)
    }

    fn pause(&self) {
        let _ = PlaybackController::pause(self);
    }

    fn resume(&self) {
        let _ = PlaybackController::resume(self);
    }

    fn play_next(&self) {
        let _ = PlaybackController::play_next(self);
    }
}

impl ProgressSource for PlaybackController {
    fn is_playing(&self) -> bool {
        PlaybackController::is_playing(self)
    }

    fn sample(&self) -> Option<oneshot::Receiver<Option<ProgressSample>>> {
        let (tx, rx) = oneshot::channel();
        let submitted = self.inner.queue.submit(move |core: &mut PlayerCore| {
            let sample = core.sample_progress();
            core.publish_status();
            let _ = tx.send(sample.as_ref().ok().cloned().flatten());
            sample.map(|_| ())
        });
        submitted.ok().map(|()| rx)
    }
}
