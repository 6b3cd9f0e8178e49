//! Fakes shared by unit and integration tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::config::PlayerConfig;
use crate::controller::{PlaybackCommands, PlaybackController};
use crate::engine::{CompletionListener, MediaEngine};
use crate::error::EngineError;
use crate::events::{EventBus, PlayerEvent};
use crate::library::Library;
use crate::models::{PlayList, ResumePoint, Song, SongId};
use crate::resume::MemoryResumeStore;

pub fn song(id: SongId) -> Song {
    Song::new(
        id,
        format!("Song {}", id),
        "Artist",
        "Album",
        180_000,
        format!("/music/{}.flac", id),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Load(PathBuf),
    Play,
    Pause,
    Stop,
    Seek(u64),
    Position,
}

#[derive(Default)]
struct ProbeState {
    calls: Mutex<Vec<EngineCall>>,
    in_flight: AtomicBool,
    overlaps: AtomicUsize,
    position: AtomicU64,
    failing_paths: Mutex<HashSet<PathBuf>>,
    fault_on_play: AtomicBool,
    call_delay_ms: AtomicU64,
    listener: Mutex<Option<CompletionListener>>,
}

/// Test-side view of a [`RecordingEngine`]
#[derive(Clone, Default)]
pub struct EngineProbe {
    state: Arc<ProbeState>,
}

impl EngineProbe {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Calls other than position reads
    pub fn transport_calls(&self) -> Vec<EngineCall> {
        self.calls()
            .into_iter()
            .filter(|call| *call != EngineCall::Position)
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    /// Paths loaded so far, in order
    pub fn loaded(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Load(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Number of times a call started while another was still running
    pub fn overlaps(&self) -> usize {
        self.state.overlaps.load(Ordering::SeqCst)
    }

    pub fn set_position(&self, position_ms: u64) {
        self.state.position.store(position_ms, Ordering::SeqCst);
    }

    pub fn fail_load(&self, path: impl Into<PathBuf>) {
        self.state.failing_paths.lock().unwrap().insert(path.into());
    }

    pub fn fault_on_play(&self, fault: bool) {
        self.state.fault_on_play.store(fault, Ordering::SeqCst);
    }

    /// Make every engine call take this long
    pub fn set_call_delay(&self, delay: Duration) {
        self.state
            .call_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Raise end-of-track as the engine would
    pub fn complete(&self) {
        let listener = self.state.listener.lock().unwrap().clone();
        if let Some(listener) = listener {
            listener();
        }
    }

    pub fn has_listener(&self) -> bool {
        self.state.listener.lock().unwrap().is_some()
    }
}

/// Engine that records every call and detects overlapping calls
pub struct RecordingEngine {
    probe: EngineProbe,
}

impl RecordingEngine {
    pub fn new() -> (Self, EngineProbe) {
        let probe = EngineProbe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }

    fn record<T>(&self, call: EngineCall, f: impl FnOnce(&ProbeState) -> T) -> T {
        let state = &self.probe.state;
        if state.in_flight.swap(true, Ordering::SeqCst) {
            state.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        state.calls.lock().unwrap().push(call);

        let delay = state.call_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }

        let result = f(state);
        state.in_flight.store(false, Ordering::SeqCst);
        result
    }
}

impl MediaEngine for RecordingEngine {
    fn load(&mut self, path: &Path) -> Result<(), EngineError> {
        self.record(EngineCall::Load(path.to_path_buf()), |state| {
            if state.failing_paths.lock().unwrap().contains(path) {
                Err(EngineError::Load {
                    path: path.display().to_string(),
                    reason: "unsupported codec".to_string(),
                })
            } else {
                state.position.store(0, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn play(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::Play, |state| {
            if state.fault_on_play.load(Ordering::SeqCst) {
                Err(EngineError::Fault("output device vanished".to_string()))
            } else {
                Ok(())
            }
        })
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::Pause, |_| Ok(()))
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::Stop, |_| Ok(()))
    }

    fn seek(&mut self, position_ms: u64) -> Result<(), EngineError> {
        self.record(EngineCall::Seek(position_ms), |state| {
            state.position.store(position_ms, Ordering::SeqCst);
            Ok(())
        })
    }

    fn position_ms(&self) -> Result<u64, EngineError> {
        self.record(EngineCall::Position, |state| {
            Ok(state.position.load(Ordering::SeqCst))
        })
    }

    fn set_completion_listener(&mut self, listener: CompletionListener) {
        *self.probe.state.listener.lock().unwrap() = Some(listener);
    }
}

/// A controller over `song(1)..=song(n)` with a recording engine and an
/// in-memory resume store. Every bus event is collected.
pub struct Harness {
    pub controller: PlaybackController,
    pub probe: EngineProbe,
    pub resume: MemoryResumeStore,
    pub bus: EventBus,
    pub library: Arc<Library>,
    events: Arc<Mutex<Vec<PlayerEvent>>>,
}

impl Harness {
    pub fn new(songs: u64) -> Self {
        Self::build(songs, MemoryResumeStore::new(), PlayerConfig::default())
    }

    pub fn with_resume_point(songs: u64, point: ResumePoint) -> Self {
        Self::build(songs, MemoryResumeStore::with_point(point), PlayerConfig::default())
    }

    pub fn with_config(songs: u64, config: PlayerConfig) -> Self {
        Self::build(songs, MemoryResumeStore::new(), config)
    }

    fn build(songs: u64, resume: MemoryResumeStore, config: PlayerConfig) -> Self {
        let library = Arc::new(Library::new());
        for id in 1..=songs {
            library.add_song(song(id)).unwrap();
        }

        let bus = EventBus::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        bus.register_all(move |event| events_clone.lock().unwrap().push(event.clone()));

        let (engine, probe) = RecordingEngine::new();
        let controller = PlaybackController::new(
            &config,
            Box::new(engine),
            library.clone(),
            Box::new(resume.clone()),
            bus.clone(),
        )
        .unwrap();
        controller.set_play_list(library.play_list()).unwrap();
        controller.flush(Duration::from_secs(2)).unwrap();

        Self {
            controller,
            probe,
            resume,
            bus,
            library,
            events,
        }
    }

    /// Events other than progress updates, in delivery order
    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| !matches!(event, PlayerEvent::ProgressUpdate { .. }))
            .cloned()
            .collect()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn flush(&self) {
        self.controller.flush(Duration::from_secs(2)).unwrap();
    }

    /// Play `id` and wait for it to start
    pub fn play(&self, id: SongId) {
        self.controller.play_song(id, 0).unwrap();
        self.flush();
    }

    pub fn play_list(&self) -> PlayList {
        self.library.play_list()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.controller.shutdown();
    }
}

/// Command sink that records what the handlers asked for
#[derive(Default)]
pub struct FakeCommands {
    playing: AtomicBool,
    log: Mutex<Vec<&'static str>>,
}

impl FakeCommands {
    pub fn playing() -> Self {
        let commands = Self::default();
        commands.playing.store(true, Ordering::SeqCst);
        commands
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::SeqCst);
    }

    pub fn log(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().clone()
    }
}

impl PlaybackCommands for FakeCommands {
    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn pause(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.log.lock().unwrap().push("pause");
    }

    fn resume(&self) {
        self.playing.store(true, Ordering::SeqCst);
        self.log.lock().unwrap().push("resume");
    }

    fn play_next(&self) {
        self.playing.store(true, Ordering::SeqCst);
        self.log.lock().unwrap().push("next");
    }
}
