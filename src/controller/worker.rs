use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::engine::{CompletionListener, MediaEngine};
use crate::error::{EngineError, PlayerError};
use crate::events::{EventBus, PlayerEvent};
use crate::library::SongRepository;
use crate::models::{PlayList, PlaybackState, ResumePoint, Song, SongId};
use crate::progress::{ProgressCache, ProgressSample};
use crate::resume::ResumeStore;

/// What readers outside the worker may see of the playback state
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub state: PlaybackState,
    /// Survives a stop so that `resume` can restart it
    pub current: Option<Song>,
    pub play_list: PlayList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Next,
    Prev,
}

/// Playback state owned by the queue worker. Every method runs on that worker.
pub struct PlayerCore {
    engine: Box<dyn MediaEngine>,
    library: Arc<dyn SongRepository>,
    resume: Box<dyn ResumeStore>,
    bus: EventBus,
    play_list: PlayList,
    state: PlaybackState,
    current: Option<Song>,
    /// Bumped whenever a song is started; stale completion notices carry an older value
    generation: Arc<AtomicU64>,
    status: Arc<Mutex<StatusSnapshot>>,
    progress: ProgressCache,
}

impl PlayerCore {
    pub(super) fn new(
        engine: Box<dyn MediaEngine>,
        library: Arc<dyn SongRepository>,
        resume: Box<dyn ResumeStore>,
        bus: EventBus,
        status: Arc<Mutex<StatusSnapshot>>,
        progress: ProgressCache,
    ) -> Self {
        Self {
            engine,
            library,
            resume,
            bus,
            play_list: PlayList::default(),
            state: PlaybackState::Idle,
            current: None,
            generation: Arc::new(AtomicU64::new(0)),
            status,
            progress,
        }
    }

    pub(super) fn generation(&self) -> Arc<AtomicU64> {
        self.generation.clone()
    }

    pub(super) fn install_completion_listener(&mut self, listener: CompletionListener) {
        self.engine.set_completion_listener(listener);
    }

    /// Copy the worker's view into the shared snapshot
    pub(super) fn publish_status(&self) {
        let mut status = self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        status.state = self.state.clone();
        status.current = self.current.clone();
        status.play_list = self.play_list.clone();
    }

    pub(super) fn set_play_list(&mut self, play_list: PlayList) {
        debug!("Play list replaced ({} songs)", play_list.len());
        self.play_list = play_list;
    }

    pub(super) fn play_song(&mut self, id: SongId, start_ms: u64) -> Result<(), PlayerError> {
        if let PlaybackState::Playing { song, .. } = &self.state {
            if song.id == id {
                debug!("Song {} is already playing", id);
                return Ok(());
            }
        }

        match self.library.song_by_id(id) {
            Some(song) => self.start_song(song, start_ms),
            None => {
                debug!("Ignoring play request for unknown song {}", id);
                Ok(())
            }
        }
    }

    pub(super) fn pause(&mut self) -> Result<(), PlayerError> {
        let song = match &self.state {
            PlaybackState::Playing { song, .. } => song.clone(),
            _ => return Ok(()),
        };

        self.engine.pause()?;
        let position_ms = self.engine.position_ms()?;
        self.progress.store(position_ms);
        self.state = PlaybackState::Paused {
            song: song.clone(),
            position_ms,
        };
        self.persist(ResumePoint::new(song.id, position_ms));
        self.bus.broadcast(PlayerEvent::PausePlayback(song));
        Ok(())
    }

    pub(super) fn resume(&mut self) -> Result<(), PlayerError> {
        match &self.state {
            PlaybackState::Paused { song, position_ms } => {
                let (song, position_ms) = (song.clone(), *position_ms);
                self.engine.play()?;
                self.state = PlaybackState::Playing {
                    song: song.clone(),
                    position_ms,
                };
                self.bus.broadcast(PlayerEvent::ResumePlayback(song));
                Ok(())
            }
            PlaybackState::Playing { .. } | PlaybackState::Preparing(_) => Ok(()),
            PlaybackState::Idle | PlaybackState::Stopped => match self.current.clone() {
                Some(song) => {
                    let start_ms = self
                        .stored_point()
                        .filter(|point| point.song_id == song.id)
                        .map_or(0, |point| point.position_ms);
                    self.start_song(song, start_ms)
                }
                None => self.resume_last_session(),
            },
        }
    }

    pub(super) fn play_next(&mut self) -> Result<(), PlayerError> {
        self.skip(Direction::Next)
    }

    pub(super) fn play_prev(&mut self) -> Result<(), PlayerError> {
        self.skip(Direction::Prev)
    }

    /// End of track reported by the engine. `generation` is the value observed
    /// when the notice was raised.
    pub(super) fn on_completion(&mut self, generation: u64) -> Result<(), PlayerError> {
        if generation != self.generation.load(Ordering::SeqCst) {
            debug!("Ignoring completion notice for an earlier song");
            return Ok(());
        }
        let song = match &self.state {
            PlaybackState::Playing { song, .. } => song.clone(),
            _ => return Ok(()),
        };

        match self.play_list.index_of(song.id) {
            Some(index) if !self.play_list.is_last(index) => {
                match self.play_list.get(index + 1).cloned() {
                    Some(next) => self.start_song(next, 0),
                    None => Ok(()),
                }
            }
            _ => {
                info!("Reached the end of the play list after '{}'", song.title);
                self.engine.stop()?;
                self.state = PlaybackState::Stopped;
                self.progress.store(0);
                if let Err(err) = self.resume.clear_progress() {
                    warn!("Failed to clear saved progress: {}", err);
                }
                self.bus.broadcast(PlayerEvent::PausePlayback(song));
                Ok(())
            }
        }
    }

    /// Stop playback and forget the current song and the saved resume point
    pub(super) fn discard_current_song(&mut self) -> Result<(), PlayerError> {
        let Some(song) = self.current.take() else {
            debug!("No current song to discard");
            return Ok(());
        };

        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state = PlaybackState::Stopped;
        self.progress.store(0);
        if let Err(err) = self.resume.clear() {
            warn!("Failed to clear resume point: {}", err);
        }
        self.engine.stop()?;
        self.bus.broadcast(PlayerEvent::DeleteCurrentSong(song));
        Ok(())
    }

    /// Read the engine position for the progress notifier
    pub(super) fn sample_progress(&mut self) -> Result<Option<ProgressSample>, PlayerError> {
        let song = match &self.state {
            PlaybackState::Playing { song, .. } => song.clone(),
            _ => return Ok(None),
        };

        let position_ms = self.engine.position_ms()?;
        self.state = PlaybackState::Playing {
            song: song.clone(),
            position_ms,
        };
        self.persist(ResumePoint::new(song.id, position_ms));
        Ok(Some(ProgressSample { song, position_ms }))
    }

    /// Resolve the saved resume point, dropping it when its song no longer exists
    pub(super) fn resumable_song(&mut self) -> Option<(Song, u64)> {
        let point = self.stored_point()?;
        match self.library.song_by_id(point.song_id) {
            Some(song) => Some((song, point.position_ms)),
            None => {
                info!("Saved song {} no longer exists; forgetting it", point.song_id);
                if let Err(err) = self.resume.clear() {
                    warn!("Failed to clear resume point: {}", err);
                }
                None
            }
        }
    }

    /// Record where playback stands so the next session can pick it up
    pub(super) fn save_session(&mut self) {
        let point = match &self.state {
            PlaybackState::Playing { song, position_ms } => {
                let position_ms = match self.engine.position_ms() {
                    Ok(position_ms) => position_ms,
                    Err(err) => {
                        warn!("Cannot read position at session end: {}", err);
                        *position_ms
                    }
                };
                ResumePoint::new(song.id, position_ms)
            }
            PlaybackState::Paused { song, position_ms } => ResumePoint::new(song.id, *position_ms),
            _ => return,
        };
        debug!("Saving session at song {} {}ms", point.song_id, point.position_ms);
        self.persist(point);
    }

    /// Called after a task failed: make sure nothing is left half-started
    pub(super) fn recover(&mut self, err: &PlayerError) {
        warn!("Stopping playback after failure: {}", err.user_message());
        if let Err(stop_err) = self.engine.stop() {
            debug!("Engine stop during recovery failed: {}", stop_err);
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state = PlaybackState::Stopped;
        self.publish_status();
    }

    fn skip(&mut self, direction: Direction) -> Result<(), PlayerError> {
        let anchor = self
            .current
            .as_ref()
            .map(|song| song.id)
            .or_else(|| self.stored_point().map(|point| point.song_id));

        let index = match direction {
            Direction::Next => self.play_list.next_index(anchor),
            Direction::Prev => self.play_list.prev_index(anchor),
        };

        match index.and_then(|index| self.play_list.get(index).cloned()) {
            Some(song) => self.start_song(song, 0),
            None => {
                debug!("Play list is empty; nothing to skip to");
                Ok(())
            }
        }
    }

    fn resume_last_session(&mut self) -> Result<(), PlayerError> {
        match self.resumable_song() {
            Some((song, position_ms)) => {
                info!("Resuming '{}' at {}ms", song.title, position_ms);
                self.start_song(song, position_ms)
            }
            None => {
                debug!("Nothing to resume");
                Ok(())
            }
        }
    }

    fn start_song(&mut self, song: Song, start_ms: u64) -> Result<(), PlayerError> {
        if matches!(
            self.state,
            PlaybackState::Playing { .. } | PlaybackState::Paused { .. } | PlaybackState::Preparing(_)
        ) {
            self.engine.stop()?;
        }

        self.generation.fetch_add(1, Ordering::SeqCst);
        self.current = Some(song.clone());
        self.progress.store(start_ms);
        self.state = PlaybackState::Preparing(song.clone());

        if let Err(err) = self.engine.load(&song.file_path) {
            return match err {
                EngineError::Load { .. } => {
                    warn!("Cannot start '{}': {}", song.title, err);
                    self.current = None;
                    self.progress.store(0);
                    self.state = PlaybackState::Idle;
                    self.bus.broadcast(PlayerEvent::StartPlaybackFailed {
                        song,
                        reason: err.to_string(),
                    });
                    Ok(())
                }
                EngineError::Fault(_) => Err(err.into()),
            };
        }

        self.engine.seek(start_ms)?;
        self.engine.play()?;
        self.state = PlaybackState::Playing {
            song: song.clone(),
            position_ms: start_ms,
        };
        self.persist(ResumePoint::new(song.id, start_ms));
        info!("Playing '{}' by {}", song.title, song.artist_name());
        self.bus.broadcast(PlayerEvent::StartPlayback(song));
        Ok(())
    }

    fn stored_point(&self) -> Option<ResumePoint> {
        match self.resume.load() {
            Ok(point) => point,
            Err(err) => {
                warn!("Cannot read resume point: {}", err);
                None
            }
        }
    }

    fn persist(&mut self, point: ResumePoint) {
        if let Err(err) = self.resume.save(point) {
            warn!("Failed to save resume point: {}", err);
        }
    }
}
