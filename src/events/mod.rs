//! Typed publish/subscribe bus between the playback worker and its observers.
//!
//! Delivery is synchronous on the broadcasting thread. Listeners are keyed by
//! [`EventKind`]; a panicking listener is logged and skipped so the remaining
//! listeners still receive the event. There is no replay: a listener only sees
//! events broadcast after it was registered.

use log::{debug, error};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::models::Song;

/// Event categories listeners subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StartPlayback,
    ResumePlayback,
    PausePlayback,
    ProgressUpdate,
    DeleteCurrentSong,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::StartPlayback,
        EventKind::ResumePlayback,
        EventKind::PausePlayback,
        EventKind::ProgressUpdate,
        EventKind::DeleteCurrentSong,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::StartPlayback => "START_PLAYBACK",
            EventKind::ResumePlayback => "RESUME_PLAYBACK",
            EventKind::PausePlayback => "PAUSE_PLAYBACK",
            EventKind::ProgressUpdate => "PROGRESS_UPDATE",
            EventKind::DeleteCurrentSong => "DELETE_CURRENT_SONG",
        }
    }
}

/// Payload published on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    StartPlayback(Song),
    /// The song could not be opened; delivered to `StartPlayback` listeners
    StartPlaybackFailed { song: Song, reason: String },
    ResumePlayback(Song),
    PausePlayback(Song),
    ProgressUpdate { position_ms: u64 },
    DeleteCurrentSong(Song),
}

impl PlayerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlayerEvent::StartPlayback(_) | PlayerEvent::StartPlaybackFailed { .. } => {
                EventKind::StartPlayback
            }
            PlayerEvent::ResumePlayback(_) => EventKind::ResumePlayback,
            PlayerEvent::PausePlayback(_) => EventKind::PausePlayback,
            PlayerEvent::ProgressUpdate { .. } => EventKind::ProgressUpdate,
            PlayerEvent::DeleteCurrentSong(_) => EventKind::DeleteCurrentSong,
        }
    }

    pub fn song(&self) -> Option<&Song> {
        match self {
            PlayerEvent::StartPlayback(song)
            | PlayerEvent::ResumePlayback(song)
            | PlayerEvent::PausePlayback(song)
            | PlayerEvent::DeleteCurrentSong(song) => Some(song),
            PlayerEvent::StartPlaybackFailed { song, .. } => Some(song),
            PlayerEvent::ProgressUpdate { .. } => None,
        }
    }
}

pub type Listener = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

/// Handle returned by [`EventBus::register`], used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
}

/// Cheaply cloneable handle to a shared listener registry
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        debug!("Registered listener {:?} for {}", id, kind.as_str());
        id
    }

    /// Register one listener for every event kind
    pub fn register_all<F>(&self, listener: F) -> Vec<ListenerId>
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        EventKind::ALL
            .iter()
            .map(|kind| {
                let listener = listener.clone();
                self.register(*kind, move |event| listener(event))
            })
            .collect()
    }

    /// Returns false if the id was not registered
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut removed = false;
        for entries in listeners.values_mut() {
            let before = entries.len();
            entries.retain(|(entry_id, _)| *entry_id != id);
            removed |= entries.len() != before;
        }
        removed
    }

    /// Deliver `event` to every listener of its kind in registration order.
    /// Returns the number of listeners that handled it without panicking.
    pub fn broadcast(&self, event: PlayerEvent) -> usize {
        let kind = event.kind();
        // Snapshot so listeners may register or unregister while being called
        let snapshot: Vec<(ListenerId, Listener)> = {
            let listeners = self
                .inner
                .listeners
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match listeners.get(&kind) {
                Some(entries) => entries.clone(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for (id, listener) in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(()) => delivered += 1,
                Err(_) => error!("Listener {:?} panicked while handling {}", id, kind.as_str()),
            }
        }
        delivered
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&kind)
            .map_or(0, Vec::len)
    }
}
