use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Stable identifier of a song in the library
pub type SongId = u64;

/// A playable song as handed out by the library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Track length in milliseconds
    pub duration_ms: u64,
    pub file_path: PathBuf,
}

impl Song {
    pub fn new(
        id: SongId,
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
        duration_ms: u64,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
            duration_ms,
            file_path: file_path.into(),
        }
    }

    /// Get the artist name or "Unknown Artist"
    pub fn artist_name(&self) -> &str {
        if self.artist.trim().is_empty() {
            "Unknown Artist"
        } else {
            &self.artist
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Album {
    pub id: u64,
    pub title: String,
    pub artist: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artist {
    pub id: u64,
    pub name: String,
}

/// Ordered songs of a listening session. Cloning shares the underlying list;
/// a play list is replaced as a whole, never edited while playback runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayList {
    songs: Arc<Vec<Song>>,
}

impl PlayList {
    pub fn new(songs: Vec<Song>) -> Self {
        Self {
            songs: Arc::new(songs),
        }
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Song> {
        self.songs.get(index)
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    /// Index of the song with the given id, if it is in the list
    pub fn index_of(&self, id: SongId) -> Option<usize> {
        self.songs.iter().position(|song| song.id == id)
    }

    pub fn is_last(&self, index: usize) -> bool {
        !self.songs.is_empty() && index == self.songs.len() - 1
    }

    /// Index after `anchor`, wrapping to the first song. An anchor that is not
    /// in the list starts from the first song.
    pub fn next_index(&self, anchor: Option<SongId>) -> Option<usize> {
        if self.songs.is_empty() {
            return None;
        }
        match anchor.and_then(|id| self.index_of(id)) {
            Some(index) => Some((index + 1) % self.songs.len()),
            None => Some(0),
        }
    }

    /// Index before `anchor`, wrapping to the last song. An anchor that is not
    /// in the list starts from the first song.
    pub fn prev_index(&self, anchor: Option<SongId>) -> Option<usize> {
        if self.songs.is_empty() {
            return None;
        }
        match anchor.and_then(|id| self.index_of(id)) {
            Some(0) => Some(self.songs.len() - 1),
            Some(index) => Some(index - 1),
            None => Some(0),
        }
    }
}

/// Playback state owned by the controller worker
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Preparing(Song),
    Playing { song: Song, position_ms: u64 },
    Paused { song: Song, position_ms: u64 },
    Stopped,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing { .. })
    }

    pub fn song(&self) -> Option<&Song> {
        match self {
            PlaybackState::Preparing(song) => Some(song),
            PlaybackState::Playing { song, .. } | PlaybackState::Paused { song, .. } => Some(song),
            PlaybackState::Idle | PlaybackState::Stopped => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "IDLE",
            PlaybackState::Preparing(_) => "PREPARING",
            PlaybackState::Playing { .. } => "PLAYING",
            PlaybackState::Paused { .. } => "PAUSED",
            PlaybackState::Stopped => "STOPPED",
        }
    }
}

/// Last known playable position, kept across restarts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePoint {
    pub song_id: SongId,
    pub position_ms: u64,
}

impl ResumePoint {
    pub fn new(song_id: SongId, position_ms: u64) -> Self {
        Self {
            song_id,
            position_ms,
        }
    }
}

/// Derived view rendered by the notification sink on every tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    pub title: String,
    pub artist_label: String,
    pub position_label: String,
}

impl NotificationPayload {
    pub fn new(song: &Song, position_ms: u64) -> Self {
        Self {
            title: song.title.clone(),
            artist_label: song.artist_name().to_string(),
            position_label: format_millis(position_ms),
        }
    }

    /// "title(artist)" as shown in the notification header
    pub fn headline(&self) -> String {
        format!("{}({})", self.title, self.artist_label)
    }
}

/// Format milliseconds as `mm:ss`, or `h:mm:ss` past one hour
pub fn format_millis(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
