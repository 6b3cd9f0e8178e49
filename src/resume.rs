use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::ResumeError;
use crate::models::{ResumePoint, SongId};

/// Persistence for the last playable position, written only by the playback worker
pub trait ResumeStore: Send {
    /// `None` when no song key is stored
    fn load(&self) -> Result<Option<ResumePoint>, ResumeError>;

    fn save(&mut self, point: ResumePoint) -> Result<(), ResumeError>;

    /// Forget the position but keep the song
    fn clear_progress(&mut self) -> Result<(), ResumeError>;

    /// Forget both the song and the position
    fn clear(&mut self) -> Result<(), ResumeError>;
}

/// On-disk layout; either key may be missing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ResumeRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    last_played_song_id: Option<SongId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_played_progress_ms: Option<u64>,
}

impl ResumeRecord {
    fn point(&self) -> Option<ResumePoint> {
        self.last_played_song_id
            .map(|song_id| ResumePoint::new(song_id, self.last_played_progress_ms.unwrap_or(0)))
    }
}

/// TOML-backed store
#[derive(Debug, Clone)]
pub struct FileResumeStore {
    path: PathBuf,
}

impl FileResumeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_record(&self) -> Result<ResumeRecord, ResumeError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(ResumeRecord::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_record(&self, record: &ResumeRecord) -> Result<(), ResumeError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(record)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl ResumeStore for FileResumeStore {
    fn load(&self) -> Result<Option<ResumePoint>, ResumeError> {
        let point = self.read_record()?.point();
        debug!("Loaded resume point {:?} from {}", point, self.path.display());
        Ok(point)
    }

    fn save(&mut self, point: ResumePoint) -> Result<(), ResumeError> {
        trace!("Saving resume point {:?}", point);
        self.write_record(&ResumeRecord {
            last_played_song_id: Some(point.song_id),
            last_played_progress_ms: Some(point.position_ms),
        })
    }

    fn clear_progress(&mut self) -> Result<(), ResumeError> {
        let mut record = self.read_record()?;
        if record.last_played_progress_ms.take().is_some() {
            self.write_record(&record)?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ResumeError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Volatile store; clones share the same record
#[derive(Debug, Clone, Default)]
pub struct MemoryResumeStore {
    record: Arc<Mutex<ResumeRecord>>,
}

impl MemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_point(point: ResumePoint) -> Self {
        let store = Self::new();
        *store.lock() = ResumeRecord {
            last_played_song_id: Some(point.song_id),
            last_played_progress_ms: Some(point.position_ms),
        };
        store
    }

    pub fn stored_song_id(&self) -> Option<SongId> {
        self.lock().last_played_song_id
    }

    pub fn stored_progress_ms(&self) -> Option<u64> {
        self.lock().last_played_progress_ms
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResumeRecord> {
        self.record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ResumeStore for MemoryResumeStore {
    fn load(&self) -> Result<Option<ResumePoint>, ResumeError> {
        Ok(self.lock().point())
    }

    fn save(&mut self, point: ResumePoint) -> Result<(), ResumeError> {
        let mut record = self.lock();
        record.last_played_song_id = Some(point.song_id);
        record.last_played_progress_ms = Some(point.position_ms);
        Ok(())
    }

    fn clear_progress(&mut self) -> Result<(), ResumeError> {
        self.lock().last_played_progress_ms = None;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ResumeError> {
        *self.lock() = ResumeRecord::default();
        Ok(())
    }
}
