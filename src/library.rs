use log::{debug, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use crate::error::LibraryError;
use crate::models::{Album, Artist, PlayList, Song, SongId};

/// Read side of the song store used by the playback core
pub trait SongRepository: Send + Sync {
    fn song_by_id(&self, id: SongId) -> Option<Song>;
}

#[derive(Debug, Default, Deserialize)]
struct LibraryFile {
    #[serde(default)]
    songs: Vec<Song>,
    #[serde(default)]
    albums: Vec<Album>,
    #[serde(default)]
    artists: Vec<Artist>,
}

#[derive(Debug, Default)]
struct Catalog {
    songs: Vec<Song>,
    index: HashMap<SongId, usize>,
    albums: Vec<Album>,
    artists: Vec<Artist>,
}

/// In-memory song library, safe to share between the front end and the worker
#[derive(Debug, Default)]
pub struct Library {
    catalog: RwLock<Catalog>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a library file containing `[[songs]]`, `[[albums]]` and `[[artists]]` tables
    pub fn load_toml(path: &Path) -> Result<Self, LibraryError> {
        let content = std::fs::read_to_string(path)?;
        let file: LibraryFile = toml::from_str(&content)?;

        let library = Self::new();
        for song in file.songs {
            library.add_song(song)?;
        }
        for album in file.albums {
            library.add_album(album);
        }
        for artist in file.artists {
            library.add_artist(artist);
        }

        info!("Loaded {} songs from {}", library.len(), path.display());
        Ok(library)
    }

    pub fn add_song(&self, song: Song) -> Result<(), LibraryError> {
        let mut catalog = self.write();
        if catalog.index.contains_key(&song.id) {
            return Err(LibraryError::DuplicateSong { id: song.id });
        }
        debug!("Adding song {} '{}'", song.id, song.title);
        let position = catalog.songs.len();
        catalog.index.insert(song.id, position);
        catalog.songs.push(song);
        Ok(())
    }

    pub fn add_album(&self, album: Album) {
        self.write().albums.push(album);
    }

    pub fn add_artist(&self, artist: Artist) {
        self.write().artists.push(artist);
    }

    pub fn remove_song(&self, id: SongId) -> Result<Song, LibraryError> {
        let mut catalog = self.write();
        let position = catalog
            .index
            .remove(&id)
            .ok_or(LibraryError::SongNotFound { id })?;
        let song = catalog.songs.remove(position);

        let Catalog { songs, index, .. } = &mut *catalog;
        for (offset, shifted) in songs.iter().enumerate().skip(position) {
            index.insert(shifted.id, offset);
        }
        Ok(song)
    }

    /// Songs in insertion order
    pub fn songs(&self) -> Vec<Song> {
        self.read().songs.clone()
    }

    pub fn albums(&self) -> Vec<Album> {
        self.read().albums.clone()
    }

    pub fn artists(&self) -> Vec<Artist> {
        self.read().artists.clone()
    }

    /// Every song as a play list, in library order
    pub fn play_list(&self) -> PlayList {
        PlayList::new(self.songs())
    }

    pub fn len(&self) -> usize {
        self.read().songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Catalog> {
        self.catalog.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SongRepository for Library {
    fn song_by_id(&self, id: SongId) -> Option<Song> {
        let catalog = self.read();
        catalog
            .index
            .get(&id)
            .and_then(|position| catalog.songs.get(*position))
            .cloned()
    }
}
