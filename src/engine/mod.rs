pub mod silent;

use std::path::Path;
use std::sync::Arc;

use crate::error::EngineError;

pub use silent::SilentEngine;

/// Invoked by an engine, on a thread of its choosing, when a track plays to its end
pub type CompletionListener = Arc<dyn Fn() + Send + Sync>;

/// Decode/transport capability driven exclusively by the playback worker
pub trait MediaEngine: Send {
    /// Open `path` for playback, replacing whatever was loaded before
    fn load(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Start or continue playback of the loaded track
    fn play(&mut self) -> Result<(), EngineError>;

    fn pause(&mut self) -> Result<(), EngineError>;

    /// Stop playback; the track must be loaded again before playing
    fn stop(&mut self) -> Result<(), EngineError>;

    fn seek(&mut self, position_ms: u64) -> Result<(), EngineError>;

    fn position_ms(&self) -> Result<u64, EngineError>;

    fn set_completion_listener(&mut self, listener: CompletionListener);
}
