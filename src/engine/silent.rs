//! Headless engine: validates and measures files with symphonia, then keeps
//! time with a monotonic clock instead of producing sound.

use log::{debug, trace};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use super::{CompletionListener, MediaEngine};
use crate::error::EngineError;

/// How often the watcher checks for end of track
const WATCH_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug)]
struct LoadedTrack {
    path: PathBuf,
    /// Zero when the container does not report a length; such tracks never complete
    duration: Duration,
}

#[derive(Debug)]
struct Transport {
    track: Option<LoadedTrack>,
    position: Duration,
    last_update: Instant,
    running: bool,
}

impl Transport {
    fn new() -> Self {
        Self {
            track: None,
            position: Duration::ZERO,
            last_update: Instant::now(),
            running: false,
        }
    }

    /// Fold elapsed wall time into the position
    fn advance(&mut self) {
        if self.running {
            let elapsed = self.last_update.elapsed();
            self.position = self.position.saturating_add(elapsed);
            if let Some(track) = &self.track {
                if !track.duration.is_zero() {
                    self.position = self.position.min(track.duration);
                }
            }
        }
        self.last_update = Instant::now();
    }

    fn reached_end(&self) -> bool {
        match &self.track {
            Some(track) => !track.duration.is_zero() && self.position >= track.duration,
            None => false,
        }
    }
}

struct EngineShared {
    transport: Mutex<Transport>,
    listener: Mutex<Option<CompletionListener>>,
    shutdown: AtomicBool,
}

pub struct SilentEngine {
    shared: Arc<EngineShared>,
    watcher: Option<JoinHandle<()>>,
}

impl SilentEngine {
    pub fn new() -> Result<Self, EngineError> {
        let shared = Arc::new(EngineShared {
            transport: Mutex::new(Transport::new()),
            listener: Mutex::new(None),
            shutdown: AtomicBool::new(false),
        });

        let watcher_shared = shared.clone();
        let watcher = thread::Builder::new()
            .name("silent-engine-watcher".to_string())
            .spawn(move || watch_for_completion(&watcher_shared))
            .map_err(|e| EngineError::Fault(format!("Failed to start watcher thread: {}", e)))?;

        Ok(Self {
            shared,
            watcher: Some(watcher),
        })
    }

    /// Probe `path` and return the track duration
    pub fn probe(path: &Path) -> Result<Duration, EngineError> {
        let load_error = |reason: String| EngineError::Load {
            path: path.display().to_string(),
            reason,
        };

        let file = File::open(path).map_err(|e| load_error(e.to_string()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| load_error(format!("unrecognised container: {}", e)))?;
        let format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| load_error("no audio track".to_string()))?;

        get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| load_error(format!("unsupported codec: {}", e)))?;

        let params = &track.codec_params;
        let duration = match (params.n_frames, params.time_base, params.sample_rate) {
            (Some(n_frames), Some(time_base), _) => Duration::from_secs_f64(
                n_frames as f64 * time_base.numer as f64 / time_base.denom as f64,
            ),
            (Some(n_frames), None, Some(rate)) if rate > 0 => {
                Duration::from_secs_f64(n_frames as f64 / rate as f64)
            }
            _ => Duration::ZERO,
        };

        Ok(duration)
    }

    fn install(&self, path: PathBuf, duration: Duration) -> Result<(), EngineError> {
        let mut transport = self.lock_transport()?;
        debug!("Loaded {} ({}ms)", path.display(), duration.as_millis());
        transport.track = Some(LoadedTrack { path, duration });
        transport.position = Duration::ZERO;
        transport.running = false;
        transport.last_update = Instant::now();
        Ok(())
    }

    fn lock_transport(&self) -> Result<std::sync::MutexGuard<'_, Transport>, EngineError> {
        self.shared
            .transport
            .lock()
            .map_err(|_| EngineError::Fault("transport lock poisoned".to_string()))
    }

    fn with_loaded<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut Transport) -> T,
    ) -> Result<T, EngineError> {
        let mut transport = self.lock_transport()?;
        if transport.track.is_none() {
            return Err(EngineError::Fault(format!("{} called with no track loaded", operation)));
        }
        transport.advance();
        Ok(f(&mut transport))
    }
}

impl MediaEngine for SilentEngine {
    fn load(&mut self, path: &Path) -> Result<(), EngineError> {
        let duration = Self::probe(path)?;
        self.install(path.to_path_buf(), duration)
    }

    fn play(&mut self) -> Result<(), EngineError> {
        self.with_loaded("play", |transport| transport.running = true)
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.with_loaded("pause", |transport| transport.running = false)
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        let mut transport = self.lock_transport()?;
        if let Some(track) = transport.track.take() {
            trace!("Stopped {}", track.path.display());
        }
        transport.running = false;
        transport.position = Duration::ZERO;
        Ok(())
    }

    fn seek(&mut self, position_ms: u64) -> Result<(), EngineError> {
        self.with_loaded("seek", |transport| {
            let mut target = Duration::from_millis(position_ms);
            if let Some(track) = &transport.track {
                if !track.duration.is_zero() {
                    target = target.min(track.duration);
                }
            }
            transport.position = target;
        })
    }

    fn position_ms(&self) -> Result<u64, EngineError> {
        let mut transport = self.lock_transport()?;
        transport.advance();
        Ok(transport.position.as_millis() as u64)
    }

    fn set_completion_listener(&mut self, listener: CompletionListener) {
        if let Ok(mut slot) = self.shared.listener.lock() {
            *slot = Some(listener);
        }
    }
}

impl Drop for SilentEngine {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.join();
        }
    }
}

fn watch_for_completion(shared: &EngineShared) {
    while !shared.shutdown.load(Ordering::Relaxed) {
        thread::sleep(WATCH_INTERVAL);

        let completed = match shared.transport.lock() {
            Ok(mut transport) => {
                transport.advance();
                if transport.running && transport.reached_end() {
                    transport.running = false;
                    true
                } else {
                    false
                }
            }
            Err(_) => break,
        };

        if completed {
            // Call outside the transport lock; the listener may re-enter the engine
            let listener = shared.listener.lock().ok().and_then(|slot| slot.clone());
            if let Some(listener) = listener {
                listener();
            }
        }
    }
}
