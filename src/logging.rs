use log::{debug, info, trace, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};

use crate::events::{EventBus, EventKind, ListenerId, PlayerEvent};

/// Environment variable selecting the log level
pub const LOG_LEVEL_ENV: &str = "BGPLAYER_LOG_LEVEL";

/// Initialize logging system with appropriate log level
pub fn init() -> Result<(), log::SetLoggerError> {
    let log_level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());

    let mut builder = env_logger::Builder::new();

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}:{}] {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    });

    builder.filter_level(parse_level(&log_level));
    builder.try_init()?;

    info!("Playback logging initialized with level: {}", log_level);
    Ok(())
}

fn parse_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    }
}

/// One recorded playback event
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub details: String,
}

/// Bounded history of bus events, kept for the `history` command and debugging
#[derive(Clone)]
pub struct EventJournal {
    entries: Arc<Mutex<VecDeque<JournalEntry>>>,
    max_entries: usize,
}

impl EventJournal {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            max_entries,
        }
    }

    /// Subscribe the journal to every event kind on `bus`
    pub fn attach(&self, bus: &EventBus) -> Vec<ListenerId> {
        let journal = self.clone();
        bus.register_all(move |event| journal.record(event))
    }

    pub fn record(&self, event: &PlayerEvent) {
        let kind = event.kind();
        let details = Self::describe(event);

        match event {
            PlayerEvent::ProgressUpdate { .. } => trace!("[{}] {}", kind.as_str(), details),
            PlayerEvent::StartPlaybackFailed { .. } => warn!("[{}] {}", kind.as_str(), details),
            _ => info!("[{}] {}", kind.as_str(), details),
        }

        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.push_back(JournalEntry {
            timestamp: Utc::now(),
            kind,
            details,
        });
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    fn describe(event: &PlayerEvent) -> String {
        match event {
            PlayerEvent::StartPlayback(song) => format!("Started playing: {} ({})", song.title, song.id),
            PlayerEvent::StartPlaybackFailed { song, reason } => {
                format!("Failed to start '{}': {}", song.title, reason)
            }
            PlayerEvent::ResumePlayback(song) => format!("Resumed: {}", song.title),
            PlayerEvent::PausePlayback(song) => format!("Paused: {}", song.title),
            PlayerEvent::ProgressUpdate { position_ms } => format!("Position: {}ms", position_ms),
            PlayerEvent::DeleteCurrentSong(song) => format!("Discarded current song: {}", song.title),
        }
    }

    /// Most recent `count` entries, oldest first
    pub fn recent(&self, count: usize) -> Vec<JournalEntry> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let skip = entries.len().saturating_sub(count);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn statistics(&self) -> JournalStatistics {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut stats = JournalStatistics::default();

        for entry in entries.iter() {
            match entry.kind {
                EventKind::StartPlayback => stats.starts += 1,
                EventKind::ResumePlayback => stats.resumes += 1,
                EventKind::PausePlayback => stats.pauses += 1,
                EventKind::ProgressUpdate => stats.progress_updates += 1,
                EventKind::DeleteCurrentSong => stats.deletions += 1,
            }
        }

        stats.total_events = entries.len();
        stats
    }
}

impl Default for EventJournal {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about journaled events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalStatistics {
    pub total_events: usize,
    pub starts: usize,
    pub resumes: usize,
    pub pauses: usize,
    pub progress_updates: usize,
    pub deletions: usize,
}

/// Timer utility for measuring operation durations
pub struct OperationTimer {
    start_time: Instant,
    operation_name: String,
}

impl OperationTimer {
    pub fn new(operation_name: String) -> Self {
        trace!("Starting operation: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finish(self) -> Duration {
        let duration = self.elapsed();
        trace!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        duration
    }

    pub fn finish_with_threshold(self, threshold: Duration) -> Duration {
        let duration = self.elapsed();
        if duration > threshold {
            warn!(
                "Operation '{}' took {}ms (threshold: {}ms)",
                self.operation_name,
                duration.as_millis(),
                threshold.as_millis()
            );
        } else {
            debug!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        }
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Song;
    use std::thread;

    fn song() -> Song {
        Song::new(3, "Blue", "Band", "Record", 200_000, "/blue.flac")
    }

    #[test]
    fn test_journal_creation() {
        let journal = EventJournal::new();
        assert_eq!(journal.max_entries, 1000);
        assert!(journal.recent(10).is_empty());
    }

    #[test]
    fn test_record_event() {
        let journal = EventJournal::new();
        journal.record(&PlayerEvent::StartPlayback(song()));

        let entries = journal.recent(1);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EventKind::StartPlayback);
        assert!(entries[0].details.contains("Blue"));
    }

    #[test]
    fn test_history_limit() {
        let journal = EventJournal::with_capacity(3);
        for position_ms in 0..5 {
            journal.record(&PlayerEvent::ProgressUpdate { position_ms });
        }

        let entries = journal.recent(10);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].details, "Position: 2ms");
        assert_eq!(entries[2].details, "Position: 4ms");
    }

    #[test]
    fn test_attach_records_bus_events() {
        let bus = EventBus::new();
        let journal = EventJournal::new();
        journal.attach(&bus);

        bus.broadcast(PlayerEvent::StartPlayback(song()));
        bus.broadcast(PlayerEvent::PausePlayback(song()));
        bus.broadcast(PlayerEvent::ProgressUpdate { position_ms: 5 });
        bus.broadcast(PlayerEvent::StartPlaybackFailed {
            song: song(),
            reason: "missing".to_string(),
        });

        let stats = journal.statistics();
        assert_eq!(stats.total_events, 4);
        assert_eq!(stats.starts, 2);
        assert_eq!(stats.pauses, 1);
        assert_eq!(stats.progress_updates, 1);
    }

    #[test]
    fn test_clear() {
        let journal = EventJournal::new();
        journal.record(&PlayerEvent::ResumePlayback(song()));
        journal.clear();
        assert!(journal.recent(10).is_empty());
    }

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("test_operation".to_string());
        thread::sleep(Duration::from_millis(10));
        assert!(timer.finish() >= Duration::from_millis(10));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), log::LevelFilter::Debug);
        assert_eq!(parse_level("warn"), log::LevelFilter::Warn);
        assert_eq!(parse_level("nonsense"), log::LevelFilter::Info);
    }
}
