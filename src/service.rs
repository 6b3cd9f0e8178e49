use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Runtime;

use crate::config::PlayerConfig;
use crate::controller::PlaybackController;
use crate::engine::MediaEngine;
use crate::error::{PlayerError, QueueError};
use crate::events::EventBus;
use crate::gesture::{GestureClassifier, GestureEvent, MediaButtonHandler, PressIntent};
use crate::interrupt::{CallState, InterruptionMonitor};
use crate::library::SongRepository;
use crate::logging::EventJournal;
use crate::progress::{PlaybackObserver, ProgressNotifier};
use crate::resume::ResumeStore;

/// Owns every playback component and the runtime the progress timer runs on
pub struct PlayerService {
    controller: PlaybackController,
    bus: EventBus,
    journal: EventJournal,
    notifier: ProgressNotifier<PlaybackController>,
    interruptions: Mutex<InterruptionMonitor<PlaybackController>>,
    buttons: Mutex<MediaButtonHandler<PlaybackController>>,
    runtime: Mutex<Option<Runtime>>,
    stopped: AtomicBool,
}

impl PlayerService {
    pub fn start(
        config: &PlayerConfig,
        engine: Box<dyn MediaEngine>,
        library: Arc<dyn SongRepository>,
        resume: Box<dyn ResumeStore>,
        observer: Arc<dyn PlaybackObserver>,
    ) -> Result<Self, PlayerError> {
        config.validate()?;

        let bus = EventBus::new();
        let journal = EventJournal::new();
        journal.attach(&bus);

        let controller = PlaybackController::new(config, engine, library, resume, bus.clone())?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("progress-notifier")
            .enable_time()
            .build()
            .map_err(|e| QueueError::Spawn(format!("progress runtime: {}", e)))?;

        let notifier = ProgressNotifier::new(
            Duration::from_millis(config.progress_interval_ms),
            controller.clone(),
            bus.clone(),
            controller.progress_cache(),
            observer,
        );
        notifier.start(runtime.handle());

        let commands = Arc::new(controller.clone());
        let interruptions = InterruptionMonitor::new(commands.clone());
        let buttons = MediaButtonHandler::new(GestureClassifier::from_config(config), commands);

        info!("Player service started");

        Ok(Self {
            controller,
            bus,
            journal,
            notifier,
            interruptions: Mutex::new(interruptions),
            buttons: Mutex::new(buttons),
            runtime: Mutex::new(Some(runtime)),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn journal(&self) -> &EventJournal {
        &self.journal
    }

    /// Telephony receiver entry point
    pub fn on_call_state(&self, state: CallState) {
        self.interruptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .on_call_state(state);
    }

    /// Media button receiver entry point
    pub fn on_button(&self, event: GestureEvent) -> Option<PressIntent> {
        self.buttons
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .on_event(event)
    }

    pub fn paused_by_interruption(&self) -> bool {
        self.interruptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .paused_by_interruption()
    }

    /// Stop the progress timer, then drain and stop the command queue. Idempotent.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        self.notifier.stop();
        self.controller.shutdown();

        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
        debug!("Player service stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for PlayerService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, PlayerEvent};
    use crate::library::Library;
    use crate::models::NotificationPayload;
    use crate::resume::MemoryResumeStore;
    use crate::test_support::{song, RecordingEngine};

    #[derive(Default)]
    struct CollectingObserver {
        payloads: Mutex<Vec<NotificationPayload>>,
    }

    impl PlaybackObserver for CollectingObserver {
        fn on_progress(&self, payload: &NotificationPayload) {
            self.payloads.lock().unwrap().push(payload.clone());
        }
    }

    fn start(observer: Arc<CollectingObserver>) -> (PlayerService, crate::test_support::EngineProbe) {
        let library = Arc::new(Library::new());
        for id in 1..=3 {
            library.add_song(song(id)).unwrap();
        }
        let config = PlayerConfig {
            progress_interval_ms: 20,
            ..PlayerConfig::default()
        };
        let (engine, probe) = RecordingEngine::new();
        let service = PlayerService::start(
            &config,
            Box::new(engine),
            library.clone(),
            Box::new(MemoryResumeStore::new()),
            observer,
        )
        .unwrap();
        service.controller().set_play_list(library.play_list()).unwrap();
        (service, probe)
    }

    #[test]
    fn test_progress_reaches_observer_and_journal() {
        let observer = Arc::new(CollectingObserver::default());
        let (service, probe) = start(observer.clone());

        service.controller().play_song(2, 0).unwrap();
        service.controller().flush(Duration::from_secs(2)).unwrap();
        probe.set_position(61_000);
        std::thread::sleep(Duration::from_millis(200));

        let payloads = observer.payloads.lock().unwrap().clone();
        assert!(!payloads.is_empty());
        assert_eq!(payloads.last().unwrap().position_label, "01:01");
        assert_eq!(service.controller().playing_progress(), 61_000);
        assert!(service.journal().statistics().progress_updates > 0);

        service.shutdown();
    }

    #[test]
    fn test_call_interrupts_playback() {
        let (service, _probe) = start(Arc::new(CollectingObserver::default()));
        let resumed = Arc::new(Mutex::new(0));
        let resumed_clone = resumed.clone();
        service.bus().register(EventKind::ResumePlayback, move |_| {
            *resumed_clone.lock().unwrap() += 1
        });

        service.controller().play_song(1, 0).unwrap();
        service.controller().flush(Duration::from_secs(2)).unwrap();

        service.on_call_state(CallState::Ringing);
        service.controller().flush(Duration::from_secs(2)).unwrap();
        assert!(service.paused_by_interruption());
        assert!(!service.controller().is_playing());

        service.on_call_state(CallState::Idle);
        service.controller().flush(Duration::from_secs(2)).unwrap();
        assert!(service.controller().is_playing());
        assert_eq!(*resumed.lock().unwrap(), 1);
    }

    #[test]
    fn test_long_press_advances() {
        let (service, _probe) = start(Arc::new(CollectingObserver::default()));
        service.controller().play_song(1, 0).unwrap();

        service.on_button(GestureEvent::down(0));
        assert_eq!(service.on_button(GestureEvent::up(900)), Some(PressIntent::Long));
        service.controller().flush(Duration::from_secs(2)).unwrap();

        assert_eq!(service.controller().current_song(), Some(song(2)));
        assert!(service
            .journal()
            .recent(10)
            .iter()
            .any(|entry| entry.kind == EventKind::StartPlayback && entry.details.contains("Song 2")));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (service, _probe) = start(Arc::new(CollectingObserver::default()));
        service.shutdown();
        service.shutdown();

        assert!(service.is_shut_down());
        assert!(service.controller().is_shut_down());
        assert!(service.controller().play_next().is_err());
        assert_eq!(service.bus().broadcast(PlayerEvent::ProgressUpdate { position_ms: 0 }), 1);
    }
}
