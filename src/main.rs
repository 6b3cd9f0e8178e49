use bgplayer::cli::{CliApp, Commands, ParseError, StatusDisplay};
use bgplayer::config::ConfigManager;
use bgplayer::engine::SilentEngine;
use bgplayer::error::PlayerError;
use bgplayer::gesture::{Edge, GestureEvent};
use bgplayer::library::Library;
use bgplayer::logging;
use bgplayer::models::format_millis;
use bgplayer::progress::LogObserver;
use bgplayer::resume::FileResumeStore;
use bgplayer::service::PlayerService;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

const QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Wires the library, the engine and the service to the interactive prompt
struct AppController {
    service: PlayerService,
    library: Arc<Library>,
    started: Instant,
}

impl AppController {
    fn new(cli: &CliApp) -> Result<Self, PlayerError> {
        let config_manager = match &cli.config {
            Some(path) => ConfigManager::with_path(CliApp::expand_path(&path.to_string_lossy()))?,
            None => ConfigManager::new()?,
        };
        let config = config_manager.get_config().clone();

        let library_path = CliApp::expand_path(&cli.library.to_string_lossy());
        let library = Arc::new(Library::load_toml(&library_path)?);

        let service = PlayerService::start(
            &config,
            Box::new(SilentEngine::new()?),
            library.clone(),
            Box::new(FileResumeStore::new(config.resume_file.clone())),
            Arc::new(LogObserver),
        )?;
        service.controller().set_play_list(library.play_list())?;

        Ok(Self {
            service,
            library,
            started: Instant::now(),
        })
    }

    fn announce_resumable(&self) {
        match self.service.controller().resumable_song(QUERY_TIMEOUT) {
            Ok(Some((song, position_ms))) => println!(
                "Last session: {} - {} at {} (type 'resume' to continue)",
                song.title,
                song.artist_name(),
                format_millis(position_ms)
            ),
            Ok(None) => {}
            Err(e) => warn!("Could not read the last session: {}", e),
        }
    }

    fn execute_command(&self, command: Commands) -> Result<(), PlayerError> {
        let controller = self.service.controller();
        match command {
            Commands::Play { id, start_ms } => controller.play_song(id, start_ms)?,
            Commands::Pause => controller.pause()?,
            Commands::Resume => controller.resume()?,
            Commands::Next => controller.play_next()?,
            Commands::Prev => controller.play_prev()?,
            Commands::Status => {
                controller.flush(QUERY_TIMEOUT)?;
                StatusDisplay::display_status(&controller.snapshot(), controller.playing_progress());
            }
            Commands::History { count } => {
                StatusDisplay::display_history(&self.service.journal().recent(count));
            }
            Commands::Call { state } => self.service.on_call_state(state),
            Commands::Button { edge, timestamp_ms } => {
                let timestamp_ms =
                    timestamp_ms.unwrap_or_else(|| self.started.elapsed().as_millis() as u64);
                let event = match edge {
                    Edge::Down => GestureEvent::down(timestamp_ms),
                    Edge::Up => GestureEvent::up(timestamp_ms),
                };
                if let Some(intent) = self.service.on_button(event) {
                    println!("Button: {:?} press", intent);
                }
            }
            Commands::Delete => {
                controller.flush(QUERY_TIMEOUT)?;
                let current = controller.current_song();
                controller.discard_current_song()?;
                if let Some(song) = current {
                    self.library.remove_song(song.id)?;
                    controller.set_play_list(self.library.play_list())?;
                    println!("Removed {} - {}", song.title, song.artist_name());
                } else {
                    println!("No song to delete");
                }
            }
        }
        Ok(())
    }

    fn run_interactive_mode(&self) -> Result<(), PlayerError> {
        println!("bgplayer v0.1.0");
        println!("Type 'help' for available commands, 'exit' or 'quit' to quit.");
        println!();
        self.announce_resumable();

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let shutdown_flag_clone = shutdown_flag.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            println!("\nReceived interrupt signal. Shutting down gracefully...");
            shutdown_flag_clone.store(true, Ordering::Relaxed);
        }) {
            warn!("Could not install the Ctrl-C handler: {}", e);
        }

        // Blocking stdin lives on its own thread so the loop can notice Ctrl-C
        let (tx, rx) = mpsc::channel::<Option<String>>();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => {
                        let _ = tx.send(None);
                        break;
                    }
                    Ok(_) => {
                        if tx.send(Some(line.trim().to_string())).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut awaiting_input = false;
        loop {
            if shutdown_flag.load(Ordering::Relaxed) {
                break;
            }

            if !awaiting_input {
                print!("> ");
                let _ = std::io::Write::flush(&mut std::io::stdout());
                awaiting_input = true;
            }

            let line = match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Some(line)) => line,
                Ok(None) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                    println!();
                    break;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
            };
            awaiting_input = false;

            if line.is_empty() {
                continue;
            }
            if line == "exit" || line == "quit" {
                println!("Goodbye!");
                break;
            }
            match CliApp::parse_command(&line) {
                Ok(command) => {
                    if let Err(e) = self.execute_command(command) {
                        StatusDisplay::display_error(&e);
                    }
                }
                Err(ParseError::HelpRequested) => CliApp::display_help(),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    println!("Type 'help' for available commands.");
                }
            }
        }

        self.service.shutdown();
        Ok(())
    }
}

fn main() {
    if let Err(e) = logging::init() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let cli = CliApp::parse();
    let app = match AppController::new(&cli) {
        Ok(app) => app,
        Err(e) => {
            StatusDisplay::display_simple_error(&e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run_interactive_mode() {
        StatusDisplay::display_error(&e);
        std::process::exit(1);
    }

    info!("Application shutdown complete");
}
