use crate::controller::StatusSnapshot;
use crate::error::{ErrorSeverity, PlayerError};
use crate::logging::JournalEntry;
use crate::models::{format_millis, PlaybackState, Song};

/// Status display formatter for the CLI
pub struct StatusDisplay;

impl StatusDisplay {
    /// Display the current song, its position and the play list
    pub fn display_status(status: &StatusSnapshot, progress_ms: u64) {
        println!("┌─ Player Status ─────────────────────────────────────────┐");
        println!("│ State: {}", Self::format_playback_state(&status.state));

        match &status.current {
            Some(song) => {
                println!("│ Title: {}", Self::truncate(&song.title, 50));
                println!("│ Artist: {}", Self::truncate(song.artist_name(), 49));
                println!("│ Album: {}", Self::truncate(&song.album, 50));
                println!("│ {}", Self::format_position(song, progress_ms));
            }
            None => println!("│ No song loaded"),
        }

        println!("│");
        if status.play_list.is_empty() {
            println!("│ Play list is empty");
        } else {
            println!("│ Play list ({} songs):", status.play_list.len());
            let current_id = status.current.as_ref().map(|song| song.id);
            for song in status.play_list.songs() {
                let marker = if Some(song.id) == current_id { ">" } else { " " };
                println!(
                    "│ {} {:>4}: {} - {}",
                    marker,
                    song.id,
                    Self::truncate(song.artist_name(), 20),
                    Self::truncate(&song.title, 28)
                );
            }
        }
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display journal entries, oldest first
    pub fn display_history(entries: &[JournalEntry]) {
        if entries.is_empty() {
            println!("No playback events yet");
            return;
        }
        for entry in entries {
            println!(
                "{} [{}] {}",
                entry.timestamp.format("%H:%M:%S%.3f"),
                entry.kind.as_str(),
                entry.details
            );
        }
    }

    /// Display error message with formatting and recovery suggestions
    pub fn display_error(error: &PlayerError) {
        let severity = error.severity();
        let severity_icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
            ErrorSeverity::Critical => "🔥",
        };

        eprintln!("┌─ {} {} ─────────────────────────────────────────────────┐",
            severity_icon, severity.as_str());

        for line in Self::wrap_text(&error.user_message(), 55) {
            eprintln!("│ {}", line);
        }

        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("│");
            eprintln!("│ Suggestions:");
            for suggestion in suggestions.iter().take(3) {
                for line in Self::wrap_text(&format!("• {}", suggestion), 53) {
                    eprintln!("│   {}", line);
                }
            }
        }

        eprintln!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display a simple error message for non-interactive contexts
    pub fn display_simple_error(error: &PlayerError) {
        eprintln!("[{}] {}", error.severity().as_str(), error.user_message());

        if let Some(suggestion) = error.recovery_suggestions().first() {
            eprintln!("Suggestion: {}", suggestion);
        }
    }

    /// "01:30 / 03:00 [████░░░░]" or just the position when the length is unknown
    pub fn format_position(song: &Song, progress_ms: u64) -> String {
        if song.duration_ms == 0 {
            return format_millis(progress_ms);
        }
        let progress = (progress_ms as f32 / song.duration_ms as f32).clamp(0.0, 1.0);
        format!(
            "{} / {} [{}]",
            format_millis(progress_ms),
            format_millis(song.duration_ms),
            Self::create_progress_bar(progress, 30)
        )
    }

    pub fn format_playback_state(state: &PlaybackState) -> String {
        match state {
            PlaybackState::Idle => "Idle".to_string(),
            PlaybackState::Preparing(_) => "… Preparing".to_string(),
            PlaybackState::Playing { .. } => "▶ Playing".to_string(),
            PlaybackState::Paused { .. } => "⏸ Paused".to_string(),
            PlaybackState::Stopped => "⏹ Stopped".to_string(),
        }
    }

    /// Truncate string to fit display width
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len || max_len <= 3 {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len - 3).collect();
            format!("{}...", kept)
        }
    }

    /// Create a progress bar string
    pub fn create_progress_bar(progress: f32, width: usize) -> String {
        let filled = ((progress.clamp(0.0, 1.0) * width as f32) as usize).min(width);
        format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
    }

    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.len() + word.len() < width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current_line));
                current_line = word.to_string();
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }
        lines
    }
}
