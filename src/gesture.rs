//! Media button handling: raw key edges in, press intents out.

use log::{debug, trace};
use std::sync::Arc;

use crate::config::PlayerConfig;
use crate::controller::PlaybackCommands;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureEvent {
    pub edge: Edge,
    pub timestamp_ms: u64,
}

impl GestureEvent {
    pub fn down(timestamp_ms: u64) -> Self {
        Self {
            edge: Edge::Down,
            timestamp_ms,
        }
    }

    pub fn up(timestamp_ms: u64) -> Self {
        Self {
            edge: Edge::Up,
            timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressIntent {
    Short,
    Long,
}

/// Two-state debounced press detector. Tolerates missing or out-of-order
/// edges: an `Up` without a pending `Down` counts as a zero-length press.
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    long_press_ms: u64,
    debounce_ms: u64,
    pending_down: Option<u64>,
    last_up: Option<u64>,
}

impl GestureClassifier {
    pub fn new(long_press_ms: u64, debounce_ms: u64) -> Self {
        Self {
            long_press_ms,
            debounce_ms,
            pending_down: None,
            last_up: None,
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(config.long_press_threshold_ms, config.debounce_window_ms)
    }

    pub fn on_event(&mut self, event: GestureEvent) -> Option<PressIntent> {
        match event.edge {
            Edge::Down => {
                if self.pending_down.is_none() {
                    self.pending_down = Some(event.timestamp_ms);
                }
                None
            }
            Edge::Up => self.on_up(event.timestamp_ms),
        }
    }

    fn on_up(&mut self, timestamp_ms: u64) -> Option<PressIntent> {
        if let Some(last_up) = self.last_up {
            let gap = timestamp_ms.saturating_sub(last_up);
            if gap <= self.debounce_ms {
                trace!("Ignoring button release {}ms after the previous one", gap);
                return None;
            }
        }

        let pressed_at = self.pending_down.take().unwrap_or(timestamp_ms);
        let elapsed = timestamp_ms.saturating_sub(pressed_at);
        self.last_up = Some(timestamp_ms);

        let intent = if elapsed >= self.long_press_ms {
            PressIntent::Long
        } else {
            PressIntent::Short
        };
        debug!("Button held {}ms -> {:?}", elapsed, intent);
        Some(intent)
    }
}

/// Maps press intents onto playback commands
pub struct MediaButtonHandler<C> {
    classifier: GestureClassifier,
    commands: Arc<C>,
}

impl<C: PlaybackCommands> MediaButtonHandler<C> {
    pub fn new(classifier: GestureClassifier, commands: Arc<C>) -> Self {
        Self {
            classifier,
            commands,
        }
    }

    pub fn on_event(&mut self, event: GestureEvent) -> Option<PressIntent> {
        let intent = self.classifier.on_event(event)?;
        match intent {
            PressIntent::Short => {
                if self.commands.is_playing() {
                    self.commands.pause();
                } else {
                    self.commands.resume();
                }
            }
            PressIntent::Long => self.commands.play_next(),
        }
        Some(intent)
    }
}
