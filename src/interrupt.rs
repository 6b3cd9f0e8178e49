use log::{debug, info};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::controller::PlaybackCommands;

/// Telephony call state as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallState {
    #[default]
    Idle,
    Ringing,
    OffHook,
}

impl CallState {
    pub fn is_active(&self) -> bool {
        matches!(self, CallState::Ringing | CallState::OffHook)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::Idle => "idle",
            CallState::Ringing => "ringing",
            CallState::OffHook => "offhook",
        };
        f.write_str(name)
    }
}

impl FromStr for CallState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(CallState::Idle),
            "ringing" => Ok(CallState::Ringing),
            "offhook" | "off-hook" | "off_hook" => Ok(CallState::OffHook),
            other => Err(format!("unknown call state '{}'", other)),
        }
    }
}

/// Pauses playback for calls and resumes it afterwards, but only when the
/// pause was caused by the call.
pub struct InterruptionMonitor<C> {
    commands: Arc<C>,
    last_state: CallState,
    paused_by_interruption: bool,
}

impl<C: PlaybackCommands> InterruptionMonitor<C> {
    pub fn new(commands: Arc<C>) -> Self {
        Self {
            commands,
            last_state: CallState::Idle,
            paused_by_interruption: false,
        }
    }

    /// Feed the latest call state. Repeated reports of the same state are ignored.
    pub fn on_call_state(&mut self, state: CallState) {
        if state == self.last_state {
            return;
        }
        debug!("Call state {} -> {}", self.last_state, state);
        self.last_state = state;

        if state.is_active() {
            if self.commands.is_playing() {
                info!("Pausing for incoming call");
                self.commands.pause();
                self.paused_by_interruption = true;
            }
        } else if self.paused_by_interruption {
            info!("Call ended; resuming playback");
            self.paused_by_interruption = false;
            self.commands.resume();
        }
    }

    pub fn paused_by_interruption(&self) -> bool {
        self.paused_by_interruption
    }

    pub fn call_state(&self) -> CallState {
        self.last_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeCommands;

    #[test]
    fn test_call_pauses_and_resumes() {
        let commands = Arc::new(FakeCommands::playing());
        let mut monitor = InterruptionMonitor::new(commands.clone());

        monitor.on_call_state(CallState::Ringing);
        assert!(monitor.paused_by_interruption());
        assert!(!commands.is_playing());

        monitor.on_call_state(CallState::Idle);
        assert!(!monitor.paused_by_interruption());
        assert_eq!(commands.log(), vec!["pause", "resume"]);
    }

    #[test]
    fn test_user_pause_is_not_overridden() {
        let commands = Arc::new(FakeCommands::default());
        let mut monitor = InterruptionMonitor::new(commands.clone());

        monitor.on_call_state(CallState::Ringing);
        monitor.on_call_state(CallState::Idle);

        assert!(commands.log().is_empty());
    }

    #[test]
    fn test_ringing_then_offhook_pauses_once() {
        let commands = Arc::new(FakeCommands::playing());
        let mut monitor = InterruptionMonitor::new(commands.clone());

        monitor.on_call_state(CallState::Ringing);
        monitor.on_call_state(CallState::OffHook);
        assert!(monitor.paused_by_interruption());

        monitor.on_call_state(CallState::Idle);
        assert_eq!(commands.log(), vec!["pause", "resume"]);
    }

    #[test]
    fn test_repeated_state_is_ignored() {
        let commands = Arc::new(FakeCommands::playing());
        let mut monitor = InterruptionMonitor::new(commands.clone());

        monitor.on_call_state(CallState::Idle);
        assert!(commands.log().is_empty());

        monitor.on_call_state(CallState::OffHook);
        commands.set_playing(true);
        monitor.on_call_state(CallState::OffHook);
        assert_eq!(commands.log(), vec!["pause"]);
    }

    #[test]
    fn test_parse_call_state() {
        assert_eq!("RINGING".parse::<CallState>(), Ok(CallState::Ringing));
        assert_eq!("off-hook".parse::<CallState>(), Ok(CallState::OffHook));
        assert!("busy".parse::<CallState>().is_err());
        assert_eq!(CallState::OffHook.to_string(), "offhook");
    }
}
