//! Deterministic silent-mode state machine.

use std::time::{Duration, Instant};

/// Hardware command produced by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilentCommand {
    /// Stop the control signal.
    Sleep,
    /// Resume the control signal.
    Wake,
}

/// Where the state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilencerPhase {
    /// Silent mode is off; no deadlines.
    Disabled,
    /// Energized, waiting for the go-silent deadline.
    Active,
    /// De-energized, waiting for the heartbeat deadline.
    Sleeping,
}

/// Silent-mode bookkeeping without threads or clocks.
///
/// At most one of the go-silent and heartbeat deadlines is set at any time.
#[derive(Debug, Clone)]
pub struct SilencerState {
    enabled: bool,
    timeout: Duration,
    heartbeat: Duration,
    silence_at: Option<Instant>,
    heartbeat_at: Option<Instant>,
}

impl SilencerState {
    /// Create a disabled state machine.
    pub fn new(timeout: Duration, heartbeat: Duration) -> Self {
        Self {
            enabled: false,
            timeout,
            heartbeat,
            silence_at: None,
            heartbeat_at: None,
        }
    }

    /// Turn silent mode on or off.
    ///
    /// Turning it on schedules going silent at `now + timeout`. Turning it
    /// off clears both deadlines and returns a `Wake` command that must be
    /// executed right away. Setting the current mode again does nothing.
    pub fn set_enabled(&mut self, enabled: bool, now: Instant) -> Option<SilentCommand> {
        if self.enabled == enabled {
            return None;
        }
        self.enabled = enabled;

        if enabled {
            self.silence_at = Some(now + self.timeout);
            self.heartbeat_at = None;
            None
        } else {
            self.silence_at = None;
            self.heartbeat_at = None;
            Some(SilentCommand::Wake)
        }
    }

    /// Whether silent mode is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record activity.
    ///
    /// While active, the go-silent deadline moves to `now + timeout`. While
    /// sleeping, the heartbeat deadline moves to `now`, so the next
    /// [`poll`](Self::poll) wakes the hardware.
    pub fn touch(&mut self, now: Instant) {
        if !self.enabled {
            return;
        }
        if self.silence_at.is_some() {
            self.silence_at = Some(now + self.timeout);
        } else {
            self.heartbeat_at = Some(now);
        }
    }

    /// Change both durations and recompute the current deadline as a
    /// [`touch`](Self::touch) would.
    pub fn set_timeouts(&mut self, timeout: Duration, heartbeat: Duration, now: Instant) {
        self.timeout = timeout;
        self.heartbeat = heartbeat;
        self.touch(now);
    }

    /// Inactivity period before going silent.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time spent silent before a heartbeat wake.
    pub fn heartbeat(&self) -> Duration {
        self.heartbeat
    }

    /// Current phase.
    pub fn phase(&self) -> SilencerPhase {
        if !self.enabled {
            SilencerPhase::Disabled
        } else if self.silence_at.is_some() {
            SilencerPhase::Active
        } else {
            SilencerPhase::Sleeping
        }
    }

    /// Whether the control signal is currently stopped by silent mode.
    pub fn is_silent_now(&self) -> bool {
        self.enabled && self.heartbeat_at.is_some()
    }

    /// The instant at which [`poll`](Self::poll) will next produce a command.
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.enabled {
            return None;
        }
        self.silence_at.or(self.heartbeat_at)
    }

    /// Advance to `now`, returning the command to execute if a deadline passed.
    pub fn poll(&mut self, now: Instant) -> Option<SilentCommand> {
        if !self.enabled {
            return None;
        }

        if let Some(at) = self.silence_at {
            if now < at {
                return None;
            }
            self.silence_at = None;
            self.heartbeat_at = Some(now + self.heartbeat);
            return Some(SilentCommand::Sleep);
        }

        match self.heartbeat_at {
            Some(at) if now >= at => {
                self.heartbeat_at = None;
                self.silence_at = Some(now + self.timeout);
                Some(SilentCommand::Wake)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(100);
    const HEARTBEAT: Duration = Duration::from_millis(200);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn enabled_at(t0: Instant) -> SilencerState {
        let mut state = SilencerState::new(TIMEOUT, HEARTBEAT);
        assert_eq!(state.set_enabled(true, t0), None);
        state
    }

    #[test]
    fn test_disabled_never_fires() {
        let t0 = Instant::now();
        let mut state = SilencerState::new(TIMEOUT, HEARTBEAT);
        assert_eq!(state.phase(), SilencerPhase::Disabled);
        assert_eq!(state.next_deadline(), None);
        assert_eq!(state.poll(t0 + ms(10_000)), None);
        state.touch(t0);
        assert_eq!(state.poll(t0 + ms(10_000)), None);
    }

    #[test]
    fn test_sleep_then_heartbeat_wake() {
        let t0 = Instant::now();
        let mut state = enabled_at(t0);
        assert_eq!(state.next_deadline(), Some(t0 + TIMEOUT));

        assert_eq!(state.poll(t0 + ms(99)), None);
        assert_eq!(state.poll(t0 + ms(100)), Some(SilentCommand::Sleep));
        assert_eq!(state.phase(), SilencerPhase::Sleeping);
        assert!(state.is_silent_now());

        assert_eq!(state.poll(t0 + ms(299)), None);
        assert_eq!(state.poll(t0 + ms(300)), Some(SilentCommand::Wake));
        assert_eq!(state.phase(), SilencerPhase::Active);
        assert!(!state.is_silent_now());
        assert_eq!(state.next_deadline(), Some(t0 + ms(400)));
    }

    #[test]
    fn test_touch_postpones_sleep() {
        let t0 = Instant::now();
        let mut state = enabled_at(t0);

        state.touch(t0 + ms(80));
        assert_eq!(state.poll(t0 + ms(150)), None);
        assert_eq!(state.poll(t0 + ms(180)), Some(SilentCommand::Sleep));
    }

    #[test]
    fn test_touch_while_sleeping_wakes_immediately() {
        let t0 = Instant::now();
        let mut state = enabled_at(t0);
        assert_eq!(state.poll(t0 + ms(100)), Some(SilentCommand::Sleep));

        state.touch(t0 + ms(120));
        assert_eq!(state.next_deadline(), Some(t0 + ms(120)));
        assert_eq!(state.poll(t0 + ms(120)), Some(SilentCommand::Wake));
    }

    #[test]
    fn test_disable_while_sleeping_wakes_and_stops() {
        let t0 = Instant::now();
        let mut state = enabled_at(t0);
        assert_eq!(state.poll(t0 + ms(100)), Some(SilentCommand::Sleep));

        assert_eq!(
            state.set_enabled(false, t0 + ms(150)),
            Some(SilentCommand::Wake)
        );
        assert_eq!(state.phase(), SilencerPhase::Disabled);
        assert_eq!(state.poll(t0 + ms(10_000)), None);
    }

    #[test]
    fn test_repeated_enable_is_noop() {
        let t0 = Instant::now();
        let mut state = enabled_at(t0);
        assert_eq!(state.set_enabled(true, t0 + ms(90)), None);
        assert_eq!(state.next_deadline(), Some(t0 + TIMEOUT));
    }

    #[test]
    fn test_set_timeouts_recomputes_deadline() {
        let t0 = Instant::now();
        let mut state = enabled_at(t0);
        state.set_timeouts(ms(500), ms(50), t0 + ms(10));
        assert_eq!(state.next_deadline(), Some(t0 + ms(510)));
        assert_eq!(state.timeout(), ms(500));
        assert_eq!(state.heartbeat(), ms(50));
    }
}
