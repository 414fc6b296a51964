use std::cell::Cell;

use serde::{Deserialize, Serialize};

/// Configuration for the backend's session clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Epoch seconds at session start.
    pub base_secs: u64,
    /// Seconds that pass per recorded event.
    pub tick_secs: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            base_secs: 1_700_000_000,
            tick_secs: 60,
        }
    }
}

/// Deterministic wall clock for one backend session.
///
/// Every timestamp the backend records comes from [`SessionClock::tick`], so
/// a scripted session always produces the same times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClock {
    config: ClockConfig,
    ticks: Cell<u64>,
}

impl SessionClock {
    #[must_use]
    pub const fn new(config: ClockConfig) -> Self {
        Self {
            config,
            ticks: Cell::new(0),
        }
    }

    #[must_use]
    pub const fn config(&self) -> ClockConfig {
        self.config
    }

    /// Current time in epoch seconds, without advancing.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.config
            .base_secs
            .saturating_add(self.config.tick_secs.saturating_mul(self.ticks.get()))
    }

    /// Advance one tick and return the new time.
    pub fn tick(&self) -> u64 {
        self.ticks.set(self.ticks.get().saturating_add(1));
        self.now()
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new(ClockConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_are_deterministic() {
        let clock = SessionClock::new(ClockConfig {
            base_secs: 100,
            tick_secs: 10,
        });
        assert_eq!(clock.now(), 100);
        assert_eq!(clock.tick(), 110);
        assert_eq!(clock.tick(), 120);
        assert_eq!(clock.now(), 120);
    }
}
