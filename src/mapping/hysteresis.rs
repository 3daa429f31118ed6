//! Analog-to-key threshold gate with hysteresis
//!
//! ```text
//!   value ─────────────────────────────────────────────►
//!          │  release  │    dead zone    │   engage   │
//!          └────< low ─┴─────────────────┴─ > high ───┘
//! ```
//!
//! The band between `low` and `high` never produces an event, so a value that wobbles
//! around one threshold cannot make the key chatter.

use crate::mapping::error::ConfigError;
use crate::mapping::keyboard::{KeyEvent, VirtualKey, WhammyBinding};
use tracing::debug;

/// Sticky "gesture engaged" flag, kept by the caller across cycles
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HysteresisState {
    pub engaged: bool,
}

/// Two-threshold gate driving one held key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HysteresisGate {
    high: i32,
    low: i32,
    key: VirtualKey,
}

impl HysteresisGate {
    pub fn new(high: i32, low: i32, key: VirtualKey) -> Result<Self, ConfigError> {
        if high <= low {
            return Err(ConfigError::InvalidThresholds { high, low });
        }
        Ok(Self { high, low, key })
    }

    pub fn from_binding(binding: &WhammyBinding) -> Result<Self, ConfigError> {
        Self::new(binding.high, binding.low, binding.key)
    }

    pub fn key(&self) -> VirtualKey {
        self.key
    }

    /// At most one transition per call; `state` changes only when an event is returned
    pub fn evaluate(&self, value: i32, state: &mut HysteresisState) -> Option<KeyEvent> {
        if !state.engaged && value > self.high {
            state.engaged = true;
            debug!("Gate {} engaged at {}", self.key, value);
            Some(KeyEvent::down(self.key))
        } else if state.engaged && value < self.low {
            state.engaged = false;
            debug!("Gate {} released at {}", self.key, value);
            Some(KeyEvent::up(self.key))
        } else {
            None
        }
    }
}
