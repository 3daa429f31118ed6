//! Edge-triggered button debouncing
//!
//! Buttons are reported as levels by the controller but the keyboard needs edges. The
//! detector compares each bound button with the last state it emitted for that key and
//! only produces an event on a change.

use crate::controller::snapshot::ControllerSnapshot;
use crate::mapping::keyboard::{ButtonBindings, KeyEvent, VirtualKey};
use std::collections::HashMap;
use tracing::debug;

/// Last emitted state of a bound key
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyState {
    /// Nothing emitted yet; the first observation always produces an event
    #[default]
    Unknown,
    Pressed,
    Released,
}

impl KeyState {
    fn from_pressed(pressed: bool) -> Self {
        if pressed {
            KeyState::Pressed
        } else {
            KeyState::Released
        }
    }
}

/// Debounce memory: one entry per bound key, surviving across cycles
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DigitalState {
    keys: HashMap<VirtualKey, KeyState>,
}

impl DigitalState {
    /// Starts every bound key in [`KeyState::Unknown`]
    pub fn for_bindings(bindings: &ButtonBindings) -> Self {
        Self {
            keys: bindings
                .iter()
                .map(|(_, key)| (key, KeyState::Unknown))
                .collect(),
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: VirtualKey) -> KeyState {
        self.keys.get(&key).copied().unwrap_or_default()
    }

    /// Keys whose last emitted event was a press
    pub fn held_keys(&self) -> impl Iterator<Item = VirtualKey> + '_ {
        self.keys
            .iter()
            .filter(|(_, state)| **state == KeyState::Pressed)
            .map(|(key, _)| *key)
    }

    /// Marks `key` released without emitting anything. Used after a shutdown release batch.
    pub fn mark_released(&mut self, key: VirtualKey) {
        self.keys.insert(key, KeyState::Released);
    }
}

/// Produces one event per bound button whose level differs from the stored state
///
/// The stored state is updated together with the emission, so the same snapshot fed twice
/// yields events only the first time.
pub fn detect_edges(
    snapshot: &ControllerSnapshot,
    bindings: &ButtonBindings,
    state: &mut DigitalState,
) -> Vec<KeyEvent> {
    let mut events = Vec::new();

    for (button, key) in bindings.iter() {
        let pressed = snapshot.is_pressed(button);
        let current = KeyState::from_pressed(pressed);
        let previous = state.keys.entry(key).or_default();

        if *previous != current {
            debug!(
                "Button {} -> {}: {:?} -> {:?}",
                button, key, previous, current
            );
            *previous = current;
            events.push(if pressed {
                KeyEvent::down(key)
            } else {
                KeyEvent::up(key)
            });
        }
    }

    events
}
