//! Keyboard side of the mapping: virtual keys, key events and the button layout

use crate::controller::snapshot::{AnalogAxis, BUTTON_COUNT};
use crate::mapping::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// OS virtual key code (Windows VK_* numbering)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualKey(pub u16);

impl VirtualKey {
    pub const BACKSPACE: VirtualKey = VirtualKey(0x08);
    pub const CONTROL: VirtualKey = VirtualKey(0x11);
    pub const SPACE: VirtualKey = VirtualKey(0x20);
    pub const KEY_1: VirtualKey = VirtualKey(0x31);
    pub const KEY_2: VirtualKey = VirtualKey(0x32);
    pub const KEY_3: VirtualKey = VirtualKey(0x33);
    pub const KEY_4: VirtualKey = VirtualKey(0x34);
    pub const KEY_5: VirtualKey = VirtualKey(0x35);
    pub const KEY_X: VirtualKey = VirtualKey(0x58);
    pub const KEY_Z: VirtualKey = VirtualKey(0x5A);

    pub fn code(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for VirtualKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// A single synthetic key press or release
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub key: VirtualKey,
    pub is_key_up: bool,
}

impl KeyEvent {
    pub fn down(key: VirtualKey) -> Self {
        Self {
            key,
            is_key_up: false,
        }
    }

    pub fn up(key: VirtualKey) -> Self {
        Self {
            key,
            is_key_up: true,
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.is_key_up { "up" } else { "down" };
        write!(f, "{} {}", self.key, dir)
    }
}

/// One `button -> key` entry as it appears in the config file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingEntry {
    pub button: u8,
    pub key: VirtualKey,
}

/// Analog channel held as a key while it sits past a threshold
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhammyBinding {
    pub axis: AnalogAxis,
    pub high: i32,
    pub low: i32,
    pub key: VirtualKey,
}

impl Default for WhammyBinding {
    fn default() -> Self {
        Self {
            axis: AnalogAxis::RightStickY,
            high: 6000,
            low: 4000,
            key: VirtualKey::CONTROL,
        }
    }
}

/// Validated sparse `button index -> key` table
///
/// Iteration order is whatever the underlying map yields. Nothing downstream may rely on
/// the relative order of two different keys inside a batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ButtonBindings {
    entries: HashMap<u8, VirtualKey>,
}

impl ButtonBindings {
    /// Builds the table, rejecting out-of-range buttons, duplicate buttons and two
    /// buttons sharing one key
    pub fn from_entries(entries: &[BindingEntry]) -> Result<Self, ConfigError> {
        let mut by_button: HashMap<u8, VirtualKey> = HashMap::new();
        let mut by_key: HashMap<VirtualKey, u8> = HashMap::new();

        for entry in entries {
            if entry.button >= BUTTON_COUNT {
                return Err(ConfigError::ButtonOutOfRange(entry.button));
            }
            if by_button.insert(entry.button, entry.key).is_some() {
                return Err(ConfigError::DuplicateButton(entry.button));
            }
            if let Some(first) = by_key.insert(entry.key, entry.button) {
                return Err(ConfigError::DuplicateKey {
                    key: entry.key,
                    first,
                    second: entry.button,
                });
            }
        }

        Ok(Self {
            entries: by_button,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, VirtualKey)> + '_ {
        self.entries.iter().map(|(button, key)| (*button, *key))
    }

    #[cfg(test)]
    pub fn key_for(&self, button: u8) -> Option<VirtualKey> {
        self.entries.get(&button).copied()
    }

    pub fn button_for(&self, key: VirtualKey) -> Option<u8> {
        self.entries
            .iter()
            .find(|(_, bound)| **bound == key)
            .map(|(button, _)| *button)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Button table plus optional whammy, validated together
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyboardLayout {
    pub bindings: ButtonBindings,
    pub whammy: Option<WhammyBinding>,
}

impl KeyboardLayout {
    pub fn new(
        entries: &[BindingEntry],
        whammy: Option<WhammyBinding>,
    ) -> Result<Self, ConfigError> {
        let bindings = ButtonBindings::from_entries(entries)?;

        if let Some(whammy) = &whammy {
            if whammy.high <= whammy.low {
                return Err(ConfigError::InvalidThresholds {
                    high: whammy.high,
                    low: whammy.low,
                });
            }
            // high must be exceeded and low undercut by some reading of the axis
            let (min, max) = whammy.axis.range();
            for value in [whammy.high, whammy.low] {
                if value >= max || value <= min {
                    return Err(ConfigError::ThresholdOutOfRange {
                        axis: whammy.axis,
                        value,
                        min,
                        max,
                    });
                }
            }
            // Aliasing the whammy onto a button key would let two state machines emit
            // opposite edges for the same key in one batch
            if let Some(button) = bindings.button_for(whammy.key) {
                return Err(ConfigError::WhammyKeyAliased {
                    key: whammy.key,
                    button,
                });
            }
        }

        if bindings.is_empty() && whammy.is_none() {
            return Err(ConfigError::EmptyLayout);
        }

        debug!(
            "Layout validated: {} buttons, whammy={:?}",
            bindings.len(),
            whammy
        );
        Ok(Self { bindings, whammy })
    }
}

/// Default fret/strum table
pub fn default_bindings() -> Vec<BindingEntry> {
    vec![
        BindingEntry { button: 0, key: VirtualKey::KEY_1 },
        BindingEntry { button: 1, key: VirtualKey::KEY_2 },
        BindingEntry { button: 2, key: VirtualKey::KEY_3 },
        BindingEntry { button: 3, key: VirtualKey::KEY_4 },
        BindingEntry { button: 4, key: VirtualKey::KEY_5 },
        // strum up / strum down
        BindingEntry { button: 5, key: VirtualKey::KEY_Z },
        BindingEntry { button: 6, key: VirtualKey::KEY_X },
        // star power
        BindingEntry { button: 7, key: VirtualKey::SPACE },
        BindingEntry { button: 8, key: VirtualKey::BACKSPACE },
    ]
}
