//! Translation of controller snapshots into key events.
//!
//! Two independent state machines run over every snapshot:
//!
//! - [`edge`]: digital buttons, edge-triggered against the last emitted state
//! - [`hysteresis`]: one analog channel turned into a held key with a dead zone
//!
//! [`keyboard`] holds the vocabulary both share (virtual keys, key events, the validated
//! layout).

pub mod edge;
pub mod error;
pub mod hysteresis;
pub mod keyboard;

pub use edge::{detect_edges, DigitalState, KeyState};
pub use error::ConfigError;
pub use hysteresis::{HysteresisGate, HysteresisState};
pub use keyboard::{
    BindingEntry, ButtonBindings, KeyEvent, KeyboardLayout, VirtualKey, WhammyBinding,
};
