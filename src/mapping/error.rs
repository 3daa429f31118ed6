//! Error definitions for the mapping module

use crate::controller::snapshot::AnalogAxis;
use crate::mapping::keyboard::VirtualKey;
use thiserror::Error;

/// Rejected key layouts
///
/// Every rule here protects the per-batch invariant that a key never shows up as both a
/// press and a release in the same cycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("button index {0} is outside the controller mask (0..16)")]
    ButtonOutOfRange(u8),

    #[error("button {0} is bound more than once")]
    DuplicateButton(u8),

    #[error("buttons {first} and {second} are both bound to key {key}")]
    DuplicateKey {
        key: VirtualKey,
        first: u8,
        second: u8,
    },

    #[error("whammy thresholds need high > low (got high={high}, low={low})")]
    InvalidThresholds { high: i32, low: i32 },

    #[error("whammy threshold {value} never fires on {axis} ({min}..={max})")]
    ThresholdOutOfRange {
        axis: AnalogAxis,
        value: i32,
        min: i32,
        max: i32,
    },

    #[error("whammy key {key} is already bound to button {button}")]
    WhammyKeyAliased { key: VirtualKey, button: u8 },

    #[error("poll interval must be at least 1 ms")]
    ZeroPollInterval,

    #[error("{field} = {value} exceeds the maximum of {max}")]
    IntervalTooLong {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("layout binds no buttons and no whammy")]
    EmptyLayout,

    #[error("backend '{0}' is not available on this platform")]
    UnsupportedBackend(String),
}
