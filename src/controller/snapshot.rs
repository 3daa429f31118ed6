//! Controller snapshot model
//!
//! A [`ControllerSnapshot`] is one instantaneous read of the whole gamepad. The layout of
//! the button mask follows the XInput convention so that every backend produces the same
//! bit positions for the same physical button.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bit positions inside [`ControllerSnapshot::buttons`]
pub mod bits {
    pub const DPAD_UP: u8 = 0;
    pub const DPAD_DOWN: u8 = 1;
    pub const DPAD_LEFT: u8 = 2;
    pub const DPAD_RIGHT: u8 = 3;
    pub const START: u8 = 4;
    pub const BACK: u8 = 5;
    pub const LEFT_THUMB: u8 = 6;
    pub const RIGHT_THUMB: u8 = 7;
    pub const LEFT_SHOULDER: u8 = 8;
    pub const RIGHT_SHOULDER: u8 = 9;
    pub const GUIDE: u8 = 10;
    pub const A: u8 = 12;
    pub const B: u8 = 13;
    pub const X: u8 = 14;
    pub const Y: u8 = 15;
}

/// Number of addressable digital buttons in a snapshot
pub const BUTTON_COUNT: u8 = 16;

/// One immutable read of the controller state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControllerSnapshot {
    pub buttons: u16,
    pub left_stick_x: i16,
    pub left_stick_y: i16,
    pub right_stick_x: i16,
    pub right_stick_y: i16,
    pub left_trigger: u8,
    pub right_trigger: u8,
}

impl ControllerSnapshot {
    /// Returns whether the button at `bit` is held. Bits outside the mask read as released.
    pub fn is_pressed(&self, bit: u8) -> bool {
        bit < BUTTON_COUNT && self.buttons & (1u16 << bit) != 0
    }

    /// Reads an analog channel widened to `i32` so stick and trigger ranges compare uniformly
    pub fn axis(&self, axis: AnalogAxis) -> i32 {
        match axis {
            AnalogAxis::LeftStickX => self.left_stick_x as i32,
            AnalogAxis::LeftStickY => self.left_stick_y as i32,
            AnalogAxis::RightStickX => self.right_stick_x as i32,
            AnalogAxis::RightStickY => self.right_stick_y as i32,
            AnalogAxis::LeftTrigger => self.left_trigger as i32,
            AnalogAxis::RightTrigger => self.right_trigger as i32,
        }
    }

    pub fn with_buttons(mut self, buttons: u16) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn with_axis(mut self, axis: AnalogAxis, value: i32) -> Self {
        match axis {
            AnalogAxis::LeftStickX => self.left_stick_x = clamp_i16(value),
            AnalogAxis::LeftStickY => self.left_stick_y = clamp_i16(value),
            AnalogAxis::RightStickX => self.right_stick_x = clamp_i16(value),
            AnalogAxis::RightStickY => self.right_stick_y = clamp_i16(value),
            AnalogAxis::LeftTrigger => self.left_trigger = value.clamp(0, u8::MAX as i32) as u8,
            AnalogAxis::RightTrigger => self.right_trigger = value.clamp(0, u8::MAX as i32) as u8,
        }
        self
    }
}

fn clamp_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Analog channels a threshold gate can watch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalogAxis {
    LeftStickX,
    LeftStickY,
    RightStickX,
    RightStickY,
    LeftTrigger,
    RightTrigger,
}

impl AnalogAxis {
    /// Inclusive value range reported for this channel
    pub fn range(&self) -> (i32, i32) {
        match self {
            AnalogAxis::LeftTrigger | AnalogAxis::RightTrigger => (0, u8::MAX as i32),
            _ => (i16::MIN as i32, i16::MAX as i32),
        }
    }
}

impl fmt::Display for AnalogAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalogAxis::LeftStickX => write!(f, "left stick X"),
            AnalogAxis::LeftStickY => write!(f, "left stick Y"),
            AnalogAxis::RightStickX => write!(f, "right stick X"),
            AnalogAxis::RightStickY => write!(f, "right stick Y"),
            AnalogAxis::LeftTrigger => write!(f, "left trigger"),
            AnalogAxis::RightTrigger => write!(f, "right trigger"),
        }
    }
}
