#![cfg(windows)]

//! Direct XInput backend.
//!
//! XInput already reports the button mask in the layout [`ControllerSnapshot`] uses, so
//! the conversion is a field-for-field copy.

use crate::controller::snapshot::ControllerSnapshot;
use crate::controller::state_source::{SourceError, StateSource};
use tracing::info;
use windows_sys::Win32::UI::Input::XboxController::{XInputGetState, XINPUT_STATE};

/// Highest XInput user index plus one
pub const XINPUT_SLOTS: u32 = 4;

pub struct XInputSource {
    slot: u32,
    name: String,
}

impl XInputSource {
    pub fn create(slot: u32) -> Result<Self, SourceError> {
        if slot >= XINPUT_SLOTS {
            return Err(SourceError::Initialization(format!(
                "XInput slot {} out of range 0..{}",
                slot, XINPUT_SLOTS
            )));
        }
        info!("Using XInput slot {}", slot);
        Ok(Self {
            slot,
            name: format!("xinput:{}", slot),
        })
    }
}

impl StateSource for XInputSource {
    fn poll(&mut self) -> Result<ControllerSnapshot, SourceError> {
        // FFI struct: must be zeroed before the call
        let mut state: XINPUT_STATE = unsafe { std::mem::zeroed() };

        // Returns ERROR_SUCCESS (0) when the slot has a controller
        let res = unsafe { XInputGetState(self.slot, &mut state) };
        if res != 0 {
            return Err(SourceError::NotConnected);
        }

        let gp = state.Gamepad;
        Ok(ControllerSnapshot {
            buttons: gp.wButtons,
            left_stick_x: gp.sThumbLX,
            left_stick_y: gp.sThumbLY,
            right_stick_x: gp.sThumbRX,
            right_stick_y: gp.sThumbRY,
            left_trigger: gp.bLeftTrigger,
            right_trigger: gp.bRightTrigger,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
