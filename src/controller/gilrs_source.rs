use crate::controller::snapshot::{bits, ControllerSnapshot};
use crate::controller::state_source::{SourceError, StateSource};
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use tracing::{debug, error, info, warn};

// gilrs button -> bit position in the snapshot mask
const BUTTON_BITS: [(Button, u8); 15] = [
    (Button::DPadUp, bits::DPAD_UP),
    (Button::DPadDown, bits::DPAD_DOWN),
    (Button::DPadLeft, bits::DPAD_LEFT),
    (Button::DPadRight, bits::DPAD_RIGHT),
    (Button::Start, bits::START),
    (Button::Select, bits::BACK),
    (Button::LeftThumb, bits::LEFT_THUMB),
    (Button::RightThumb, bits::RIGHT_THUMB),
    (Button::LeftTrigger, bits::LEFT_SHOULDER),
    (Button::RightTrigger, bits::RIGHT_SHOULDER),
    (Button::Mode, bits::GUIDE),
    (Button::South, bits::A),
    (Button::East, bits::B),
    (Button::West, bits::X),
    (Button::North, bits::Y),
];

/// Controller state read through gilrs
///
/// gilrs keeps a cached state per gamepad that is only refreshed while its event queue is
/// drained, so every poll first pumps all pending events and then reads the cache.
pub struct GilrsSource {
    gilrs: Gilrs,
    active_gamepad: Option<GamepadId>,
}

impl GilrsSource {
    pub fn create() -> Result<Self, SourceError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(SourceError::Initialization(e.to_string()));
            }
        };

        let mut source = Self {
            gilrs,
            active_gamepad: None,
        };
        source.select_gamepad();
        if source.active_gamepad.is_none() {
            warn!("No gamepad connected, polling until one shows up");
        }
        Ok(source)
    }

    fn select_gamepad(&mut self) {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();
        for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
            debug!("  [{}] ID: {}, Name: {}", idx, id, gamepad.name());
        }
        self.active_gamepad = gamepads.first().map(|(id, gamepad)| {
            info!("Selected gamepad: {} ({})", gamepad.name(), id);
            *id
        });
    }

    fn pump_events(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected if self.active_gamepad.is_none() => {
                    self.active_gamepad = Some(id);
                    info!("Gamepad {} connected, selecting it", id);
                }
                EventType::Disconnected if self.active_gamepad == Some(id) => {
                    warn!("Active gamepad {} disconnected", id);
                    self.active_gamepad = None;
                }
                _ => {}
            }
        }
        if self.active_gamepad.is_none() {
            self.select_gamepad();
        }
    }
}

impl StateSource for GilrsSource {
    fn poll(&mut self) -> Result<ControllerSnapshot, SourceError> {
        self.pump_events();

        let id = self.active_gamepad.ok_or(SourceError::NotConnected)?;
        let gamepad = self.gilrs.gamepad(id);
        if !gamepad.is_connected() {
            return Err(SourceError::NotConnected);
        }

        let buttons = BUTTON_BITS
            .iter()
            .filter(|(button, _)| gamepad.is_pressed(*button))
            .fold(0u16, |mask, (_, bit)| mask | (1 << bit));

        let trigger = |button: Button| {
            gamepad
                .button_data(button)
                .map(|data| scale_trigger(data.value()))
                .unwrap_or(0)
        };

        Ok(ControllerSnapshot {
            buttons,
            left_stick_x: scale_stick(gamepad.value(Axis::LeftStickX)),
            left_stick_y: scale_stick(gamepad.value(Axis::LeftStickY)),
            right_stick_x: scale_stick(gamepad.value(Axis::RightStickX)),
            right_stick_y: scale_stick(gamepad.value(Axis::RightStickY)),
            left_trigger: trigger(Button::LeftTrigger2),
            right_trigger: trigger(Button::RightTrigger2),
        })
    }

    fn name(&self) -> &str {
        "gilrs"
    }
}

// [-1.0, 1.0] -> i16
fn scale_stick(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

// [0.0, 1.0] -> u8
fn scale_trigger(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * u8::MAX as f32).round() as u8
}
