//! Controller subsystem: reading gamepad state
//!
//! Every backend implements [`StateSource`] and hands out one [`ControllerSnapshot`] per
//! poll:
//!
//! 1. [`gilrs_source`] - portable backend built on gilrs
//! 2. [`xinput_source`] - direct XInput slot polling (Windows only)
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► StateSource::poll() ──► ControllerSnapshot ──► PollLoop
//!                     │
//!                     └── Err(NotConnected) ──► cycle skipped
//! ```

pub mod gilrs_source;
pub mod snapshot;
pub mod state_source;
#[cfg(windows)]
pub mod xinput_source;

pub use gilrs_source::GilrsSource;
pub use snapshot::{AnalogAxis, ControllerSnapshot, BUTTON_COUNT};
pub use state_source::{SourceError, StateSource};
#[cfg(windows)]
pub use xinput_source::XInputSource;
