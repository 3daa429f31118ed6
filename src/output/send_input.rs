#![cfg(windows)]

//! `SendInput` backed sink.
//!
//! `SendInput` inserts the whole array into the input stream serially and is not
//! interleaved with other keyboard or mouse input, which is exactly the batch guarantee
//! the poll loop needs.

use crate::output::batch::EventBatch;
use crate::output::sink::{InjectionError, InputSink};
use tracing::warn;
use windows_sys::Win32::Foundation::GetLastError;
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_KEYUP,
};

#[derive(Debug, Default)]
pub struct SendInputSink;

impl SendInputSink {
    pub fn new() -> Self {
        Self
    }
}

impl InputSink for SendInputSink {
    fn inject(&mut self, batch: EventBatch) -> Result<(), InjectionError> {
        let inputs: Vec<INPUT> = batch
            .events()
            .iter()
            .map(|event| INPUT {
                r#type: INPUT_KEYBOARD,
                Anonymous: INPUT_0 {
                    ki: KEYBDINPUT {
                        wVk: event.key.code(),
                        wScan: 0,
                        dwFlags: if event.is_key_up { KEYEVENTF_KEYUP } else { 0 },
                        time: 0,
                        dwExtraInfo: 0,
                    },
                },
            })
            .collect();

        let submitted = inputs.len();
        let accepted = unsafe {
            SendInput(
                submitted as u32,
                inputs.as_ptr(),
                std::mem::size_of::<INPUT>() as i32,
            )
        } as usize;

        if accepted == 0 {
            let code = unsafe { GetLastError() };
            return Err(InjectionError::Backend(format!(
                "SendInput blocked all {} events (error {})",
                submitted, code
            )));
        }
        if accepted != submitted {
            // Usually UIPI: the foreground window runs at a higher integrity level
            warn!("SendInput accepted {} of {} events", accepted, submitted);
            return Err(InjectionError::Rejected {
                submitted,
                accepted,
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "send_input"
    }
}
