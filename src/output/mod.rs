//! Output side: batching key events and injecting them into the host
//!
//! ```text
//! Vec<KeyEvent> ──► EventBatch ──► dispatch() ──► InputSink::inject()
//!                                     │
//!                                     └── empty ──► skipped, no sink call
//! ```

pub mod batch;
#[cfg(windows)]
pub mod send_input;
pub mod sink;

pub use batch::{dispatch, Dispatch, EventBatch};
#[cfg(windows)]
pub use send_input::SendInputSink;
pub use sink::{InjectionError, InputSink, LogSink};
