//! Input-translation engine
//!
//! Wires a [`StateSource`](crate::controller::StateSource) and an
//! [`InputSink`](crate::output::InputSink) together through the [`PollLoop`]:
//!
//! ```text
//! StateSource ──► PollLoop ──► detect_edges ─┐
//!                     │                      ├─► EventBatch ──► InputSink
//!                     └──────► HysteresisGate┘
//! ```
//!
//! [`stats`] publishes the loop counters; [`backends`] builds the configured source and
//! sink.

pub mod backends;
pub mod poll_loop;
pub mod stats;
#[cfg(test)]
pub mod testing;

pub use backends::{build_sink, build_source};
pub use poll_loop::{Cycle, EngineError, LoopSettings, PollLoop, TranslationState};
pub use stats::{LoopStats, StatsReporter};
