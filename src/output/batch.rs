//! Per-cycle batching of key events

use crate::mapping::keyboard::KeyEvent;
use crate::output::sink::{InjectionError, InputSink};
use std::fmt;
use tracing::debug;

/// Ordered key events of one poll cycle, handed to the sink as one unit
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventBatch {
    events: Vec<KeyEvent>,
}

impl EventBatch {
    pub fn new(events: Vec<KeyEvent>) -> Self {
        Self { events }
    }

    /// Button edges first, then the gate transition if there was one
    pub fn for_cycle(button_events: Vec<KeyEvent>, gate_event: Option<KeyEvent>) -> Self {
        let mut events = button_events;
        events.extend(gate_event);
        Self { events }
    }

    pub fn events(&self) -> &[KeyEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl fmt::Display for EventBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, event) in self.events.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", event)?;
        }
        write!(f, "]")
    }
}

/// What happened to a batch handed to [`dispatch`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing changed this cycle, the sink was not called
    Skipped,
    /// The sink accepted this many events in one call
    Sent(usize),
}

/// Hands a non-empty batch to the sink; an empty batch never reaches it
pub fn dispatch(sink: &mut dyn InputSink, batch: EventBatch) -> Result<Dispatch, InjectionError> {
    if batch.is_empty() {
        return Ok(Dispatch::Skipped);
    }

    let count = batch.len();
    debug!("Dispatching {} to {}", batch, sink.name());
    sink.inject(batch)?;
    Ok(Dispatch::Sent(count))
}
