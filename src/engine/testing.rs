//! Test doubles for the poll loop

use crate::controller::snapshot::ControllerSnapshot;
use crate::controller::state_source::{SourceError, StateSource};
use crate::output::batch::EventBatch;
use crate::output::sink::{InjectionError, InputSink};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Plays back a fixed list of poll results, then reports `NotConnected` forever
pub struct ScriptedSource {
    script: VecDeque<Result<ControllerSnapshot, SourceError>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<ControllerSnapshot, SourceError>>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl StateSource for ScriptedSource {
    fn poll(&mut self) -> Result<ControllerSnapshot, SourceError> {
        self.script
            .pop_front()
            .unwrap_or(Err(SourceError::NotConnected))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Records every accepted batch; clones share the same record
#[derive(Clone, Default)]
pub struct RecordingSink {
    batches: Arc<Mutex<Vec<EventBatch>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<EventBatch> {
        self.batches.lock().unwrap().clone()
    }

    /// While set, every injection is rejected and nothing is recorded
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl InputSink for RecordingSink {
    fn inject(&mut self, batch: EventBatch) -> Result<(), InjectionError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(InjectionError::Rejected {
                submitted: batch.len(),
                accepted: 0,
            });
        }
        self.batches.lock().unwrap().push(batch);
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
