use crate::output::batch::EventBatch;
use tracing::info;

/// Errors reported by an [`InputSink`]
#[derive(Debug, thiserror::Error)]
pub enum InjectionError {
    /// The OS took fewer events than were submitted
    #[error("input stream accepted {accepted} of {submitted} events")]
    Rejected { submitted: usize, accepted: usize },

    #[error("input backend failure: {0}")]
    Backend(String),
}

/// Injects a whole batch into the host input stream in one call
///
/// Implementations must submit the batch as a single unit, in order, so no other input
/// can land between two events of the same cycle.
pub trait InputSink {
    fn inject(&mut self, batch: EventBatch) -> Result<(), InjectionError>;

    fn name(&self) -> &str;
}

/// Dry-run sink that only logs what would be injected
#[derive(Debug, Default)]
pub struct LogSink;

impl InputSink for LogSink {
    fn inject(&mut self, batch: EventBatch) -> Result<(), InjectionError> {
        info!("Would inject {}", batch);
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
