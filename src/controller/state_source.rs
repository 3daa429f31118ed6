use crate::controller::snapshot::ControllerSnapshot;

/// Errors a [`StateSource`] can report
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No controller answered this poll. The loop skips the cycle and tries again on the
    /// next tick.
    #[error("controller not connected")]
    NotConnected,

    /// The backend could not be brought up at all
    #[error("failed to initialize controller backend: {0}")]
    Initialization(String),
}

/// Reads one snapshot of the active controller per call
///
/// Implementations must return promptly: the poll loop calls `poll` once per tick, which
/// can be as often as every millisecond.
pub trait StateSource {
    fn poll(&mut self) -> Result<ControllerSnapshot, SourceError>;

    /// Human readable backend name for logs
    fn name(&self) -> &str;
}
