//! Error handling for the event processor and its collaborators.

use thiserror::Error;

/// Errors `EventProcessor::process_event` can return. `UnknownFactError`,
/// `UnknownOperatorError`, and `CalculationError` are *not* represented
/// here: they are soft failures collected into `EventResponse.errors`
/// instead, since they never abort a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Missing/invalid field in `EventInput`; maps to 400 at the transport boundary.
    #[error("validation error: {0}")]
    Validation(String),

    /// `eventId` already present in history; maps to 409 at the transport boundary.
    #[error("duplicate event: {0}")]
    DuplicateEvent(String),

    /// Persistence failure during balance/history write; maps to 500.
    /// The in-flight balance update must be rolled back.
    #[error("store error: {0}")]
    Store(String),

    /// Deadline expired before the balance commit; maps to 504. No
    /// partial commit is ever made.
    #[error("processing deadline exceeded")]
    Timeout,
}

/// Result type for loyalty-service operations.
pub type Result<T> = std::result::Result<T, Error>;
