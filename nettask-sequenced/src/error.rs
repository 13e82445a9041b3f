use std::time::Duration;
use thiserror::Error;

/// Errors of the sequenced delivery layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencedError {
    #[error("no acknowledgement within {0:?}")]
    AckTimeout(Duration),
    #[error("retry budget spent after {attempts} attempts for sequence {seq}")]
    Exhausted { seq: u16, attempts: u8 },
    #[error("unexpected sequence {got}, expected {expected}")]
    UnexpectedSequence { expected: u16, got: u16 },
}
