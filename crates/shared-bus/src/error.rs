use thiserror::Error;

/// Errors from message bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Queue or topic name was empty.
    #[error("Invalid destination name: {0:?}")]
    InvalidName(String),

    /// The bus or the queue was shut down.
    #[error("Message bus closed")]
    Closed,
}
