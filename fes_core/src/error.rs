use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FesError {
    /// A transition named a state that was never registered. Always a build defect.
    #[error("unknown state: {0}")]
    UnknownState(String),
    #[error("state machine not started")]
    NotStarted,
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("timeout waiting for device")]
    Timeout,
    #[error("store error: {0}")]
    Store(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl FesError {
    /// Errors that must stop the node instead of being logged and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FesError::UnknownState(_) | FesError::NotStarted)
    }
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
