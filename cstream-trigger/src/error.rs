use std::error::Error;
use std::time::Duration;

use cstream_models::{ConsistencyLevel, ModelError};

/// Failure raised by a trigger gateway while handling a committed batch.
#[derive(thiserror::Error, Debug)]
pub enum TriggerError {
    #[error("Trigger execution failed: {0}")]
    Execution(String),
    #[error("Trigger dispatch timed out after {0:?}")]
    Timeout(Duration),
    #[error("Trigger panicked: {0}")]
    Panicked(String),
    #[error("Trigger channel closed")]
    ChannelClosed,
    #[error("UnknownError: {0}")]
    UnknownError(#[from] Box<dyn Error + Send + Sync + 'static>),
}

impl TriggerError {
    pub fn execution<T: ToString>(msg: T) -> Self {
        Self::Execution(msg.to_string())
    }

    pub fn from<E>(error: E) -> TriggerError
    where
        E: Error + Send + Sync + 'static,
    {
        TriggerError::UnknownError(Box::new(error))
    }
}

/// Write path errors of the in-memory storage engine.
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    #[error(
        "Cannot achieve consistency level {consistency}: required {required}, alive {alive}"
    )]
    Unavailable {
        consistency: ConsistencyLevel,
        required: usize,
        alive: usize,
    },
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ModelError),
}
