//! Error types for work submission and execution

use std::any::Any;
use std::sync::Arc;

/// Errors returned when submitting work or managing dispatcher registration
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No dispatcher is currently registered as active
    #[error("No active dispatcher - activate a Dispatcher before submitting work")]
    NoActiveDispatcher,

    /// A different dispatcher already owns the active registration
    #[error("Another dispatcher is already active")]
    AlreadyActive,
}

/// Error attached to a faulted unit of work
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkError {
    /// The work returned an error
    #[error("{0}")]
    Failed(Arc<dyn std::error::Error + Send + Sync>),

    /// The work panicked
    #[error("work panicked: {0}")]
    Panicked(String),

    /// The work was dropped before it ran
    #[error("work abandoned before completion")]
    Abandoned,
}

impl WorkError {
    /// Wrap any error value
    pub fn failed<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        WorkError::Failed(Arc::from(error.into()))
    }

    /// Build from a caught panic payload
    ///
    /// Passes through the message if it is a `String` or `&str`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = match payload.downcast::<String>() {
            Ok(v) => *v,
            Err(e) => match e.downcast::<&str>() {
                Ok(v) => v.to_string(),
                Err(e) => format!("panic with unknown type: {:?}", (*e).type_id()),
            },
        };
        WorkError::Panicked(msg)
    }
}
