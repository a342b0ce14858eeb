//! Recurrence expansion and completion ledger.
//!
//! `schedule`, `expand` and `ledger` are pure; `service` ties them to the
//! store, the clock and the event bus.

pub mod announce;
pub mod clock;
pub mod events;
pub mod expand;
pub mod ledger;
pub mod schedule;
pub mod service;

use crate::storage::StorageError;

pub use clock::{Clock, FixedClock, SystemClock};
pub use events::EventBus;
pub use service::Routines;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed input, e.g. a schedule whose type and fields disagree.
    #[error("validation error: {0}")]
    Validation(String),

    /// A transition was attempted on a log that is no longer pending.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(m) => EngineError::NotFound(m),
            StorageError::Conflict(m) => EngineError::Conflict(m),
            StorageError::InvalidInput(m) => EngineError::Validation(m),
            other => EngineError::Storage(other),
        }
    }
}

impl EngineError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        Self::NotFound(msg.into())
    }
}
