//! Errors surfaced by reminder and day-status operations.

use thiserror::Error;

use crate::models::ReminderStatus;

#[derive(Error, Debug)]
pub enum AdherenceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Cannot {action} a reminder that is {from}")]
    InvalidTransition {
        from: ReminderStatus,
        action: &'static str,
    },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The store or log writer failed. The wrapped error is for logs only.
    #[error("Storage unavailable: {0:#}")]
    UpstreamUnavailable(anyhow::Error),
}

impl From<anyhow::Error> for AdherenceError {
    fn from(err: anyhow::Error) -> Self {
        Self::UpstreamUnavailable(err)
    }
}

impl AdherenceError {
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }
}

pub type Result<T, E = AdherenceError> = std::result::Result<T, E>;
