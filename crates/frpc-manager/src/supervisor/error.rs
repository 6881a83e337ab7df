//! Supervisor error types.

use thiserror::Error;

use crate::config::StoreError;

/// Failures surfaced synchronously by supervisor operations.
///
/// Spawn and runtime failures of the frpc process are not errors here; they
/// are recorded in the status as `lastError`.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("frpc is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("config store error: {0}")]
    Store(#[source] StoreError),

    #[error("writing generated config: {0}")]
    Materialize(#[source] std::io::Error),
}

impl From<StoreError> for SupervisorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Invalid(msg) => Self::Configuration(msg),
            other => Self::Store(other),
        }
    }
}
