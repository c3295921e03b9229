//! Error taxonomy for the toadbox orchestrator.
//!
//! Whether an error aborts boot is not decided here. Each pipeline task
//! declares its own failure policy, and the executor applies it.

use thiserror::Error;

pub type ToadboxResult<T> = Result<T, ToadboxError>;

#[derive(Debug, Error)]
pub enum ToadboxError {
    /// Boot-time configuration could not be interpreted.
    #[error("configuration error: {0}")]
    Config(String),

    /// Account lookup or uid/gid remap failed.
    #[error("identity error: {0}")]
    Identity(String),

    /// Filesystem operation failed (ownership, script provisioning).
    #[error("storage error: {0}")]
    Storage(String),

    /// A supervised service could not be started or waited on.
    #[error("service {service} failed: {message}")]
    Service { service: String, message: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ToadboxError {
    pub fn service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            service: service.into(),
            message: message.into(),
        }
    }
}
