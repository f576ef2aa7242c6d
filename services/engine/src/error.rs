//! services/engine/src/error.rs
//!
//! The top-level error type used by the engine binaries.

use crate::config::ConfigError;
use recap_core::ports::PortError;

/// Anything that can go wrong while starting or running the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration could not be read from the environment.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// An error from the local session cache database.
    #[error("Cache Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// A plain I/O error, typically from binding the listen socket.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for everything else.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
