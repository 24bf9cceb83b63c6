//! services/client/src/error.rs
//!
//! Error type returned by the CLI commands.

use crate::config::ConfigError;
use social_feed_core::ports::{Failure, PortError};

/// Everything a command can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An adapter failure that no core service turned into a message.
    #[error("Backend error: {0}")]
    Port(#[from] PortError),

    /// A user action that failed with a displayable message.
    #[error("{0}")]
    Action(#[from] Failure),

    /// Reading an image file or writing output.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
