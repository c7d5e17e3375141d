//! Error types for the ExtPlane client

use extplane_protocol::{ProtocolError, ValidationError};
use thiserror::Error;

/// Errors that can occur in the client
#[derive(Debug, Error)]
pub enum ClientError {
    /// The client actor has stopped
    #[error("client actor is not running")]
    ActorClosed,

    /// No transport is connected
    #[error("not connected to an ExtPlane server")]
    NotConnected,

    /// Identifier validation error
    #[error("invalid dataref: {0}")]
    Validation(#[from] ValidationError),

    /// Protocol error
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed
    #[error("configuration error: {0}")]
    Config(String),
}
