/// Error types for cmdlink operations
///
/// Transport faults on bind/send are returned to the caller. Listener faults
/// end the receive path and only show up through the listener state.
/// A missing reply is never an error: `send_and_wait` returns `Ok(None)`.
use std::io;

use thiserror::Error;

use crate::contracts::Endpoint;

/// Result type alias for cmdlink operations
pub type Result<T> = std::result::Result<T, LinkError>;

/// cmdlink error enumeration
#[derive(Debug, Error)]
pub enum LinkError {
    /// Local endpoint could not be bound
    #[error("Failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    /// Send to the remote endpoint failed
    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    /// Receive failed; terminal for the listener loop
    #[error("Receive error: {0}")]
    Receive(String),

    /// Command does not fit into a single datagram
    #[error("Payload too large: {size} bytes, max {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// Endpoint string could not be parsed
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Configuration could not be loaded or is invalid
    #[error("Config error: {0}")]
    Config(String),

    /// Reply payload is not valid UTF-8
    #[error("Reply is not valid UTF-8")]
    InvalidUtf8,

    /// Session has already been closed
    #[error("Session is closed")]
    Closed,
}
