use thiserror::Error;

use crate::ConnectionId;

/// Errors surfaced by the endpoint layer.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Failed to bind the listening socket.
    #[error("An error occurred when trying to listen for connections: {0}")]
    Listen(#[source] std::io::Error),

    /// A message was addressed to a connection that does not exist.
    #[error("Connection with id={0} could not be found")]
    ConnectionNotFound(ConnectionId),

    /// The send channel for this connection has closed.
    #[error("Connection with id={0} is no longer accepting messages")]
    ChannelClosed(ConnectionId),

    /// A message could not be encoded or decoded.
    #[error("Failed to serialize or deserialize a message")]
    Serialization,

    /// Provider-specific failure.
    #[error("{0}")]
    Error(String),
}
