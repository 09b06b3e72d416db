//! Error types for the chat client domain.

use thiserror::Error;

use super::connection::{ConnectionEvent, ConnectionState};

/// Identity parsing errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The role string is neither admin nor student
    #[error("Unknown role '{0}'")]
    UnknownRole(String),
}

/// STOMP frame codec errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The frame has no command line
    #[error("Frame has no command")]
    MissingCommand,

    /// The command line is not a STOMP command
    #[error("Unknown STOMP command '{0}'")]
    UnknownCommand(String),

    /// A header line without a colon
    #[error("Malformed header line '{0}'")]
    MalformedHeader(String),

    /// An undefined escape sequence in a header
    #[error("Invalid header escape sequence '\\{0}'")]
    InvalidEscape(char),

    /// The header block is not terminated by a blank line
    #[error("Frame headers are not terminated")]
    UnterminatedHeaders,
}

/// Transport-level errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The configured endpoint is not a usable WebSocket URL
    #[error("Invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    /// Socket-level failure (upgrade refused, read/write error)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The STOMP handshake did not complete
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// No frame arrived within the negotiated heart-beat window
    #[error("Heart-beat timeout after {0} ms")]
    HeartbeatTimeout(u64),

    /// The transport has been closed
    #[error("Transport is closed")]
    Closed,
}

/// Persistent storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Remote identity lookup errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The request could not be sent or the server answered with an error status
    #[error("Request failed: {0}")]
    Request(String),

    /// The server answered without a usable identity
    #[error("No authenticated user")]
    Unauthenticated,

    /// The response body is not a valid identity
    #[error("Invalid identity payload: {0}")]
    InvalidPayload(String),
}

/// Reasons a publish request is rejected before reaching the wire
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("Not connected")]
    NotConnected,

    #[error("No logged-in user")]
    NoIdentity,

    #[error("Message content is empty")]
    EmptyContent,

    #[error("Recipient is empty")]
    EmptyRecipient,

    #[error("Failed to encode message: {0}")]
    Encoding(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// An event that is not allowed in the current connection state
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Invalid transition: {event:?} in state {from:?}")]
pub struct TransitionError {
    pub from: ConnectionState,
    pub event: ConnectionEvent,
}
