use std::time::Duration;

/// Errors surfaced by the communicator.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A command was issued before the connection was opened. Rejected
    /// locally; no transport traffic was sent.
    #[error("connection not opened")]
    NotOpened,

    /// A command was issued before the camera reported its baseline
    /// statuses. Rejected locally; no transport traffic was sent.
    #[error("camera not ready")]
    NotReady,

    /// No matching response arrived within the deadline.
    #[error("no response within {0:?}")]
    ResponseTimeout(Duration),

    /// The transport disconnected or the keep-alive was exhausted.
    #[error("connection lost")]
    ConnectionLost,

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] camlink_transport::TransportError),

    /// Frame-level error while building outgoing traffic.
    #[error("framing error: {0}")]
    Framing(#[from] camlink_frame::FramingError),

    /// Structural decode error.
    #[error("decode error: {0}")]
    Decode(#[from] camlink_frame::DecodeError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
