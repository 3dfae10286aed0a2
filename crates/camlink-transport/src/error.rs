/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport is not connected (or was disconnected mid-operation).
    #[error("transport closed")]
    Closed,

    /// A characteristic write was rejected by the transport.
    #[error("characteristic write failed: {0}")]
    WriteFailed(String),

    /// The HTTP channel returned a non-success status code.
    #[error("http request failed with status {status}")]
    Http { status: u16 },

    /// The HTTP channel returned a body that could not be interpreted.
    #[error("malformed http body: {0}")]
    MalformedBody(String),

    /// An I/O error occurred on the underlying transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
