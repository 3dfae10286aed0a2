/// Errors that can occur while reassembling fragments into messages.
///
/// A framing error drops the affected message; the channel itself stays
/// alive and the next start fragment begins a fresh message.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// A continuation fragment arrived with no message in progress.
    #[error("continuation fragment with no message in progress")]
    UnexpectedContinuation,

    /// Accumulated body bytes exceed the declared message length.
    #[error("message overflow (declared {declared} bytes, accumulated {accumulated})")]
    Overflow { declared: usize, accumulated: usize },

    /// The header uses the reserved length encoding.
    #[error("reserved header encoding")]
    ReservedHeader,

    /// The fragment ended before the extended-length header was complete.
    #[error("truncated extended-length header")]
    TruncatedHeader,

    /// An outgoing message body exceeds the maximum encodable length.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Errors that can occur while decoding a complete message's structure.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The message body is empty (no identifier byte).
    #[error("empty message body")]
    EmptyMessage,

    /// A TLV parameter declares more bytes than remain in the body.
    #[error("parameter 0x{param_id:02X} truncated (declared {declared}, {remaining} remaining)")]
    TruncatedParameter {
        param_id: u8,
        declared: usize,
        remaining: usize,
    },
}
