//! Wireless packet framing and message structure for camlink.
//!
//! The wireless channel delivers MTU-limited fragments. Every logical message
//! is framed with:
//! - A 1-3 byte header encoding the declared body length (three encodings,
//!   chosen by the header's high bits)
//! - A continuation flag for fragments that extend an in-progress message
//!
//! No partial messages, no buffer management in user code: `Reassembler`
//! consumes fragments and emits complete, length-validated messages.

pub mod error;
pub mod message;
pub mod packet;
pub mod tlv;

pub use error::{DecodeError, FramingError};
pub use message::{MessageKind, RawMessage};
pub use packet::{fragment_message, LogicalMessage, Reassembler, DEFAULT_MTU, MAX_MESSAGE_LEN};
pub use tlv::TlvParam;
