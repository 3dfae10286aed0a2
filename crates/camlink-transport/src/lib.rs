//! Transport capabilities consumed by the camlink communicator.
//!
//! The communicator does not perform discovery, pairing, or base-URL
//! resolution. It is handed two narrow capabilities:
//! - a wireless channel that can write bytes to a command characteristic and
//!   deliver notification payloads as they arrive, and
//! - an HTTP channel that can issue GET/POST requests against an
//!   already-resolved base URL.

pub mod error;
pub mod mock;
pub mod traits;

pub use error::{Result, TransportError};
pub use traits::{HttpBody, HttpChannel, HttpReply, NotificationStream, WirelessTransport};
