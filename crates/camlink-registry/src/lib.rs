//! Identifier registry and typed decoding for camlink messages.
//!
//! The protocol's command/setting/status catalog is open-ended and supplied
//! by the integrator: a mapping from numeric identifiers to decode functions
//! producing typed values. The communicator never mutates the registry; it
//! is built once and shared.
//!
//! Unknown identifiers decode to opaque byte values rather than failing, so
//! newer cameras can push identifiers this client has never heard of.

pub mod envelope;
pub mod registry;
pub mod value;

pub use envelope::ParsedEnvelope;
pub use registry::{Domain, IdRegistry, RegistryBuilder};
pub use value::{decode_bool, decode_int, decode_uint, decode_utf8, Value};
