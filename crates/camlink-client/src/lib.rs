//! The camlink protocol communicator.
//!
//! This is the "just works" layer: open a connection, send commands on either
//! channel, subscribe to asynchronous setting/status pushes, and let the
//! keep-alive watch the link — while fragments, correlation, and lifecycle
//! progress concurrently underneath.

pub mod client;
pub mod config;
pub mod correlator;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod subscriptions;

pub use client::Communicator;
pub use config::ClientConfig;
pub use correlator::Channel;
pub use error::{ClientError, Result};
pub use lifecycle::ConnectionState;
pub use subscriptions::Subscriber;
