use std::time::Duration;

use camlink_frame::DEFAULT_MTU;

/// Baseline status: camera busy with an internal operation.
pub const STATUS_BUSY: u8 = 8;
/// Baseline status: camera encoding media.
pub const STATUS_ENCODING: u8 = 10;

/// Configuration for the communicator.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Default deadline for `send`.
    pub response_timeout: Duration,
    /// Interval between keep-alive probes while connected.
    pub keep_alive_interval: Duration,
    /// Deadline for each individual keep-alive probe.
    pub keep_alive_timeout: Duration,
    /// Consecutive probe failures that force the connection closed.
    pub keep_alive_failure_limit: u32,
    /// Statuses that must each be observed "off" before the connection is
    /// considered ready. Also queried by the keep-alive probe.
    pub required_statuses: Vec<u8>,
    /// Fragment size for outgoing wireless writes.
    pub mtu: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(5),
            keep_alive_interval: Duration::from_secs(30),
            keep_alive_timeout: Duration::from_secs(5),
            keep_alive_failure_limit: 3,
            required_statuses: vec![STATUS_BUSY, STATUS_ENCODING],
            mtu: DEFAULT_MTU,
        }
    }
}
