use std::collections::HashSet;
use std::sync::Mutex;

use camlink_registry::Value;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{ClientError, Result};

/// Connection lifecycle state.
///
/// Only forward transitions (`Closed` → `Open` → `Ready`) and `any` →
/// `Closed` are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Closed,
    /// Transport connected; the camera has not yet shown it can accept
    /// commands.
    Open,
    /// All baseline statuses observed "off" at least once.
    Ready,
}

struct Readiness {
    required: Vec<u8>,
    observed_off: HashSet<u8>,
}

/// Tracks the connection state and the readiness predicate.
///
/// State changes are published through a `watch` channel so callers and
/// background tasks can await transitions without polling.
pub(crate) struct Lifecycle {
    state_tx: watch::Sender<ConnectionState>,
    readiness: Mutex<Readiness>,
}

impl Lifecycle {
    pub(crate) fn new(required_statuses: Vec<u8>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        Self {
            state_tx,
            readiness: Mutex::new(Readiness {
                required: required_statuses,
                observed_off: HashSet::new(),
            }),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// `Closed` → `Open`. Returns false (and does nothing) from any other
    /// state. Readiness marks are reset for the new connection.
    pub(crate) fn set_open(&self) -> bool {
        let mut transitioned = false;
        self.state_tx.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                *state = ConnectionState::Open;
                transitioned = true;
                true
            } else {
                false
            }
        });
        if transitioned {
            let mut readiness = self.readiness.lock().unwrap();
            readiness.observed_off.clear();
            info!("connection open");
            // No baseline statuses required: ready as soon as we are open.
            if readiness.required.is_empty() {
                drop(readiness);
                self.try_ready();
            }
        }
        transitioned
    }

    /// `any` → `Closed`. Returns whether the state actually changed, so the
    /// caller runs disconnect consequences exactly once.
    pub(crate) fn set_closed(&self) -> bool {
        let mut transitioned = false;
        self.state_tx.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                false
            } else {
                *state = ConnectionState::Closed;
                transitioned = true;
                true
            }
        });
        if transitioned {
            info!("connection closed");
        }
        transitioned
    }

    /// Record one baseline-status observation (from a push or an explicit
    /// query). Non-baseline statuses are ignored. A falsy value marks the
    /// status; a truthy value clears the mark while still `Open`. Once all
    /// required statuses are marked, the state advances to `Ready` and stays
    /// there until disconnect.
    pub(crate) fn observe_status(&self, identifier: u8, value: &Value) {
        let satisfied = {
            let mut readiness = self.readiness.lock().unwrap();
            if !readiness.required.contains(&identifier) {
                return;
            }
            if value.is_falsy() {
                readiness.observed_off.insert(identifier);
            } else {
                readiness.observed_off.remove(&identifier);
            }
            debug!(
                status = identifier,
                observed = readiness.observed_off.len(),
                required = readiness.required.len(),
                "baseline status observed"
            );
            readiness.observed_off.len() == readiness.required.len()
        };
        if satisfied {
            self.try_ready();
        }
    }

    fn try_ready(&self) {
        self.state_tx.send_if_modified(|state| {
            if *state == ConnectionState::Open {
                *state = ConnectionState::Ready;
                info!("connection ready");
                true
            } else {
                false
            }
        });
    }

    /// Suspend until `Ready`. Fails with `ConnectionLost` if the connection
    /// closes (or is already closed) before readiness.
    pub(crate) async fn wait_for_ready(&self) -> Result<()> {
        let mut rx = self.subscribe();
        loop {
            match *rx.borrow_and_update() {
                ConnectionState::Ready => return Ok(()),
                ConnectionState::Closed => return Err(ClientError::ConnectionLost),
                ConnectionState::Open => {}
            }
            if rx.changed().await.is_err() {
                return Err(ClientError::ConnectionLost);
            }
        }
    }
}
