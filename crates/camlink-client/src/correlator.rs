use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use camlink_registry::ParsedEnvelope;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{ClientError, Result};

/// Which transport a command travels over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Wireless,
    Http,
}

struct PendingEntry {
    seq: u64,
    tx: oneshot::Sender<Result<ParsedEnvelope>>,
}

#[derive(Default)]
struct Table {
    next_seq: u64,
    pending: HashMap<(Channel, u8), VecDeque<PendingEntry>>,
}

/// One outstanding synchronous request, held by the caller that sent it.
pub(crate) struct PendingHandle {
    channel: Channel,
    identifier: u8,
    seq: u64,
    rx: oneshot::Receiver<Result<ParsedEnvelope>>,
}

/// Matches decoded synchronous responses to the in-flight requests awaiting
/// them. FIFO per `(channel, identifier)`: a response always completes the
/// oldest matching request.
#[derive(Default)]
pub(crate) struct Correlator {
    table: Mutex<Table>,
}

impl Correlator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register an expected response. Must happen before the request bytes
    /// are written so the response cannot race the registration.
    pub(crate) fn register(&self, channel: Channel, identifier: u8) -> PendingHandle {
        let (tx, rx) = oneshot::channel();
        let mut table = self.table.lock().unwrap();
        let seq = table.next_seq;
        table.next_seq += 1;
        table
            .pending
            .entry((channel, identifier))
            .or_default()
            .push_back(PendingEntry { seq, tx });
        PendingHandle {
            channel,
            identifier,
            seq,
            rx,
        }
    }

    /// Complete the oldest request matching this envelope, if any. Responses
    /// with no pending request are dropped, not errors.
    pub(crate) fn deliver(&self, channel: Channel, envelope: ParsedEnvelope) {
        let mut table = self.table.lock().unwrap();
        let key = (channel, envelope.identifier);
        let entry = table.pending.get_mut(&key).and_then(VecDeque::pop_front);
        if table.pending.get(&key).is_some_and(VecDeque::is_empty) {
            table.pending.remove(&key);
        }
        match entry {
            // Completion happens under the table lock so a concurrent
            // timeout either finds the entry (and wins) or finds the
            // delivered value.
            Some(entry) => {
                let _ = entry.tx.send(Ok(envelope));
            }
            None => debug!(
                identifier = envelope.identifier,
                ?channel,
                "dropping response with no pending request"
            ),
        }
    }

    /// Fail every pending request exactly once with `ConnectionLost`.
    pub(crate) fn fail_all(&self) {
        let mut table = self.table.lock().unwrap();
        for (_, queue) in table.pending.drain() {
            for entry in queue {
                let _ = entry.tx.send(Err(ClientError::ConnectionLost));
            }
        }
    }

    /// Remove a pending entry without completing it. Returns whether the
    /// entry was still present.
    fn abandon(&self, handle: &PendingHandle) -> bool {
        let mut table = self.table.lock().unwrap();
        let key = (handle.channel, handle.identifier);
        let Some(queue) = table.pending.get_mut(&key) else {
            return false;
        };
        let before = queue.len();
        queue.retain(|entry| entry.seq != handle.seq);
        let removed = queue.len() != before;
        if queue.is_empty() {
            table.pending.remove(&key);
        }
        removed
    }

    /// Remove a pending entry after a failed write (no response can come).
    pub(crate) fn cancel(&self, handle: PendingHandle) {
        self.abandon(&handle);
    }

    /// Suspend until the response arrives or the deadline elapses.
    ///
    /// Timeout removes the pending entry atomically with firing: either the
    /// entry is still in the table (we remove it; a late response is then
    /// dropped by `deliver`) or delivery already completed it (we return the
    /// delivered result instead of timing out).
    pub(crate) async fn wait(
        &self,
        mut handle: PendingHandle,
        timeout: Duration,
    ) -> Result<ParsedEnvelope> {
        match tokio::time::timeout(timeout, &mut handle.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_closed)) => Err(ClientError::ConnectionLost),
            Err(_elapsed) => {
                if self.abandon(&handle) {
                    Err(ClientError::ResponseTimeout(timeout))
                } else {
                    match handle.rx.try_recv() {
                        Ok(result) => result,
                        Err(_) => Err(ClientError::ResponseTimeout(timeout)),
                    }
                }
            }
        }
    }

    #[cfg(test)]
    fn pending_count(&self, channel: Channel, identifier: u8) -> usize {
        self.table
            .lock()
            .unwrap()
            .pending
            .get(&(channel, identifier))
            .map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use camlink_frame::MessageKind;
    use camlink_registry::Value;

    use super::*;

    fn envelope(identifier: u8, value: u64) -> ParsedEnvelope {
        ParsedEnvelope {
            kind: MessageKind::QueryResponse,
            identifier,
            status: 0,
            values: vec![(0x01, Value::Uint(value))],
        }
    }

    #[tokio::test]
    async fn delivers_matching_response() {
        let correlator = Correlator::new();
        let handle = correlator.register(Channel::Wireless, 0x17);
        correlator.deliver(Channel::Wireless, envelope(0x17, 1));

        let result = correlator
            .wait(handle, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(result.identifier, 0x17);
        assert_eq!(correlator.pending_count(Channel::Wireless, 0x17), 0);
    }

    #[tokio::test]
    async fn responses_resolve_in_fifo_order() {
        let correlator = Correlator::new();
        let first = correlator.register(Channel::Wireless, 0x17);
        let second = correlator.register(Channel::Wireless, 0x17);

        correlator.deliver(Channel::Wireless, envelope(0x17, 1));
        correlator.deliver(Channel::Wireless, envelope(0x17, 2));

        let first = correlator.wait(first, Duration::from_secs(1)).await.unwrap();
        let second = correlator
            .wait(second, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(first.values[0].1, Value::Uint(1));
        assert_eq!(second.values[0].1, Value::Uint(2));
    }

    #[tokio::test]
    async fn channels_are_independent() {
        let correlator = Correlator::new();
        let wireless = correlator.register(Channel::Wireless, 0x17);
        let http = correlator.register(Channel::Http, 0x17);

        correlator.deliver(Channel::Http, envelope(0x17, 9));

        let http = correlator.wait(http, Duration::from_secs(1)).await.unwrap();
        assert_eq!(http.values[0].1, Value::Uint(9));
        assert_eq!(correlator.pending_count(Channel::Wireless, 0x17), 1);
        correlator.cancel(wireless);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_removes_pending_entry() {
        let correlator = Correlator::new();
        let handle = correlator.register(Channel::Wireless, 0x07);

        let err = correlator
            .wait(handle, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ResponseTimeout(_)));
        assert_eq!(correlator.pending_count(Channel::Wireless, 0x07), 0);

        // A late response after the timeout is dropped, not resurrected.
        correlator.deliver(Channel::Wireless, envelope(0x07, 1));
        assert_eq!(correlator.pending_count(Channel::Wireless, 0x07), 0);
    }

    #[tokio::test]
    async fn unmatched_response_is_dropped() {
        let correlator = Correlator::new();
        correlator.deliver(Channel::Wireless, envelope(0x42, 0));
        assert_eq!(correlator.pending_count(Channel::Wireless, 0x42), 0);
    }

    #[tokio::test]
    async fn fail_all_fails_every_pending_request() {
        let correlator = Correlator::new();
        let first = correlator.register(Channel::Wireless, 0x17);
        let second = correlator.register(Channel::Http, 0x21);

        correlator.fail_all();

        for handle in [first, second] {
            let err = correlator
                .wait(handle, Duration::from_secs(1))
                .await
                .unwrap_err();
            assert!(matches!(err, ClientError::ConnectionLost));
        }
    }

    #[tokio::test]
    async fn cancel_removes_entry() {
        let correlator = Correlator::new();
        let handle = correlator.register(Channel::Wireless, 0x17);
        correlator.cancel(handle);
        assert_eq!(correlator.pending_count(Channel::Wireless, 0x17), 0);
    }
}
