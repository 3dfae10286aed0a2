//! In-memory transports for unit and integration testing.
//!
//! `MockWireless` records characteristic writes and lets tests inject
//! notification fragments or script automatic replies per write. `MockHttp`
//! replays a queue of scripted replies and records the requests it served.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};
use crate::traits::{HttpBody, HttpChannel, HttpReply, NotificationStream, WirelessTransport};

const NOTIFICATION_CAPACITY: usize = 256;

/// Mock wireless transport.
pub struct MockWireless {
    inner: Mutex<WirelessInner>,
    fail_writes: AtomicBool,
}

#[derive(Default)]
struct WirelessInner {
    notify_tx: Option<mpsc::Sender<Bytes>>,
    writes: Vec<Vec<u8>>,
    scripted_replies: VecDeque<Vec<Bytes>>,
}

impl MockWireless {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(WirelessInner::default()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Inject one notification fragment, as if the device pushed it.
    pub fn notify(&self, fragment: impl Into<Bytes>) {
        let inner = self.inner.lock().unwrap();
        let tx = inner
            .notify_tx
            .as_ref()
            .expect("notify before open or after disconnect");
        tx.try_send(fragment.into())
            .expect("notification channel full or closed");
    }

    /// Script the fragments to push back when the next unscripted write
    /// arrives. Replies are consumed in FIFO order, one entry per write.
    pub fn push_reply(&self, fragments: Vec<Bytes>) {
        self.inner
            .lock()
            .unwrap()
            .scripted_replies
            .push_back(fragments);
    }

    /// All characteristic writes observed so far.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().writes.clone()
    }

    /// Make subsequent writes fail with `TransportError::WriteFailed`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Simulate the link dropping: the notification stream ends.
    pub fn disconnect(&self) {
        self.inner.lock().unwrap().notify_tx = None;
    }
}

impl Default for MockWireless {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WirelessTransport for MockWireless {
    async fn open(&self) -> Result<NotificationStream> {
        let (tx, rx) = mpsc::channel(NOTIFICATION_CAPACITY);
        self.inner.lock().unwrap().notify_tx = Some(tx);
        Ok(rx)
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::WriteFailed("mock failure".to_string()));
        }
        let reply = {
            let mut inner = self.inner.lock().unwrap();
            inner.writes.push(data.to_vec());
            inner.scripted_replies.pop_front()
        };
        if let Some(fragments) = reply {
            let inner = self.inner.lock().unwrap();
            if let Some(tx) = inner.notify_tx.as_ref() {
                for fragment in fragments {
                    let _ = tx.try_send(fragment);
                }
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.disconnect();
        Ok(())
    }
}

/// Mock HTTP channel replaying scripted replies.
pub struct MockHttp {
    inner: Mutex<HttpInner>,
}

#[derive(Default)]
struct HttpInner {
    replies: VecDeque<HttpReply>,
    requests: Vec<RecordedRequest>,
}

/// One request served by `MockHttp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Bytes>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HttpInner::default()),
        }
    }

    /// Queue the reply for the next request.
    pub fn push_reply(&self, reply: HttpReply) {
        self.inner.lock().unwrap().replies.push_back(reply);
    }

    /// Queue a 200 reply with a JSON body.
    pub fn push_json(&self, json: serde_json::Value) {
        self.push_reply(HttpReply {
            status: 200,
            body: HttpBody::Json(json),
        });
    }

    /// All requests served so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    fn serve(&self, method: &'static str, path: &str, body: Option<Bytes>) -> Result<HttpReply> {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.push(RecordedRequest {
            method,
            path: path.to_string(),
            body,
        });
        inner.replies.pop_front().ok_or(TransportError::Closed)
    }
}

impl Default for MockHttp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpChannel for MockHttp {
    async fn get(&self, path: &str) -> Result<HttpReply> {
        self.serve("GET", path, None)
    }

    async fn post(&self, path: &str, body: Bytes) -> Result<HttpReply> {
        self.serve("POST", path, Some(body))
    }
}
