use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;

/// Stream of raw notification payloads from the wireless transport.
///
/// Each item is one transport-level fragment, possibly smaller than a full
/// logical message. The stream ending (`recv` returning `None`) is the
/// disconnect event.
pub type NotificationStream = mpsc::Receiver<Bytes>;

/// Capability: a connected short-range wireless channel.
///
/// Implementations wrap an already-paired BLE (or similar) link. The
/// communicator only needs to write command bytes and consume notifications;
/// everything else (discovery, pairing, characteristic UUIDs) stays inside
/// the implementation.
#[async_trait]
pub trait WirelessTransport: Send + Sync {
    /// Start delivering notifications.
    ///
    /// Returns the notification stream for this connection. Calling `open`
    /// again after a disconnect may return a fresh stream if the underlying
    /// link supports reconnection.
    async fn open(&self) -> Result<NotificationStream>;

    /// Write a byte buffer to the command characteristic.
    async fn write(&self, data: &[u8]) -> Result<()>;

    /// Tear down the link. Must cause the notification stream to end.
    async fn close(&self) -> Result<()>;
}

/// Body of an HTTP reply, as delivered by the transport.
#[derive(Debug, Clone)]
pub enum HttpBody {
    /// A JSON document.
    Json(serde_json::Value),
    /// Raw bytes (protobuf, media, etc.).
    Binary(Bytes),
    /// No body.
    Empty,
}

/// One HTTP reply: status code plus interpreted body.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: HttpBody,
}

impl HttpReply {
    /// Whether the status code indicates success.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Capability: an HTTP channel bound to a resolved base URL.
#[async_trait]
pub trait HttpChannel: Send + Sync {
    /// Issue a GET against `path` (relative to the base URL).
    async fn get(&self, path: &str) -> Result<HttpReply>;

    /// Issue a POST against `path` with the given body.
    async fn post(&self, path: &str, body: Bytes) -> Result<HttpReply>;
}

#[async_trait]
impl<T: WirelessTransport + ?Sized> WirelessTransport for std::sync::Arc<T> {
    async fn open(&self) -> Result<NotificationStream> {
        (**self).open().await
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        (**self).write(data).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}

#[async_trait]
impl<T: HttpChannel + ?Sized> HttpChannel for std::sync::Arc<T> {
    async fn get(&self, path: &str) -> Result<HttpReply> {
        (**self).get(path).await
    }

    async fn post(&self, path: &str, body: Bytes) -> Result<HttpReply> {
        (**self).post(path, body).await
    }
}
