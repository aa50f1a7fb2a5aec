//! Transport seam and its WebSocket implementation.
//!
//! The client core only ever talks to [`Connection`]; everything below it
//! (framing, TLS, handshake) belongs to the implementation.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use mass_core::{ClientError, Result};
use mass_settings::ConnectionSettings;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Frames up to this multiple of `max_message_size` are read and then skipped;
/// anything larger is cut off by the transport and ends the session.
const TRANSPORT_LIMIT_FACTOR: usize = 2;

/// Hard frame limit handed to the WebSocket layer.
fn transport_limit(max_message_size: usize) -> usize {
    max_message_size.saturating_mul(TRANSPORT_LIMIT_FACTOR)
}

/// A full-duplex JSON message transport.
///
/// `send_message` and `receive_message` may be in flight at the same time.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Open the transport and return the first frame (the server info).
    async fn connect(&self) -> Result<Value>;

    /// Close the transport. Idempotent.
    async fn disconnect(&self);

    /// Send one JSON object.
    async fn send_message(&self, message: Value) -> Result<()>;

    /// Wait for the next JSON object.
    ///
    /// Returns [`ClientError::ConnectionClosed`] once the transport is gone and
    /// [`ClientError::InvalidMessage`] for a frame that is not valid JSON.
    async fn receive_message(&self) -> Result<Value>;

    /// Whether the transport is currently open.
    fn connected(&self) -> bool;
}

/// Derive the WebSocket endpoint from a server base URL.
///
/// `http` maps to `ws` and `https` to `wss`; `ws_path` is appended unless the
/// path already ends with it.
pub fn websocket_url(server_url: &str, ws_path: &str) -> Result<String> {
    let invalid = |reason: String| ClientError::CannotConnect {
        url: server_url.to_string(),
        reason,
    };

    let mut url = Url::parse(server_url.trim()).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme {other:?}"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| invalid(format!("cannot switch scheme to {scheme}")))?;

    if !url.path().ends_with(ws_path) {
        let path = format!("{}{ws_path}", url.path().trim_end_matches('/'));
        url.set_path(&path);
    }
    Ok(url.into())
}

/// [`Connection`] over `tokio-tungstenite`.
///
/// The socket is split so that a pending read never blocks a write.
/// `closing` is replaced on every connect and cancelled on disconnect, which
/// wakes a reader parked on the stream half so the half can be dropped.
pub struct WebsocketConnection {
    ws_url: String,
    settings: ConnectionSettings,
    sink: Mutex<Option<WsSink>>,
    stream: Mutex<Option<WsSource>>,
    connected: AtomicBool,
    closing: parking_lot::Mutex<CancellationToken>,
}

impl WebsocketConnection {
    /// Connection to the server at `server_url` (an `http(s)` or `ws(s)` base URL).
    pub fn new(server_url: &str, settings: ConnectionSettings) -> Result<Self> {
        let ws_url = websocket_url(server_url, &settings.ws_path)?;
        Ok(Self {
            ws_url,
            settings,
            sink: Mutex::new(None),
            stream: Mutex::new(None),
            connected: AtomicBool::new(false),
            closing: parking_lot::Mutex::new(CancellationToken::new()),
        })
    }

    /// The WebSocket endpoint being dialled.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    fn cannot_connect(&self, reason: impl Into<String>) -> ClientError {
        ClientError::CannotConnect {
            url: self.ws_url.clone(),
            reason: reason.into(),
        }
    }

    async fn handshake(&self) -> Result<(WsSink, WsSource, Value)> {
        let limit = transport_limit(self.settings.max_message_size);
        let config = WebSocketConfig::default()
            .max_message_size(Some(limit))
            .max_frame_size(Some(limit));
        let (ws, _) = connect_async_with_config(self.ws_url.as_str(), Some(config), false)
            .await
            .map_err(|e| self.cannot_connect(e.to_string()))?;
        let (sink, mut stream) = ws.split();
        let info = read_json(&mut stream, self.settings.max_message_size)
            .await
            .map_err(|e| self.cannot_connect(format!("no server info: {e}")))?;
        Ok((sink, stream, info))
    }
}

#[async_trait]
impl Connection for WebsocketConnection {
    async fn connect(&self) -> Result<Value> {
        debug!(url = %self.ws_url, "opening websocket");
        let timeout = self.settings.connect_timeout();
        let (sink, stream, info) = tokio::time::timeout(timeout, self.handshake())
            .await
            .map_err(|_| {
                self.cannot_connect(format!("timed out after {}ms", timeout.as_millis()))
            })??;

        *self.closing.lock() = CancellationToken::new();
        *self.sink.lock().await = Some(sink);
        *self.stream.lock().await = Some(stream);
        self.connected.store(true, Ordering::Release);
        Ok(info)
    }

    async fn disconnect(&self) {
        let was_connected = self.connected.swap(false, Ordering::AcqRel);
        self.closing.lock().cancel();
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        }
        // A parked reader wakes on `closing`, releases the lock and this clears the half.
        *self.stream.lock().await = None;
        if was_connected {
            debug!(url = %self.ws_url, "websocket closed");
        }
    }

    async fn send_message(&self, message: Value) -> Result<()> {
        let text = serde_json::to_string(&message)?;
        let mut guard = self.sink.lock().await;
        let Some(sink) = guard.as_mut() else {
            return Err(ClientError::ConnectionClosed);
        };
        sink.send(Message::text(text)).await.map_err(|e| {
            debug!(error = %e, "websocket send failed");
            self.connected.store(false, Ordering::Release);
            ClientError::ConnectionClosed
        })
    }

    async fn receive_message(&self) -> Result<Value> {
        let mut guard = self.stream.lock().await;
        let closing = self.closing.lock().clone();
        let Some(stream) = guard.as_mut() else {
            return Err(ClientError::ConnectionClosed);
        };
        let received = tokio::select! {
            biased;
            () = closing.cancelled() => Err(ClientError::ConnectionClosed),
            received = read_json(stream, self.settings.max_message_size) => received,
        };
        if matches!(received, Err(ClientError::ConnectionClosed)) {
            self.connected.store(false, Ordering::Release);
            *guard = None;
        }
        received
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Read frames until one carries a JSON payload.
async fn read_json(stream: &mut WsSource, max_size: usize) -> Result<Value> {
    loop {
        let Some(frame) = stream.next().await else {
            return Err(ClientError::ConnectionClosed);
        };
        let message = frame.map_err(|e| {
            if let tungstenite::Error::Capacity(reason) = &e {
                warn!(%reason, "frame exceeds transport limit, closing");
            } else {
                debug!(error = %e, "websocket read failed");
            }
            ClientError::ConnectionClosed
        })?;
        let payload = match message {
            Message::Text(text) => text.as_bytes().to_vec(),
            Message::Binary(bytes) => bytes.to_vec(),
            Message::Close(frame) => {
                debug!(?frame, "server closed websocket");
                return Err(ClientError::ConnectionClosed);
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        };
        if payload.len() > max_size {
            warn!(size = payload.len(), max_size, "frame exceeds max message size");
            return Err(ClientError::InvalidMessage(format!(
                "frame of {} bytes exceeds limit of {max_size}",
                payload.len()
            )));
        }
        return serde_json::from_slice(&payload).map_err(Into::into);
    }
}
