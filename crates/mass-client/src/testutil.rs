//! Shared test utilities for client tests.
//!
//! [`ScriptedConnection`] is an in-memory [`Connection`]: the test holds the
//! [`ServerEnd`] and plays the server by reading the frames the client sent and
//! pushing frames back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mass_core::{ClientError, Result};
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};

use crate::connection::Connection;

/// Server-info payload advertising `schema` / `min_supported`.
pub fn server_info(schema: u32, min_supported: u32) -> Value {
    json!({
        "server_id": "test-server",
        "server_version": "2.5.0",
        "schema_version": schema,
        "min_supported_schema_version": min_supported,
        "base_url": "http://mass.local:8095",
        "homeassistant_addon": false,
        "onboard_done": true,
    })
}

/// Success result frame for `message_id`.
pub fn success(message_id: &str, result: Value) -> Value {
    json!({ "message_id": message_id, "result": result })
}

/// Error result frame for `message_id`.
pub fn error(message_id: &str, code: i64, details: Value) -> Value {
    json!({ "message_id": message_id, "error_code": code, "details": details })
}

/// Event frame.
pub fn event(name: &str, object_id: Option<&str>, data: Value) -> Value {
    json!({ "event": name, "object_id": object_id, "data": data })
}

/// In-memory connection driven by a [`ServerEnd`].
pub struct ScriptedConnection {
    server_info: Option<Value>,
    connect_delay: Duration,
    connected: AtomicBool,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    outbound: mpsc::UnboundedSender<Value>,
    inbound: Mutex<mpsc::UnboundedReceiver<Value>>,
}

/// The test's side of a [`ScriptedConnection`].
pub struct ServerEnd {
    /// Frames the client wrote.
    pub sent: mpsc::UnboundedReceiver<Value>,
    /// Push frames for the client to receive.
    pub push: mpsc::UnboundedSender<Value>,
}

impl ScriptedConnection {
    /// Connection whose `connect` yields `server_info`.
    pub fn new(server_info: Value) -> (Arc<Self>, ServerEnd) {
        Self::build(Some(server_info), Duration::ZERO)
    }

    /// Like [`new`](Self::new), but `connect` takes `delay` to complete.
    pub fn slow(server_info: Value, delay: Duration) -> (Arc<Self>, ServerEnd) {
        Self::build(Some(server_info), delay)
    }

    /// Connection whose `connect` always fails.
    pub fn unreachable() -> (Arc<Self>, ServerEnd) {
        Self::build(None, Duration::ZERO)
    }

    fn build(server_info: Option<Value>, connect_delay: Duration) -> (Arc<Self>, ServerEnd) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Self {
            server_info,
            connect_delay,
            connected: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            outbound: out_tx,
            inbound: Mutex::new(in_rx),
        });
        (
            conn,
            ServerEnd {
                sent: out_rx,
                push: in_tx,
            },
        )
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn connect(&self) -> Result<Value> {
        let _ = self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        let Some(info) = self.server_info.clone() else {
            return Err(ClientError::CannotConnect {
                url: "scripted://".into(),
                reason: "refused".into(),
            });
        };
        self.connected.store(true, Ordering::SeqCst);
        Ok(info)
    }

    async fn disconnect(&self) {
        let _ = self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn send_message(&self, message: Value) -> Result<()> {
        if !self.connected() {
            return Err(ClientError::ConnectionClosed);
        }
        self.outbound
            .send(message)
            .map_err(|_| ClientError::ConnectionClosed)
    }

    async fn receive_message(&self) -> Result<Value> {
        if !self.connected() {
            return Err(ClientError::ConnectionClosed);
        }
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .ok_or(ClientError::ConnectionClosed)
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl ServerEnd {
    /// Next frame the client wrote. Panics after a second of silence.
    pub async fn next_sent(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(1), self.sent.recv())
            .await
            .expect("client sent nothing")
            .expect("connection dropped")
    }

    /// Answer every command in the background with `handler(command, args)`.
    ///
    /// `None` leaves the command unanswered. Returns a sender for pushing
    /// further frames (events) while the responder runs.
    pub fn serve<F>(self, handler: F) -> mpsc::UnboundedSender<Value>
    where
        F: Fn(&str, &Value) -> Option<Value> + Send + 'static,
    {
        let Self { mut sent, push } = self;
        let replies = push.clone();
        drop(tokio::spawn(async move {
            while let Some(frame) = sent.recv().await {
                let (Some(id), Some(command)) = (frame["message_id"].as_str(), frame["command"].as_str()) else {
                    continue;
                };
                if let Some(result) = handler(command, &frame["args"]) {
                    let _ = replies.send(success(id, result));
                }
            }
        }));
        push
    }
}
