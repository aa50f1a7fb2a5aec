//! Pending-command table.
//!
//! Every command sent with a correlation id gets one slot here. The slot is
//! settled by exactly one of: a success result, an error result, or teardown.
//! Whichever comes first wins; later arrivals for the same id find nothing and
//! are dropped.
//!
//! Registration and teardown share one lock, so a command registered while
//! [`CommandCorrelator::cancel_all`] runs is either drained with the rest or
//! refused outright. No slot can be left waiting forever.

use std::collections::HashMap;

use mass_core::{ClientError, CorrelationId, Result};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

type Slot = oneshot::Sender<Result<Value>>;

struct PendingEntry {
    slot: Slot,
    /// Chunks of a result the server is streaming in parts.
    partial: Vec<Value>,
}

#[derive(Default)]
struct PendingTable {
    closed: bool,
    entries: HashMap<CorrelationId, PendingEntry>,
}

/// Maps correlation ids to the callers waiting on them.
#[derive(Default)]
pub struct CommandCorrelator {
    table: Mutex<PendingTable>,
}

impl CommandCorrelator {
    /// Empty, open table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot for `id`.
    ///
    /// Must be called before the command is written, so a fast reply cannot
    /// arrive ahead of its registration. Fails with
    /// [`ClientError::ConnectionClosed`] once the table has been torn down.
    pub fn register(&self, id: CorrelationId) -> Result<PendingCommand<'_>> {
        let (tx, rx) = oneshot::channel();
        let mut table = self.table.lock();
        if table.closed {
            return Err(ClientError::ConnectionClosed);
        }
        if table.entries.contains_key(&id) {
            return Err(ClientError::InvalidState(format!(
                "correlation id {id} is already pending"
            )));
        }
        let _ = table.entries.insert(
            id.clone(),
            PendingEntry {
                slot: tx,
                partial: Vec::new(),
            },
        );
        drop(table);
        Ok(PendingCommand {
            id,
            rx,
            correlator: self,
        })
    }

    /// Settle `message_id` with a result value.
    ///
    /// Buffered partial chunks are prepended when the final result is an array.
    /// Returns `false` when nothing was waiting.
    pub fn resolve(&self, message_id: &str, result: Value) -> bool {
        let Some(entry) = self.take(message_id) else {
            debug!(message_id, "result for unknown or settled command, dropping");
            return false;
        };
        let value = if entry.partial.is_empty() {
            result
        } else {
            let mut combined = entry.partial;
            match result {
                Value::Array(items) => combined.extend(items),
                Value::Null => {}
                other => combined.push(other),
            }
            Value::Array(combined)
        };
        let _ = entry.slot.send(Ok(value));
        true
    }

    /// Buffer one chunk of a result that arrives in parts.
    ///
    /// Array chunks are flattened. Returns `false` when nothing was waiting.
    pub fn append_partial(&self, message_id: &str, chunk: Value) -> bool {
        let mut table = self.table.lock();
        let Some(entry) = table.entries.get_mut(message_id) else {
            debug!(message_id, "partial result for unknown command, dropping");
            return false;
        };
        match chunk {
            Value::Array(items) => entry.partial.extend(items),
            other => entry.partial.push(other),
        }
        true
    }

    /// Settle `message_id` with an error.
    ///
    /// Returns `false` when nothing was waiting.
    pub fn reject(&self, message_id: &str, error: ClientError) -> bool {
        let Some(entry) = self.take(message_id) else {
            debug!(message_id, %error, "error for unknown or settled command, dropping");
            return false;
        };
        let _ = entry.slot.send(Err(error));
        true
    }

    /// Fail every pending command with [`ClientError::ConnectionClosed`] and
    /// refuse new registrations. Returns how many commands were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<PendingEntry> = {
            let mut table = self.table.lock();
            table.closed = true;
            table.entries.drain().map(|(_, entry)| entry).collect()
        };
        let count = drained.len();
        for entry in drained {
            let _ = entry.slot.send(Err(ClientError::ConnectionClosed));
        }
        if count > 0 {
            debug!(count, "cancelled pending commands");
        }
        count
    }

    /// Number of commands still awaiting a result.
    pub fn pending_count(&self) -> usize {
        self.table.lock().entries.len()
    }

    /// Whether [`cancel_all`](Self::cancel_all) has run.
    pub fn is_closed(&self) -> bool {
        self.table.lock().closed
    }

    fn take(&self, message_id: &str) -> Option<PendingEntry> {
        self.table.lock().entries.remove(message_id)
    }
}

/// A registered command awaiting its result.
///
/// Dropping it (including when the awaiting task is cancelled) releases the
/// slot, so abandoned commands never linger in the table.
pub struct PendingCommand<'a> {
    id: CorrelationId,
    rx: oneshot::Receiver<Result<Value>>,
    correlator: &'a CommandCorrelator,
}

impl std::fmt::Debug for PendingCommand<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCommand")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl PendingCommand<'_> {
    /// Correlation id the slot is registered under.
    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    /// Wait for the slot to be settled.
    pub async fn wait(mut self) -> Result<Value> {
        (&mut self.rx)
            .await
            .unwrap_or(Err(ClientError::ConnectionClosed))
    }
}

impl Drop for PendingCommand<'_> {
    fn drop(&mut self) {
        let _ = self.correlator.take(&self.id);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
