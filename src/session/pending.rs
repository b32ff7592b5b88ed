//! Pending-call table
//!
//! Every registered id leaves the table exactly once: on a matching response,
//! on failure, on expiry, or in the bulk rejection at teardown. The waiter is
//! settled at that moment, so a call's result is delivered exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::ClientError;

/// What a waiting caller eventually receives.
pub type Outcome = std::result::Result<Value, ClientError>;

#[derive(Debug)]
struct PendingCall {
    command: String,
    created_at: Instant,
    waiter: oneshot::Sender<Outcome>,
}

/// Outstanding calls keyed by call id.
#[derive(Debug, Clone, Default)]
pub struct PendingCalls {
    inner: Arc<Mutex<HashMap<String, PendingCall>>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a waiter for `id`. The receiver settles when the entry leaves the table.
    pub fn register(&self, id: &str, command: &str) -> oneshot::Receiver<Outcome> {
        let (waiter, rx) = oneshot::channel();
        let call = PendingCall {
            command: command.to_string(),
            created_at: Instant::now(),
            waiter,
        };
        if self.lock().insert(id.to_string(), call).is_some() {
            tracing::warn!(id, "call id registered twice, previous waiter dropped");
        }
        rx
    }

    /// Settle `id` with the server's success payload.
    pub fn complete(&self, id: &str, result: Value) -> bool {
        self.settle(id, Ok(result))
    }

    /// Settle `id` with an error.
    pub fn fail(&self, id: &str, error: ClientError) -> bool {
        self.settle(id, Err(error))
    }

    /// Settle `id` with a timeout error.
    pub fn expire(&self, id: &str, timeout: Duration) -> bool {
        let Some(call) = self.take(id) else {
            return false;
        };
        tracing::debug!(id, command = %call.command, ?timeout, "call expired");
        let error = ClientError::Timeout {
            command: call.command,
            duration: timeout,
        };
        let _ = call.waiter.send(Err(error));
        true
    }

    /// Settle `id` with a prepared outcome. Unknown ids are a no-op.
    pub fn settle(&self, id: &str, outcome: Outcome) -> bool {
        let Some(call) = self.take(id) else {
            tracing::debug!(id, "no pending call for id");
            return false;
        };
        tracing::debug!(
            id,
            command = %call.command,
            elapsed = ?call.created_at.elapsed(),
            ok = outcome.is_ok(),
            "call settled"
        );
        // The caller may have stopped waiting; that is not an error here.
        let _ = call.waiter.send(outcome);
        true
    }

    /// Remove `id` without settling it.
    pub fn discard(&self, id: &str) -> bool {
        self.take(id).is_some()
    }

    /// Fail every outstanding call, building each error from its command name.
    pub fn fail_all(&self, error: impl Fn(&str) -> ClientError) -> usize {
        let drained: Vec<(String, PendingCall)> = self.lock().drain().collect();
        let count = drained.len();
        for (id, call) in drained {
            tracing::debug!(id = %id, command = %call.command, "failing pending call");
            let _ = call.waiter.send(Err(error(&call.command)));
        }
        count
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn take(&self, id: &str) -> Option<PendingCall> {
        self.lock().remove(id)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingCall>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes a call from the table if the caller stops waiting for it early.
pub(crate) struct CallGuard<'a> {
    pending: &'a PendingCalls,
    id: &'a str,
}

impl<'a> CallGuard<'a> {
    pub(crate) fn new(pending: &'a PendingCalls, id: &'a str) -> Self {
        Self { pending, id }
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.pending.discard(self.id);
    }
}
