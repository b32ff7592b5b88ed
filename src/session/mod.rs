//! Protocol session: request/response correlation over a self-healing connection
//!
//! A [`Client`] is a cheap handle onto one session. Each call gets a fresh id,
//! a pending-table entry and its own timeout; the background transport task
//! owns the socket, reconnects, and routes inbound messages back here.

mod demux;
mod ids;
mod liveness;
mod pending;
mod replay;
mod transport;

pub use demux::{
    Demultiplexer, Event, Inbound, Listener, ListenerId, Listeners, Subscription, FRAME_KIND,
    POPUP_KIND,
};
pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use liveness::{LivenessMonitor, Probe};
pub use pending::{Outcome, PendingCalls};
pub use replay::{ReplayCommand, ReplayState};
pub use transport::{CloseReason, ConnectionState, MAX_QUEUED_TELLS};

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::protocol::{Request, Scope};
use pending::CallGuard;
use transport::{Outbound, Transport};

struct Inner {
    config: ClientConfig,
    ids: Arc<dyn IdGenerator>,
    pending: PendingCalls,
    listeners: Listeners,
    outbound: mpsc::UnboundedSender<Outbound>,
    state: watch::Receiver<ConnectionState>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Handle onto one protocol session. Clones share the session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.inner.config.url)
            .field("state", &*self.inner.state.borrow())
            .field("pending", &self.inner.pending.len())
            .finish()
    }
}

impl Client {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Start a session without waiting for the connection. Sends are queued until it opens.
    pub fn spawn(config: ClientConfig) -> Result<Self> {
        Self::builder(config).spawn()
    }

    /// Start a session and wait for its first open connection.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        Self::builder(config).connect().await
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Send a request and wait for its response, using the configured timeout.
    pub async fn call(&self, scope: impl Into<Scope>, method: &str, params: Value) -> Result<Value> {
        self.call_with_timeout(scope, method, params, self.inner.config.request_timeout())
            .await
    }

    pub async fn call_with_timeout(
        &self,
        scope: impl Into<Scope>,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let pending = &self.inner.pending;
        let id = self.inner.ids.next_id();
        let request = Request::new(id.clone(), scope.into(), method, params);
        let text = serde_json::to_string(&request)?;

        let mut rx = pending.register(&id, method);
        let _guard = CallGuard::new(pending, &id);
        self.submit(Outbound {
            request,
            text,
            expects_reply: true,
        })?;
        tracing::debug!(id = %id, method, "call submitted");

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(settled) => settled.map_err(|_| ClientError::Closed)?,
            Err(_) => {
                // A response that raced the timer wins; otherwise this settles it as Timeout.
                pending.expire(&id, timeout);
                rx.await.map_err(|_| ClientError::Closed)?
            }
        }
    }

    /// [`Client::call`], decoding the result.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        scope: impl Into<Scope>,
        method: &str,
        params: Value,
    ) -> Result<T> {
        let value = self.call(scope, method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Fire-and-forget: the request is sent but never awaited.
    pub fn tell(&self, scope: impl Into<Scope>, method: &str, params: Value) -> Result<()> {
        let request = Request::new(self.inner.ids.next_id(), scope.into(), method, params);
        let text = serde_json::to_string(&request)?;
        self.submit(Outbound {
            request,
            text,
            expects_reply: false,
        })
    }

    /// Register an event listener. Listeners survive reconnects.
    pub fn on<F>(&self, kind: impl Into<String>, listener: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.listeners.on(kind, listener)
    }

    pub fn off(&self, subscription: &Subscription) -> bool {
        self.inner.listeners.off(subscription)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.clone()
    }

    /// Wait until the session is open. Fails if it closes first.
    pub async fn wait_open(&self) -> Result<()> {
        let mut state = self.watch_state();
        let reached = state
            .wait_for(|s| s.is_open() || s.is_closed())
            .await
            .map(|s| s.clone())
            .unwrap_or_else(|_| self.state());
        match reached {
            ConnectionState::Open => Ok(()),
            ConnectionState::Closed(reason) => Err(ClientError::ConnectFailed {
                url: self.inner.config.url.clone(),
                reason: reason.to_string(),
            }),
            other => Err(ClientError::Protocol(format!("unexpected state {other:?}"))),
        }
    }

    /// Resolves once the session is terminally closed.
    pub async fn closed(&self) -> CloseReason {
        let mut state = self.watch_state();
        let result = state.wait_for(ConnectionState::is_closed).await.map(|s| s.clone());
        match result.unwrap_or_else(|_| self.state()) {
            ConnectionState::Closed(reason) => reason,
            _ => CloseReason::Requested,
        }
    }

    /// Number of calls awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }

    /// Close the session. Outstanding calls fail with [`ClientError::Closed`]
    /// before this returns; no reconnection follows.
    pub async fn close(&self) {
        self.inner.shutdown.cancel();
        let failed = self.inner.pending.fail_all(|_| ClientError::Closed);
        if failed > 0 {
            tracing::debug!(failed_calls = failed, "failed outstanding calls on close");
        }
        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "transport task ended abnormally");
            }
        }
    }

    fn submit(&self, outbound: Outbound) -> Result<()> {
        self.inner
            .outbound
            .send(outbound)
            .map_err(|_| ClientError::Closed)
    }
}

/// Builder for Client
pub struct ClientBuilder {
    config: ClientConfig,
    ids: Arc<dyn IdGenerator>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            ids: Arc::new(RandomIds),
        }
    }

    /// Replace the UUID generator, e.g. with [`SequentialIds`] in tests.
    pub fn id_generator(mut self, ids: impl IdGenerator) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Must be called from within a Tokio runtime.
    pub fn spawn(self) -> Result<Client> {
        self.config.validate()?;

        let pending = PendingCalls::new();
        let listeners = Listeners::new();
        let (outbound, commands) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Connecting);
        let shutdown = CancellationToken::new();

        let transport = Transport::new(
            self.config.clone(),
            Arc::clone(&self.ids),
            Demultiplexer::new(pending.clone(), listeners.clone()),
            pending.clone(),
            state_tx,
            commands,
            shutdown.clone(),
        );
        let task = tokio::spawn(transport.run());

        Ok(Client {
            inner: Arc::new(Inner {
                config: self.config,
                ids: self.ids,
                pending,
                listeners,
                outbound,
                state,
                shutdown,
                task: Mutex::new(Some(task)),
            }),
        })
    }

    /// Spawn, then wait up to `connect_timeout_ms` for the connection to open.
    pub async fn connect(self) -> Result<Client> {
        let url = self.config.url.clone();
        let timeout = self.config.connect_timeout();
        let client = self.spawn()?;

        match tokio::time::timeout(timeout, client.wait_open()).await {
            Ok(Ok(())) => {
                tracing::info!(url = %url, "connected");
                Ok(client)
            }
            Ok(Err(e)) => {
                client.close().await;
                Err(e)
            }
            Err(_) => {
                client.close().await;
                Err(ClientError::ConnectFailed {
                    url,
                    reason: format!("not open after {timeout:?}"),
                })
            }
        }
    }
}
